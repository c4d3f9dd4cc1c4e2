use core::fmt;

use crate::constants::POLL_QUANTUM_MS;

/// Monotonic millisecond clock with a blocking sleep
pub trait Clock {
    fn now_ms(&mut self) -> u64;
    fn sleep_ms(&mut self, ms: u32);
}

/// Byte-oriented serial link to the receiver.
pub trait Transport {
    type Error: fmt::Debug;

    /// Opens the link at `baud_rate`, 8N1.
    fn open(&mut self, baud_rate: u32) -> Result<(), Self::Error>;

    fn close(&mut self) -> Result<(), Self::Error>;

    /// Discards every pending input byte.
    fn flush(&mut self) -> Result<(), Self::Error>;

    fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Reads one pending byte, `None` when nothing is pending.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Blocks until a byte is pending or `timeout_ms` elapsed.
    ///
    /// The default polls [`Transport::bytes_available`] every
    /// [`POLL_QUANTUM_MS`]. Transports with a native timed read should
    /// override it.
    fn wait_for_byte<C: Clock>(
        &mut self,
        clock: &mut C,
        timeout_ms: u32,
    ) -> Result<bool, Self::Error> {
        let deadline = Deadline::after(clock, timeout_ms);
        loop {
            if self.bytes_available()? > 0 {
                return Ok(true);
            }
            let remaining = deadline.remaining_ms(clock);
            if remaining == 0 {
                return Ok(false);
            }
            clock.sleep_ms(core::cmp::min(POLL_QUANTUM_MS, remaining));
        }
    }
}

/// Point in time measured on a [`Clock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: u64,
}

impl Deadline {
    pub fn after<C: Clock>(clock: &mut C, ms: u32) -> Self {
        Self {
            expires_at: clock.now_ms().saturating_add(u64::from(ms)),
        }
    }

    pub const fn never() -> Self {
        Self {
            expires_at: u64::MAX,
        }
    }

    pub fn expired<C: Clock>(&self, clock: &mut C) -> bool {
        clock.now_ms() >= self.expires_at
    }

    pub fn remaining_ms<C: Clock>(&self, clock: &mut C) -> u32 {
        let remaining = self.expires_at.saturating_sub(clock.now_ms());
        u32::try_from(remaining).unwrap_or(u32::MAX)
    }

    /// `ms`, shortened so that it ends no later than the deadline
    pub fn clip<C: Clock>(&self, clock: &mut C, ms: u32) -> u32 {
        core::cmp::min(ms, self.remaining_ms(clock))
    }

    /// Whichever of the two expires first
    pub fn earlier(self, other: Deadline) -> Deadline {
        if self.expires_at <= other.expires_at {
            self
        } else {
            other
        }
    }
}

/// A transport together with the clock timing it.
pub struct Channel<T, C> {
    pub(crate) transport: T,
    pub(crate) clock: C,
}

impl<T: Transport, C: Clock> Channel<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self { transport, clock }
    }

    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn deadline(&mut self, ms: u32) -> Deadline {
        Deadline::after(&mut self.clock, ms)
    }

    /// Sleeps for `ms`, never past `deadline`.
    pub fn sleep(&mut self, ms: u32, deadline: &Deadline) {
        let ms = deadline.clip(&mut self.clock, ms);
        if ms > 0 {
            self.clock.sleep_ms(ms);
        }
    }

    pub fn flush(&mut self) -> Result<(), T::Error> {
        self.transport.flush()
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), T::Error> {
        log::trace!("tx {:02X?}", bytes);
        self.transport.write_all(bytes)
    }

    /// Next byte, waiting at most `timeout_ms` and never past `deadline`.
    pub fn next_byte(
        &mut self,
        timeout_ms: u32,
        deadline: &Deadline,
    ) -> Result<Option<u8>, T::Error> {
        if deadline.expired(&mut self.clock) {
            return Ok(None);
        }
        let timeout_ms = deadline.clip(&mut self.clock, timeout_ms);
        if !self.transport.wait_for_byte(&mut self.clock, timeout_ms)? {
            return Ok(None);
        }
        self.transport.read_byte()
    }

    /// Reads and drops whatever is pending. Returns how many bytes were dropped.
    pub fn drain(&mut self, deadline: &Deadline) -> Result<usize, T::Error> {
        let mut dropped = 0;
        while !deadline.expired(&mut self.clock) && self.transport.bytes_available()? > 0 {
            if self.transport.read_byte()?.is_none() {
                break;
            }
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// System clock
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&mut self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// Power line for receivers wired to a permanent supply
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerPin;

impl embedded_hal::digital::ErrorType for NoPowerPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for NoPowerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
