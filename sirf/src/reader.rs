use crate::{
    constants::*,
    frame::Line,
    status::StatusFlags,
    transport::{Channel, Clock, Deadline, Transport},
};

/// Captures `$`-prefixed sentences into the session's line buffer.
///
/// A captured line starts at `$` and ends before the first `*` or the next
/// `$`: the delimiter and the checksum never make it into the buffer.
#[derive(Debug, Default, Clone)]
pub struct LineReader {
    line: Line,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last line read, or the timeout sentinel
    pub fn line(&self) -> &str {
        self.line.as_str()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    /// Flushes pending input, then reads the next sentence.
    ///
    /// `max_bytes == 0` uses the whole line buffer. On silence, sets
    /// [`StatusFlags::TIMEOUT`] and returns [`TIMEOUT_SENTINEL`].
    pub fn read_line<T: Transport, C: Clock>(
        &mut self,
        channel: &mut Channel<T, C>,
        flags: &mut StatusFlags,
        max_bytes: usize,
        timeout_ms: u32,
        deadline: &Deadline,
    ) -> Result<&str, T::Error> {
        channel.flush()?;
        self.read_next_line(channel, flags, max_bytes, timeout_ms, deadline)
    }

    /// Reads the next sentence of a running stream, keeping pending input.
    ///
    /// The search for `$` gives up `timeout_ms` after the call started, even
    /// while bytes keep arriving.
    pub fn read_next_line<T: Transport, C: Clock>(
        &mut self,
        channel: &mut Channel<T, C>,
        flags: &mut StatusFlags,
        max_bytes: usize,
        timeout_ms: u32,
        deadline: &Deadline,
    ) -> Result<&str, T::Error> {
        flags.remove(StatusFlags::TIMEOUT);
        self.line.clear();
        let max_bytes = match max_bytes {
            0 => LINE_CAPACITY,
            n => core::cmp::min(n, LINE_CAPACITY),
        };

        // resync on the start of a sentence
        let resync = channel.deadline(timeout_ms).earlier(*deadline);
        let mut skipped = 0usize;
        loop {
            match channel.next_byte(timeout_ms, &resync)? {
                None => return Ok(self.timed_out(flags)),
                Some(NMEA_SYNC_CHAR) => break,
                Some(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            log::trace!("skipped {} bytes before sentence start", skipped);
        }
        self.line.push(NMEA_SYNC_CHAR);

        while self.line.len() < max_bytes {
            match channel.next_byte(timeout_ms, deadline)? {
                None => return Ok(self.timed_out(flags)),
                Some(NMEA_CHECKSUM_CHAR | NMEA_SYNC_CHAR) => break,
                Some(b) => {
                    self.line.push(b);
                }
            }
        }
        while let Some(NMEA_END_CHAR_1 | NMEA_END_CHAR_2) = self.line.last() {
            self.line.pop();
        }
        log::trace!("rx line {:?}", self.line);
        Ok(self.line.as_str())
    }

    fn timed_out(&mut self, flags: &mut StatusFlags) -> &str {
        log::warn!("no sentence from receiver");
        flags.insert(StatusFlags::TIMEOUT);
        self.line.set(TIMEOUT_SENTINEL);
        self.line.as_str()
    }
}

impl<T: Transport, C: Clock> Channel<T, C> {
    /// Gathers bytes into `buf` until nothing arrived for `quiet_ms`.
    ///
    /// Returns the number of bytes received, which may exceed `buf.len()`:
    /// excess bytes are dropped.
    pub fn collect_quiet(
        &mut self,
        buf: &mut [u8],
        quiet_ms: u32,
        deadline: &Deadline,
    ) -> Result<usize, T::Error> {
        let mut received = 0;
        while let Some(b) = self.next_byte(quiet_ms, deadline)? {
            if let Some(slot) = buf.get_mut(received) {
                *slot = b;
            }
            received += 1;
        }
        if received > buf.len() {
            log::debug!("reply of {} bytes truncated to {}", received, buf.len());
        }
        Ok(received)
    }

    /// Reads at most `buf.len()` bytes, waiting at most `byte_wait_ms` for each.
    pub fn read_up_to(
        &mut self,
        buf: &mut [u8],
        byte_wait_ms: u32,
        deadline: &Deadline,
    ) -> Result<usize, T::Error> {
        for (idx, slot) in buf.iter_mut().enumerate() {
            match self.next_byte(byte_wait_ms, deadline)? {
                Some(b) => *slot = b,
                None => return Ok(idx),
            }
        }
        Ok(buf.len())
    }
}
