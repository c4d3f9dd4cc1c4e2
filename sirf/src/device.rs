use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, info, warn};

use crate::{
    config::{DeviceConfig, InitConfig},
    error::Error,
    fix::Fix,
    frame::NmeaSentenceBuilder,
    mode::CommMode,
    reader::LineReader,
    sentence::Fields,
    status::StatusFlags,
    transport::{Channel, Clock, Deadline, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerMode {
    On,
    Off,
}

/// A session with one receiver.
///
/// Owns the serial link, its clock and the power line. Every operation
/// leaves the receiver in the mode it found it in, except the ones whose
/// purpose is to change it.
pub struct Device<T, C, P> {
    pub(crate) channel: Channel<T, C>,
    power: P,
    pub(crate) config: DeviceConfig,
    init_config: InitConfig,
    pub(crate) comm_mode: CommMode,
    power_mode: PowerMode,
    pub(crate) flags: StatusFlags,
    pub(crate) reader: LineReader,
    pub(crate) fields: Fields,
    pub(crate) fix: Fix,
    warm: bool,
}

impl<T, C, P> Device<T, C, P>
where
    T: Transport,
    C: Clock,
    P: OutputPin,
{
    pub fn new(transport: T, clock: C, power: P, config: DeviceConfig) -> Self {
        Self {
            channel: Channel::new(transport, clock),
            power,
            config,
            init_config: InitConfig::default(),
            comm_mode: CommMode::NmeaAll,
            power_mode: PowerMode::Off,
            flags: StatusFlags::empty(),
            reader: LineReader::new(),
            fields: Fields::new(),
            fix: Fix::default(),
            warm: false,
        }
    }

    /// Position and time sent on every init
    pub fn with_init_config(mut self, init_config: InitConfig) -> Self {
        self.init_config = init_config;
        self
    }

    pub fn release(self) -> (T, C, P) {
        let (transport, clock) = self.channel.release();
        (transport, clock, self.power)
    }

    pub fn comm_mode(&self) -> CommMode {
        self.comm_mode
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    pub fn fix(&self) -> &Fix {
        &self.fix
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn init_config(&self) -> &InitConfig {
        &self.init_config
    }

    /// The last line read from the receiver
    pub fn line(&self) -> &str {
        self.reader.line()
    }

    pub fn transport(&self) -> &T {
        self.channel.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.channel.transport_mut()
    }

    pub fn clock_mut(&mut self) -> &mut C {
        self.channel.clock_mut()
    }

    /// Powers the receiver and initialises it, see [`Device::init`].
    pub fn power_on(&mut self) -> Result<bool, Error<T::Error>> {
        self.power
            .set_high()
            .map_err(|e| Error::Power(e.kind()))?;
        self.power_mode = PowerMode::On;
        info!("receiver powered on");
        self.init()
    }

    /// Closes the link and cuts the power. The next init is a cold start.
    pub fn power_off(&mut self) -> Result<(), Error<T::Error>> {
        self.channel.transport.close().map_err(Error::Transport)?;
        self.power
            .set_low()
            .map_err(|e| Error::Power(e.kind()))?;
        self.power_mode = PowerMode::Off;
        self.warm = false;
        info!("receiver powered off");
        Ok(())
    }

    /// Initialises the receiver with the configured position and time.
    pub fn init(&mut self) -> Result<bool, Error<T::Error>> {
        let init_config = self.init_config;
        self.init_with(init_config)
    }

    /// Sends `$PSRF104` with `init_config`, then silences the receiver in
    /// binary mode.
    ///
    /// The first init after power up opens the link and waits for the
    /// receiver to boot. Returns `false` and sets [`StatusFlags::TIMEOUT`]
    /// when the receiver did not go silent.
    pub fn init_with(&mut self, init_config: InitConfig) -> Result<bool, Error<T::Error>> {
        self.flags.remove(StatusFlags::TIMEOUT);
        self.init_config = init_config;
        if !self.warm {
            debug!("cold start at {} baud", self.config.baud_rate);
            self.channel
                .transport
                .open(self.config.baud_rate)
                .map_err(Error::Transport)?;
            self.channel
                .sleep(self.config.warm_up_ms, &Deadline::never());
        }

        let sentence =
            NmeaSentenceBuilder::init_data_source(&init_config).map_err(Error::Frame)?;
        self.channel
            .write_all(sentence.as_bytes())
            .map_err(Error::Transport)?;
        self.channel
            .sleep(self.config.init_settle_ms, &Deadline::never());

        if !self.set_comm_mode(CommMode::Binary)? {
            warn!("receiver did not switch to binary");
        }
        let silenced = self.set_comm_mode(CommMode::BinaryOff)?;
        if !silenced {
            self.flags.insert(StatusFlags::TIMEOUT);
        }
        self.channel.flush().map_err(Error::Transport)?;
        self.warm = true;
        Ok(silenced)
    }

    /// Drops pending input and reads the next sentence as is, up to
    /// `max_bytes` (0 for the whole line buffer).
    ///
    /// Returns the timeout sentinel and sets [`StatusFlags::TIMEOUT`] when no
    /// `$` arrived within the byte timeout.
    pub fn read_raw(&mut self, max_bytes: usize) -> Result<&str, Error<T::Error>> {
        self.reader
            .read_line(
                &mut self.channel,
                &mut self.flags,
                max_bytes,
                self.config.byte_timeout_ms,
                &Deadline::never(),
            )
            .map_err(Error::Transport)
    }

    /// Like [`Device::read_raw`] but keeps pending input, for following a
    /// running sentence stream without losing lines.
    pub fn read_next_raw(&mut self, max_bytes: usize) -> Result<&str, Error<T::Error>> {
        self.reader
            .read_next_line(
                &mut self.channel,
                &mut self.flags,
                max_bytes,
                self.config.byte_timeout_ms,
                &Deadline::never(),
            )
            .map_err(Error::Transport)
    }

    /// Sentence fields of the last line
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}
