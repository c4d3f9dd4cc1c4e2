use core::{fmt, str::FromStr};

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::{
    constants::*,
    device::Device,
    error::Error,
    frame::{disable_all_messages, switch_to_nmea, NmeaRates, NmeaSentenceBuilder},
    sentence::SentenceKind,
    transport::{Clock, Deadline, Transport},
};

/// Reporting mode of the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CommMode {
    /// SiRF binary protocol, periodic messages on
    Binary,
    /// SiRF binary protocol, receiver silent until polled
    BinaryOff,
    /// Every NMEA sentence once per second
    NmeaAll,
    NmeaGga,
    NmeaGll,
    NmeaGsa,
    NmeaGsv,
    NmeaRmc,
    NmeaVtg,
}

impl CommMode {
    pub const ALL: [CommMode; 9] = [
        CommMode::Binary,
        CommMode::BinaryOff,
        CommMode::NmeaAll,
        CommMode::NmeaGga,
        CommMode::NmeaGll,
        CommMode::NmeaGsa,
        CommMode::NmeaGsv,
        CommMode::NmeaRmc,
        CommMode::NmeaVtg,
    ];

    pub const fn is_nmea(self) -> bool {
        !matches!(self, CommMode::Binary | CommMode::BinaryOff)
    }

    /// Sentence that proves the receiver is in this mode.
    ///
    /// GGA leads every NMEA burst, so it also stands for [`CommMode::NmeaAll`].
    pub const fn expected_sentence(self) -> Option<SentenceKind> {
        match self {
            CommMode::Binary | CommMode::BinaryOff => None,
            CommMode::NmeaAll | CommMode::NmeaGga => Some(SentenceKind::Gga),
            CommMode::NmeaGll => Some(SentenceKind::Gll),
            CommMode::NmeaGsa => Some(SentenceKind::Gsa),
            CommMode::NmeaGsv => Some(SentenceKind::Gsv),
            CommMode::NmeaRmc => Some(SentenceKind::Rmc),
            CommMode::NmeaVtg => Some(SentenceKind::Vtg),
        }
    }

    pub fn nmea_rates(self) -> Option<NmeaRates> {
        let only = NmeaRates::default();
        let rates = match self {
            CommMode::Binary | CommMode::BinaryOff => return None,
            CommMode::NmeaAll => NmeaRates::all(),
            CommMode::NmeaGga => NmeaRates { gga: 1, ..only },
            CommMode::NmeaGll => NmeaRates { gll: 1, ..only },
            CommMode::NmeaGsa => NmeaRates { gsa: 1, ..only },
            CommMode::NmeaGsv => NmeaRates { gsv: 1, ..only },
            CommMode::NmeaRmc => NmeaRates { rmc: 1, ..only },
            CommMode::NmeaVtg => NmeaRates { vtg: 1, ..only },
        };
        Some(rates)
    }

    pub const fn name(self) -> &'static str {
        match self {
            CommMode::Binary => "binary",
            CommMode::BinaryOff => "binary-off",
            CommMode::NmeaAll => "nmea",
            CommMode::NmeaGga => "gga",
            CommMode::NmeaGll => "gll",
            CommMode::NmeaGsa => "gsa",
            CommMode::NmeaGsv => "gsv",
            CommMode::NmeaRmc => "rmc",
            CommMode::NmeaVtg => "vtg",
        }
    }
}

impl fmt::Display for CommMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommModeError;

impl fmt::Display for ParseCommModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(concat!(
            "unknown mode, expected one of: ",
            "binary, binary-off, nmea, gga, gll, gsa, gsv, rmc, vtg"
        ))
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseCommModeError {}

impl FromStr for CommMode {
    type Err = ParseCommModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or(ParseCommModeError)
    }
}

/// First byte after `$PSRF100` proves binary output when it cannot start a
/// NMEA sentence: not `$` and not a printable character strictly between
/// `'0'` and `'Z'`.
pub(crate) fn is_binary_reply(first: u8) -> bool {
    first != NMEA_SYNC_CHAR && !(first > b'0' && first < b'Z')
}

/// ACK of the 0xA6 command carries the acknowledged id at offset 5
pub(crate) fn is_binary_off_reply(reply: &[u8]) -> bool {
    reply.get(5) == Some(&MSG_SET_MESSAGE_RATE)
}

impl<T, C, P> Device<T, C, P>
where
    T: Transport,
    C: Clock,
    P: OutputPin,
{
    /// Drives the receiver into `target`, retrying until the receiver
    /// confirms or the mode deadline passes.
    ///
    /// Returns `false` when the receiver never confirmed; the current mode is
    /// then left unchanged.
    pub fn set_comm_mode(&mut self, target: CommMode) -> Result<bool, Error<T::Error>> {
        let deadline = self.channel.deadline(self.config.mode_deadline_ms);
        self.switch_mode(target, &deadline)
    }

    pub(crate) fn switch_mode(
        &mut self,
        target: CommMode,
        deadline: &Deadline,
    ) -> Result<bool, Error<T::Error>> {
        debug!("switching receiver from {} to {}", self.comm_mode, target);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.try_comm_mode(target, deadline)? {
                debug!("receiver in {} after {} attempt(s)", target, attempts);
                self.comm_mode = target;
                return Ok(true);
            }
            if deadline.expired(&mut self.channel.clock) {
                warn!(
                    "receiver did not enter {} after {} attempt(s)",
                    target, attempts
                );
                return Ok(false);
            }
        }
    }

    /// Moves to `target` the way the receiver accepts it: leaving NMEA for
    /// [`CommMode::BinaryOff`] needs the binary protocol first.
    pub(crate) fn enter_mode(&mut self, target: CommMode) -> Result<bool, Error<T::Error>> {
        if target == CommMode::BinaryOff && self.comm_mode.is_nmea() {
            if !self.set_comm_mode(CommMode::Binary)? {
                return Ok(false);
            }
            self.channel.sleep(RESTORE_SETTLE_MS, &Deadline::never());
        }
        self.set_comm_mode(target)
    }

    pub(crate) fn restore_mode(&mut self, previous: CommMode) -> Result<bool, Error<T::Error>> {
        if self.comm_mode == previous {
            return Ok(true);
        }
        debug!("restoring receiver to {}", previous);
        let restored = self.enter_mode(previous)?;
        if !restored {
            warn!("could not restore receiver to {}", previous);
        }
        Ok(restored)
    }

    /// One command/validate exchange. Never succeeds past `deadline`.
    fn try_comm_mode(
        &mut self,
        target: CommMode,
        deadline: &Deadline,
    ) -> Result<bool, Error<T::Error>> {
        let valid = match target {
            CommMode::Binary => {
                let sentence = NmeaSentenceBuilder::switch_to_binary(self.config.baud_rate)
                    .map_err(Error::Frame)?;
                self.channel
                    .write_all(sentence.as_bytes())
                    .map_err(Error::Transport)?;
                self.channel.sleep(BINARY_SETTLE_MS, deadline);
                self.channel.flush().map_err(Error::Transport)?;
                self.channel.sleep(BINARY_SETTLE_MS, deadline);
                let transport = &mut self.channel.transport;
                if transport.bytes_available().map_err(Error::Transport)? > 0 {
                    transport
                        .read_byte()
                        .map_err(Error::Transport)?
                        .is_some_and(is_binary_reply)
                } else {
                    false
                }
            }
            CommMode::BinaryOff => {
                self.channel.flush().map_err(Error::Transport)?;
                self.channel
                    .write_all(disable_all_messages().as_bytes())
                    .map_err(Error::Transport)?;
                self.channel.sleep(BINARY_OFF_SETTLE_MS, deadline);
                let mut reply = [0u8; ACK_LEN];
                let n = self
                    .channel
                    .read_up_to(&mut reply, BINARY_OFF_SETTLE_MS, deadline)
                    .map_err(Error::Transport)?;
                is_binary_off_reply(&reply[..n])
            }
            nmea => {
                let (Some(rates), Some(expected)) = (nmea.nmea_rates(), nmea.expected_sentence())
                else {
                    return Ok(false);
                };
                self.channel
                    .write_all(switch_to_nmea(&rates).as_bytes())
                    .map_err(Error::Transport)?;
                self.channel.sleep(NMEA_SETTLE_MS, deadline);
                self.reader
                    .read_line(
                        &mut self.channel,
                        &mut self.flags,
                        MODE_CHECK_LINE_LEN,
                        self.config.byte_timeout_ms,
                        deadline,
                    )
                    .map_err(Error::Transport)?;
                self.fields
                    .explode_into(self.reader.as_bytes(), NMEA_FIELD_SEPARATOR);
                self.fields.tag() == expected.tag()
            }
        };
        Ok(valid && !deadline.expired(&mut self.channel.clock))
    }
}
