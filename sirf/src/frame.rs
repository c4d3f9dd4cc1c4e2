//! Binary frames and NMEA command sentences sent to the receiver.
//!
//! # Binary layout
//!
//! | offset | size | content                    |
//! |--------|------|----------------------------|
//! | 0      | 2    | start sequence `A0 A2`     |
//! | 2      | 2    | payload length, big endian |
//! | 4      | n    | payload, message id first  |
//! | 4+n    | 2    | checksum, big endian       |
//! | 6+n    | 2    | end sequence `B0 B3`       |
//!
//! The checksum is the sum of the payload bytes masked to 15 bits.

use core::fmt::Write;

use crate::{
    config::InitConfig,
    constants::*,
    error::FrameError,
    status::StatusFlags,
    text::Text,
};

/// One line of text sent to or received from the receiver
pub type Line = Text<LINE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryChecksum {
    pub high: u8,
    pub low: u8,
}

impl BinaryChecksum {
    pub fn of(payload: &[u8]) -> Self {
        let sum = payload
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)) & SIRF_CHECKSUM_MASK);
        let [high, low] = sum.to_be_bytes();
        Self { high, low }
    }

    pub fn value(&self) -> u16 {
        u16::from_be_bytes([self.high, self.low])
    }
}

/// Locates the `B0 B3` end sequence of `frame`.
///
/// The declared payload length is trusted when it points at an end sequence,
/// otherwise the first end sequence after the checksum slots wins.
fn find_end_sequence(frame: &[u8]) -> Option<usize> {
    let is_end = |at: usize| {
        frame.get(at) == Some(&SIRF_END_CHAR_1) && frame.get(at + 1) == Some(&SIRF_END_CHAR_2)
    };
    if frame.len() >= SIRF_HEADER_LEN {
        let declared = usize::from(u16::from_be_bytes([
            frame[SIRF_LENGTH_OFFSET],
            frame[SIRF_LENGTH_OFFSET + 1],
        ]));
        let at = SIRF_PAYLOAD_OFFSET + declared + SIRF_CHECKSUM_LEN;
        if is_end(at) {
            return Some(at);
        }
    }
    (SIRF_PAYLOAD_OFFSET + SIRF_CHECKSUM_LEN..frame.len()).find(|&at| is_end(at))
}

/// Computes the checksum of a complete frame and writes it into the two slots
/// before the end sequence.
///
/// The slots are zeroed before summing, so patching an already patched frame
/// gives the same bytes.
pub fn binary_checksum(frame: &mut [u8]) -> Result<BinaryChecksum, FrameError> {
    let end = find_end_sequence(frame).ok_or(FrameError::MissingEndSequence)?;
    let slot = end - SIRF_CHECKSUM_LEN;
    frame[slot] = 0;
    frame[slot + 1] = 0;
    let checksum = BinaryChecksum::of(&frame[SIRF_PAYLOAD_OFFSET..end]);
    frame[slot] = checksum.high;
    frame[slot + 1] = checksum.low;
    Ok(checksum)
}

/// A complete binary frame
#[derive(Clone, Copy)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn message_id(&self) -> u8 {
        self.bytes[SIRF_PAYLOAD_OFFSET]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[SIRF_PAYLOAD_OFFSET..self.len - SIRF_TRAILER_LEN]
    }

    pub fn checksum(&self) -> BinaryChecksum {
        let slot = self.len - SIRF_TRAILER_LEN;
        BinaryChecksum {
            high: self.bytes[slot],
            low: self.bytes[slot + 1],
        }
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Frame({:02X?})", self.as_bytes())
    }
}

/// Builds a [`Frame`] payload byte by byte.
pub struct FrameBuilder {
    bytes: [u8; MAX_FRAME_LEN],
    payload_len: usize,
    requested: usize,
}

impl FrameBuilder {
    pub fn start(message_id: u8) -> Self {
        let mut bytes = [0; MAX_FRAME_LEN];
        bytes[0] = SIRF_START_CHAR_1;
        bytes[1] = SIRF_START_CHAR_2;
        bytes[SIRF_PAYLOAD_OFFSET] = message_id;
        Self {
            bytes,
            payload_len: 1,
            requested: 1,
        }
    }

    pub fn push(&mut self, byte: u8) -> &mut Self {
        if self.payload_len < MAX_PAYLOAD_LEN {
            self.bytes[SIRF_PAYLOAD_OFFSET + self.payload_len] = byte;
            self.payload_len += 1;
        }
        self.requested += 1;
        self
    }

    pub fn extend(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            self.push(b);
        }
        self
    }

    pub fn finish(&self) -> Result<Frame, FrameError> {
        if self.requested > MAX_PAYLOAD_LEN {
            return Err(FrameError::TooLong {
                max: MAX_PAYLOAD_LEN,
                got: self.requested,
            });
        }
        Ok(self.assemble())
    }

    /// Seals the frame, dropping bytes pushed past the capacity.
    fn assemble(&self) -> Frame {
        let mut bytes = self.bytes;
        let n = self.payload_len;
        // n <= MAX_PAYLOAD_LEN, fits in u16
        bytes[SIRF_LENGTH_OFFSET..SIRF_PAYLOAD_OFFSET].copy_from_slice(&(n as u16).to_be_bytes());
        let checksum = BinaryChecksum::of(&bytes[SIRF_PAYLOAD_OFFSET..SIRF_PAYLOAD_OFFSET + n]);
        let slot = SIRF_PAYLOAD_OFFSET + n;
        bytes[slot] = checksum.high;
        bytes[slot + 1] = checksum.low;
        bytes[slot + 2] = SIRF_END_CHAR_1;
        bytes[slot + 3] = SIRF_END_CHAR_2;
        Frame {
            bytes,
            len: slot + SIRF_TRAILER_LEN,
        }
    }
}

/// Output rates (in seconds between sentences, 0 = off) of the NMEA sentences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NmeaRates {
    pub gga: u8,
    pub gll: u8,
    pub gsa: u8,
    pub gsv: u8,
    pub rmc: u8,
    pub vtg: u8,
}

impl NmeaRates {
    pub const fn all() -> Self {
        Self {
            gga: 1,
            gll: 1,
            gsa: 1,
            gsv: 1,
            rmc: 1,
            vtg: 1,
        }
    }
}

/// Switch to NMEA protocol (id 0x81) at 4800 baud with the given rates.
pub fn switch_to_nmea(rates: &NmeaRates) -> Frame {
    const CHECKSUM_ON: u8 = 0x01;
    const DEBUG_UNCHANGED: u8 = 0x02;
    const BAUD_4800: [u8; 2] = 4800u16.to_be_bytes();
    let mut builder = FrameBuilder::start(MSG_SWITCH_TO_NMEA);
    builder.push(DEBUG_UNCHANGED);
    for rate in [rates.gga, rates.gll, rates.gsa, rates.gsv, rates.rmc, rates.vtg] {
        builder.push(rate).push(CHECKSUM_ON);
    }
    // MSS, EPE, ZDA and one reserved slot, all off
    for _ in 0..4 {
        builder.push(0).push(CHECKSUM_ON);
    }
    builder.extend(&BAUD_4800);
    builder.assemble()
}

/// Set message rate (id 0xA6) in mode 2: stop every periodic binary message.
pub fn disable_all_messages() -> Frame {
    let mut builder = FrameBuilder::start(MSG_SET_MESSAGE_RATE);
    builder.extend(&[0x02, 0x02, 0, 0, 0, 0, 0]);
    builder.assemble()
}

/// Poll the ephemeris of one satellite (id 0x93)
pub fn poll_ephemeris(sv_id: u8) -> Frame {
    let mut builder = FrameBuilder::start(MSG_POLL_EPHEMERIS);
    builder.push(sv_id).push(0);
    builder.assemble()
}

/// Upload one almanac record (id 0x95)
pub fn set_ephemeris(record: &[u8; ALMANAC_RECORD_LEN]) -> Frame {
    let mut builder = FrameBuilder::start(MSG_SET_EPHEMERIS);
    builder.extend(record);
    builder.assemble()
}

/// ACK reply the receiver sends for an accepted command
pub fn ack_for(message_id: u8) -> Frame {
    let mut builder = FrameBuilder::start(MSG_ACK);
    builder.push(message_id);
    builder.assemble()
}

/// XOR of the bytes between the leading `$` and the `*` three bytes from the end.
pub fn nmea_checksum(line: &[u8]) -> Option<u8> {
    let len = line.len();
    if len < 4 || line[len - 3] != NMEA_CHECKSUM_CHAR {
        return None;
    }
    Some(line[1..len - 3].iter().fold(0, |acc, &b| acc ^ b))
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

fn hex_digit(nibble: u8) -> u8 {
    b"0123456789ABCDEF"[usize::from(nibble & 0x0f)]
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., NMEA_END_CHAR_1 | NMEA_END_CHAR_2] = line {
        line = rest;
    }
    line
}

/// Checks the two hex digits ending `line` against its computed checksum.
///
/// Clears [`StatusFlags::BAD_CHECKSUM`], then sets it when the marker is
/// missing or the digits disagree.
pub fn verify_nmea_checksum(line: &[u8], flags: &mut StatusFlags) -> bool {
    flags.remove(StatusFlags::BAD_CHECKSUM);
    let line = trim_line_end(line);
    let len = line.len();
    let valid = match nmea_checksum(line) {
        Some(computed) => matches!(
            (hex_value(line[len - 2]), hex_value(line[len - 1])),
            (Some(high), Some(low)) if (high << 4) | low == computed
        ),
        None => false,
    };
    if !valid {
        log::warn!("bad NMEA checksum");
        flags.insert(StatusFlags::BAD_CHECKSUM);
    }
    valid
}

/// Computes the checksum of `sentence` and writes it over the two
/// placeholders after `*`.
pub fn fill_nmea_checksum(sentence: &mut [u8]) -> Option<u8> {
    let checksum = nmea_checksum(sentence)?;
    let len = sentence.len();
    sentence[len - 2] = hex_digit(checksum >> 4);
    sentence[len - 1] = hex_digit(checksum);
    Some(checksum)
}

/// Writes the `$PSRF` configuration sentences the receiver accepts in NMEA mode.
pub struct NmeaSentenceBuilder;

impl NmeaSentenceBuilder {
    /// `$PSRF100`: switch to binary protocol, 8N1 at `baud_rate`.
    pub fn switch_to_binary(baud_rate: u32) -> Result<Line, FrameError> {
        Self::finish(format_args!("$PSRF100,0,{},8,1,0*", baud_rate))
    }

    /// `$PSRF104`: initialise the data source with an approximate position and time.
    pub fn init_data_source(config: &InitConfig) -> Result<Line, FrameError> {
        Self::finish(format_args!(
            "$PSRF104,{},{},{},{},{},{},{},{}*",
            config.latitude,
            config.longitude,
            config.altitude,
            config.clock_offset,
            config.time_of_week,
            config.week_number,
            config.channels,
            config.reset_flag,
        ))
    }

    fn finish(args: core::fmt::Arguments<'_>) -> Result<Line, FrameError> {
        let mut line = Line::new();
        line.write_fmt(args)
            .and_then(|_| line.write_str("00\r\n"))
            .map_err(|_| FrameError::SentenceTooLong)?;
        let body = line.len() - 2;
        fill_nmea_checksum(&mut line.as_bytes_mut()[..body]);
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NMEA_ALL: [u8; 32] = [
        0xa0, 0xa2, 0x00, 0x18, 0x81, 0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
        0x01, 0x01, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x12, 0xc0, 0x01, 0x65,
        0xb0, 0xb3,
    ];

    static NMEA_GGA_ONLY: [u8; 32] = [
        0xa0, 0xa2, 0x00, 0x18, 0x81, 0x02, 0x01, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01, 0x12, 0xc0, 0x01, 0x60,
        0xb0, 0xb3,
    ];

    static DISABLE_ALL: [u8; 16] = [
        0xa0, 0xa2, 0x00, 0x08, 0xa6, 0x02, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xaa, 0xb0,
        0xb3,
    ];

    #[test]
    fn test_switch_to_nmea_all() {
        let frame = switch_to_nmea(&NmeaRates::all());
        assert_eq!(frame.as_bytes(), &NMEA_ALL[..]);
        assert_eq!(frame.checksum().value(), 0x0165);
    }

    #[test]
    fn test_switch_to_nmea_gga() {
        let rates = NmeaRates {
            gga: 1,
            ..Default::default()
        };
        assert_eq!(switch_to_nmea(&rates).as_bytes(), &NMEA_GGA_ONLY[..]);
    }

    #[test]
    fn test_submode_checksum_matches_gga() {
        let rates = NmeaRates {
            vtg: 1,
            ..Default::default()
        };
        let frame = switch_to_nmea(&rates);
        assert_eq!(frame.as_bytes()[6], 0);
        assert_eq!(frame.as_bytes()[16], 1);
        assert_eq!(frame.checksum().value(), 0x0160);
    }

    #[test]
    fn test_disable_all_messages() {
        let frame = disable_all_messages();
        assert_eq!(frame.as_bytes(), &DISABLE_ALL[..]);
        assert_eq!(frame.message_id(), MSG_SET_MESSAGE_RATE);
    }

    #[test]
    fn test_poll_ephemeris() {
        let frame = poll_ephemeris(7);
        assert_eq!(
            frame.as_bytes(),
            &[0xa0, 0xa2, 0x00, 0x03, 0x93, 0x07, 0x00, 0x00, 0x9a, 0xb0, 0xb3]
        );
    }

    #[test]
    fn test_set_ephemeris_len() {
        let frame = set_ephemeris(&[0x11; ALMANAC_RECORD_LEN]);
        assert_eq!(frame.len(), 99);
        assert_eq!(&frame.as_bytes()[..5], &[0xa0, 0xa2, 0x00, 0x5b, 0x95]);
        assert_eq!(frame.payload().len(), 91);
    }

    #[test]
    fn test_ack_frame() {
        assert_eq!(
            ack_for(MSG_SET_EPHEMERIS).as_bytes(),
            &[0xa0, 0xa2, 0x00, 0x02, 0x0b, 0x95, 0x00, 0xa0, 0xb0, 0xb3]
        );
    }

    #[test]
    fn test_binary_checksum_patches_slots() {
        let mut frame = DISABLE_ALL;
        frame[13] = 0x55;
        frame[12] = 0x33;
        let checksum = binary_checksum(&mut frame).unwrap();
        assert_eq!(checksum, BinaryChecksum { high: 0x00, low: 0xaa });
        assert_eq!(frame, DISABLE_ALL);
    }

    #[test]
    fn test_binary_checksum_without_end_sequence() {
        let mut frame = [0xa0, 0xa2, 0x00, 0x01, 0x81, 0x00, 0x00];
        assert_eq!(
            binary_checksum(&mut frame),
            Err(FrameError::MissingEndSequence)
        );
    }

    #[test]
    fn test_builder_too_long() {
        let mut builder = FrameBuilder::start(MSG_SET_EPHEMERIS);
        builder.extend(&[0; MAX_PAYLOAD_LEN]);
        assert_eq!(
            builder.finish().unwrap_err(),
            FrameError::TooLong {
                max: MAX_PAYLOAD_LEN,
                got: MAX_PAYLOAD_LEN + 1
            }
        );
    }

    #[test]
    fn test_nmea_checksum() {
        assert_eq!(nmea_checksum(b"$GPGGA,1*4B"), Some(0x4b));
        assert_eq!(nmea_checksum(b"$GPGGA,1*"), None);
        assert_eq!(nmea_checksum(b"$GPGGA"), None);
    }

    #[test]
    fn test_verify_nmea_checksum() {
        let mut flags = StatusFlags::empty();
        let good = b"$PSRF100,0,9600,8,1,0*0C\r\n";
        assert!(verify_nmea_checksum(good, &mut flags));
        assert!(flags.is_empty());

        let bad = b"$PSRF100,0,9600,8,1,0*0D";
        assert!(!verify_nmea_checksum(bad, &mut flags));
        assert!(flags.contains(StatusFlags::BAD_CHECKSUM));

        assert!(verify_nmea_checksum(b"$PSRF100,0,9600,8,1,0*0c", &mut flags));
        assert!(!flags.contains(StatusFlags::BAD_CHECKSUM));

        assert!(!verify_nmea_checksum(b"$PSRF100,0,9600", &mut flags));
        assert!(flags.contains(StatusFlags::BAD_CHECKSUM));
    }

    #[test]
    fn test_switch_to_binary_sentence() {
        let line = NmeaSentenceBuilder::switch_to_binary(9600).unwrap();
        assert_eq!(line, "$PSRF100,0,9600,8,1,0*0C\r\n");
        let line = NmeaSentenceBuilder::switch_to_binary(4800).unwrap();
        assert_eq!(line, "$PSRF100,0,4800,8,1,0*0F\r\n");
    }

    #[test]
    fn test_init_data_source_sentence() {
        let line = NmeaSentenceBuilder::init_data_source(&InitConfig::default()).unwrap();
        let text = line.as_str();
        assert!(text.starts_with("$PSRF104,4140.8217,00053.1736,198,96000,497260,921,12,1*"));
        assert!(text.ends_with("\r\n"));
        let mut flags = StatusFlags::empty();
        assert!(verify_nmea_checksum(line.as_bytes(), &mut flags));
    }

    #[test]
    fn test_init_data_source_keeps_coordinates_as_written() {
        let config = InitConfig {
            latitude: Text::from_str_truncated("0130.5000"),
            longitude: Text::from_str_truncated("10345.0000"),
            altitude: -12,
            ..InitConfig::default()
        };
        let line = NmeaSentenceBuilder::init_data_source(&config).unwrap();
        assert_eq!(
            line.as_str(),
            "$PSRF104,0130.5000,10345.0000,-12,96000,497260,921,12,1*01\r\n"
        );
        let line = NmeaSentenceBuilder::init_data_source(&InitConfig::default()).unwrap();
        assert_eq!(
            line.as_str(),
            "$PSRF104,4140.8217,00053.1736,198,96000,497260,921,12,1*13\r\n"
        );
    }
}
