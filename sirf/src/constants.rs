pub const SIRF_START_CHAR_1: u8 = 0xa0;
pub const SIRF_START_CHAR_2: u8 = 0xa2;
pub const SIRF_END_CHAR_1: u8 = 0xb0;
pub const SIRF_END_CHAR_2: u8 = 0xb3;
pub(crate) const SIRF_START_SIZE: usize = 2;
pub(crate) const SIRF_PAYLOAD_SIZE_LEN: usize = 2;
pub(crate) const SIRF_HEADER_LEN: usize = SIRF_START_SIZE + SIRF_PAYLOAD_SIZE_LEN;
pub(crate) const SIRF_CHECKSUM_LEN: usize = 2;
pub(crate) const SIRF_END_SIZE: usize = 2;
pub(crate) const SIRF_TRAILER_LEN: usize = SIRF_CHECKSUM_LEN + SIRF_END_SIZE;

pub(crate) const SIRF_LENGTH_OFFSET: usize = 2; // After START_CHAR_1, START_CHAR_2
pub(crate) const SIRF_PAYLOAD_OFFSET: usize = 4; // After LENGTH

/// Checksums are 15-bit sums of the payload bytes
pub const SIRF_CHECKSUM_MASK: u16 = 0x7fff;

/// Largest frame the codec builds: header, up to 120 payload bytes, trailer
pub const MAX_FRAME_LEN: usize = 128;
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - SIRF_HEADER_LEN - SIRF_TRAILER_LEN;

pub const MSG_ACK: u8 = 0x0b;
pub const MSG_NACK: u8 = 0x0c;
pub const MSG_EPHEMERIS_DATA: u8 = 0x0f;
pub const MSG_SWITCH_TO_NMEA: u8 = 0x81;
pub const MSG_POLL_EPHEMERIS: u8 = 0x93;
pub const MSG_SET_EPHEMERIS: u8 = 0x95;
pub const MSG_SET_MESSAGE_RATE: u8 = 0xa6;

pub const NMEA_SYNC_CHAR: u8 = 0x24; // '$'
pub const NMEA_CHECKSUM_CHAR: u8 = 0x2a; // '*'
pub const NMEA_FIELD_SEPARATOR: u8 = 0x2c; // ','
pub const NMEA_END_CHAR_1: u8 = 0x0d; // '\r' (<CR>)
pub const NMEA_END_CHAR_2: u8 = 0x0a; // '\n' (<LF>)

/// Size of the shared line buffer
pub const LINE_CAPACITY: usize = 128;
/// Longest line read while validating a NMEA mode switch
pub(crate) const MODE_CHECK_LINE_LEN: usize = 100;
/// Widest sentence in use is RMC (12 fields), leave some headroom
pub const MAX_FIELDS: usize = 16;
pub const FIELD_CAPACITY: usize = 16;

/// Returned instead of a line when the receiver stays silent
pub const TIMEOUT_SENTINEL: &str = "GPS_TIMEOUT";

pub const FIRST_SV_ID: u8 = 1;
pub const LAST_SV_ID: u8 = 32;

/// Payload bytes of one almanac record, as exchanged with the receiver
pub const ALMANAC_RECORD_LEN: usize = 90;
/// The record is read back from storage as a 5-byte head and an 85-byte tail
pub const ALMANAC_HEAD_LEN: usize = 5;
pub const ALMANAC_TAIL_LEN: usize = ALMANAC_RECORD_LEN - ALMANAC_HEAD_LEN;
pub const END_OF_RECORD: [u8; 2] = [0xaa, 0xaa];
pub const END_OF_FILE: [u8; 5] = [0xaa, 0xbb, 0xcc, 0xcc, 0xbb];
pub(crate) const EPHEMERIS_RESPONSE_CAPACITY: usize = 110;
pub(crate) const MIN_EPHEMERIS_RESPONSE_LEN: usize = 100;
pub(crate) const EPHEMERIS_DATA_OFFSET: usize = 6;
pub(crate) const ACK_LEN: usize = 10;

/// Sleep between two polls of the transport
pub const POLL_QUANTUM_MS: u32 = 1;
pub(crate) const NMEA_SETTLE_MS: u32 = 10;
pub(crate) const BINARY_SETTLE_MS: u32 = 10;
pub(crate) const BINARY_OFF_SETTLE_MS: u32 = 100;
pub(crate) const RESTORE_SETTLE_MS: u32 = 100;
pub(crate) const ALMANAC_SETTLE_MS: u32 = 100;
