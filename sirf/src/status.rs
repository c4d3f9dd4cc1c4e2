use bitflags::bitflags;

bitflags! {
    /// Outcome flags of the last receiver exchanges.
    ///
    /// Operations clear the flags they can raise before starting, so after a
    /// call the set describes that call only. An empty set means every
    /// acknowledgement-bearing exchange was acknowledged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Sentence tag did not match the expected one, or the receiver has no fix
        const INVALID = 0x01;
        /// No data arrived before the deadline
        const TIMEOUT = 0x02;
        /// NMEA checksum mismatch
        const BAD_CHECKSUM = 0x04;
        /// The receiver did not acknowledge a binary command
        const NACK = 0x08;
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::empty()
    }
}
