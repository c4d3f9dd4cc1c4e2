use crate::sentence::Field;

/// Timing and link settings of a receiver session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Serial speed used to open the link and requested with `$PSRF100`
    pub baud_rate: u32,
    /// Longest wait for the next byte of a sentence
    pub byte_timeout_ms: u32,
    /// Deadline of a mode switch, retries included
    pub mode_deadline_ms: u32,
    /// Silence that ends a binary reply
    pub quiet_interval_ms: u32,
    /// Deadline for collecting a complete fix with [`position`](crate::Device::position)
    pub position_window_ms: u32,
    /// Delay between opening the link and the first command after power up
    pub warm_up_ms: u32,
    /// Delay after `$PSRF104`
    pub init_settle_ms: u32,
}

impl DeviceConfig {
    /// Time one 8N1 byte takes on the wire, rounded up
    pub fn byte_time_ms(&self) -> u32 {
        10_000u32.div_ceil(self.baud_rate.max(1)).max(1)
    }

    /// Longest a binary reply of `capacity` bytes may take: the quiet
    /// interval plus the bytes themselves.
    pub fn reply_window_ms(&self, capacity: usize) -> u32 {
        let bytes = u32::try_from(capacity).unwrap_or(u32::MAX);
        self.quiet_interval_ms
            .saturating_add(bytes.saturating_mul(self.byte_time_ms()))
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            baud_rate: 4800,
            byte_timeout_ms: 1000,
            mode_deadline_ms: 3000,
            quiet_interval_ms: 1000,
            position_window_ms: 5000,
            warm_up_ms: 2000,
            init_settle_ms: 1000,
        }
    }
}

/// Approximate position and time sent with `$PSRF104` to speed up the first fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InitConfig {
    /// Degrees and minutes, `ddmm.mmmm`, sent as written
    pub latitude: Field,
    /// Degrees and minutes, `dddmm.mmmm`, sent as written
    pub longitude: Field,
    /// Meters
    pub altitude: i32,
    /// Receiver clock drift, Hz
    pub clock_offset: u32,
    /// Seconds into the GPS week
    pub time_of_week: u32,
    pub week_number: u16,
    /// Number of channels to use, 1..=12
    pub channels: u8,
    /// Reset configuration (1 = warm start)
    pub reset_flag: u8,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            latitude: Field::from_str_truncated("4140.8217"),
            longitude: Field::from_str_truncated("00053.1736"),
            altitude: 198,
            clock_offset: 96000,
            time_of_week: 497260,
            week_number: 921,
            channels: 12,
            reset_flag: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_window_covers_quiet_interval_and_bytes() {
        let config = DeviceConfig::default();
        assert_eq!(config.byte_time_ms(), 3);
        assert_eq!(config.reply_window_ms(110), 1330);
        let fast = DeviceConfig {
            baud_rate: 115_200,
            ..DeviceConfig::default()
        };
        assert_eq!(fast.byte_time_ms(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: DeviceConfig = serde_json::from_str(r#"{"baud_rate": 9600}"#).unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.mode_deadline_ms, 3000);

        let init: InitConfig = serde_json::from_str(r#"{"altitude": -12}"#).unwrap();
        assert_eq!(init.altitude, -12);
        assert_eq!(init.week_number, 921);
        assert_eq!(init.longitude, "00053.1736");

        let init: InitConfig =
            serde_json::from_str(r#"{"latitude": "0130.5000", "longitude": "10345.0000"}"#)
                .unwrap();
        assert_eq!(init.latitude, "0130.5000");
        assert_eq!(init.longitude, "10345.0000");

        let too_long = r#"{"latitude": "4140.82170000000000"}"#;
        assert!(serde_json::from_str::<InitConfig>(too_long).is_err());
    }
}
