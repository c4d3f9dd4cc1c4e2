mod common;

use chrono::{NaiveDate, NaiveTime};
use common::device;
use sirf::{constants::TIMEOUT_SENTINEL, CommMode, FixField, StatusFlags};

#[test]
fn test_read_each_field() {
    let (mut gps, _, _) = device();
    assert_eq!(gps.time().unwrap(), "123519.000");
    assert_eq!(gps.date().unwrap(), "140526");
    assert_eq!(gps.latitude().unwrap(), "4140.8217");
    assert_eq!(gps.longitude().unwrap(), "00053.1736");
    assert_eq!(gps.altitude().unwrap(), "198.0");
    assert_eq!(gps.speed().unwrap(), "0.2");
    assert_eq!(gps.course().unwrap(), "309.62");
    assert!(gps.flags().is_empty());
}

#[test]
fn test_field_read_restores_mode() {
    let (mut gps, _, _) = device();
    assert_eq!(gps.comm_mode(), CommMode::NmeaAll);
    gps.read_field(FixField::Speed).unwrap();
    assert_eq!(gps.comm_mode(), CommMode::NmeaAll);

    assert!(gps.set_comm_mode(CommMode::NmeaGsa).unwrap());
    gps.read_field(FixField::Date).unwrap();
    assert_eq!(gps.comm_mode(), CommMode::NmeaGsa);
}

#[test]
fn test_field_read_restores_binary_off() {
    let (mut gps, receiver, _) = device();
    assert!(gps.init().unwrap());
    assert_eq!(gps.latitude().unwrap(), "4140.8217");
    assert_eq!(gps.comm_mode(), CommMode::BinaryOff);
    assert_eq!(
        receiver.protocol(),
        common::Protocol::Binary { streaming: false }
    );
}

#[test]
fn test_position_without_fix_is_invalid() {
    let (mut gps, receiver, _) = device();
    receiver.state.borrow_mut().fix_quality = 0;
    assert_eq!(gps.latitude().unwrap(), "4140.8217");
    assert!(gps.flags().contains(StatusFlags::INVALID));
    // time does not need a fix
    gps.time().unwrap();
    assert!(!gps.flags().contains(StatusFlags::INVALID));
    assert!(!gps.has_fix().unwrap());
}

#[test]
fn test_stale_value_kept_when_receiver_stops() {
    let (mut gps, receiver, _) = device();
    assert_eq!(gps.course().unwrap(), "309.62");
    receiver.state.borrow_mut().silent = true;
    assert_eq!(gps.course().unwrap(), "309.62");
    assert!(gps.flags().contains(StatusFlags::INVALID));
}

#[test]
fn test_has_fix() {
    let (mut gps, _, _) = device();
    assert!(gps.has_fix().unwrap());
    assert_eq!(gps.comm_mode(), CommMode::NmeaAll);
}

#[test]
fn test_position_reads_full_fix() {
    let (mut gps, _, clock) = device();
    let start = clock.now();
    assert!(gps.position().unwrap());
    assert!(clock.now() - start < 5000);
    let fix = gps.fix();
    assert_eq!(fix.latitude_e5(), Some(4168036));
    assert_eq!(fix.speed(), "0.2");
    assert_eq!(fix.date(), "140526");
    assert_eq!(
        fix.utc_datetime(),
        Some(
            NaiveDate::from_ymd_opt(2026, 5, 14)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(12, 35, 19).unwrap())
        )
    );
    assert!(gps.flags().is_empty());
}

#[test]
fn test_position_times_out_on_partial_output() {
    let (mut gps, receiver, clock) = device();
    // GGA keeps coming, RMC and VTG never do
    receiver.state.borrow_mut().stuck_on = Some(0);
    let start = clock.now();
    assert!(!gps.position().unwrap());
    assert!(gps.flags().contains(StatusFlags::TIMEOUT));
    assert!(clock.now() - start >= 5000);
    assert_eq!(gps.fix().latitude(), "4140.8217");
}

#[test]
fn test_read_raw() {
    let (mut gps, _, _) = device();
    let line = gps.read_raw(0).unwrap().to_string();
    assert!(line.starts_with("$GP"), "{}", line);
    assert!(!line.contains('*'));
    assert_eq!(gps.read_raw(6).unwrap().len(), 6);
}

#[test]
fn test_read_raw_timeout() {
    let (mut gps, receiver, clock) = device();
    receiver.state.borrow_mut().silent = true;
    let start = clock.now();
    assert_eq!(gps.read_raw(0).unwrap(), TIMEOUT_SENTINEL);
    assert!(gps.flags().contains(StatusFlags::TIMEOUT));
    assert_eq!(clock.now() - start, 1000);
}

#[test]
fn test_read_raw_gives_up_on_binary_stream() {
    let (mut gps, _, clock) = device();
    assert!(gps.set_comm_mode(CommMode::Binary).unwrap());
    let start = clock.now();
    assert_eq!(gps.read_raw(0).unwrap(), TIMEOUT_SENTINEL);
    assert!(gps.flags().contains(StatusFlags::TIMEOUT));
    assert_eq!(clock.now() - start, 1000);
}

#[test]
fn test_read_next_raw_follows_stream() {
    let (mut gps, _, _) = device();
    assert!(gps.set_comm_mode(CommMode::NmeaAll).unwrap());
    for tag in ["$GPGLL", "$GPGSA", "$GPGSV", "$GPRMC", "$GPVTG", "$GPGGA"] {
        let line = gps.read_next_raw(0).unwrap().to_string();
        assert!(line.starts_with(tag), "expected {}, got {}", tag, line);
        assert!(!gps.flags().contains(StatusFlags::TIMEOUT));
    }
}
