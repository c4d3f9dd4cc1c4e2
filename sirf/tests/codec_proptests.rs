use proptest::prelude::*;
use sirf::{
    binary_checksum, constants::NMEA_FIELD_SEPARATOR, explode, fill_nmea_checksum, parse_decimal,
    parse_degrees, verify_nmea_checksum, FrameBuilder, StatusFlags,
};

fn tag() -> impl Strategy<Value = String> {
    "\\$GP[A-Z]{3}"
}

fn field() -> impl Strategy<Value = String> {
    "[0-9A-Z.]{0,10}"
}

proptest! {
    #[test]
    fn test_explode_recovers_tag_and_checksum(
        tag in tag(),
        fields in prop::collection::vec(field(), 0..12),
        corrupt in any::<bool>(),
    ) {
        let mut line = tag.clone();
        for f in &fields {
            line.push(',');
            line.push_str(f);
        }
        line.push_str("*00");
        let mut bytes = line.into_bytes();
        let checksum = fill_nmea_checksum(&mut bytes).unwrap();
        if corrupt {
            let last = bytes.len() - 1;
            bytes[last] = if bytes[last] == b'0' { b'1' } else { b'0' };
        }

        let mut flags = StatusFlags::empty();
        prop_assert_eq!(verify_nmea_checksum(&bytes, &mut flags), !corrupt);
        prop_assert_eq!(flags.contains(StatusFlags::BAD_CHECKSUM), corrupt);

        let body_len = bytes.len() - 3;
        let exploded = explode(&bytes[..body_len], NMEA_FIELD_SEPARATOR);
        prop_assert_eq!(exploded.tag(), tag.as_str());
        prop_assert_eq!(exploded.len(), fields.len() + 1);
        for (i, f) in fields.iter().enumerate() {
            prop_assert_eq!(exploded.get(i + 1), f.as_str());
        }
        let expected = bytes[1..body_len].iter().fold(0, |acc, b| acc ^ b);
        prop_assert_eq!(checksum, expected);
    }

    #[test]
    fn test_binary_checksum_is_idempotent(
        id in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..100),
        garbage in any::<[u8; 2]>(),
    ) {
        let mut builder = FrameBuilder::start(id);
        builder.extend(&payload);
        let frame = builder.finish().unwrap();
        let mut bytes = frame.as_bytes().to_vec();
        let slot = bytes.len() - 4;
        bytes[slot] = garbage[0];
        bytes[slot + 1] = garbage[1];

        let first = binary_checksum(&mut bytes).unwrap();
        let patched = bytes.clone();
        let second = binary_checksum(&mut bytes).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(&patched, &bytes);
        prop_assert_eq!(&bytes[..], frame.as_bytes());
        prop_assert!(first.value() <= 0x7fff);
    }

    #[test]
    fn test_parse_decimal_matches_float(
        int in 0u32..100_000,
        frac in 0u32..10_000,
        negative in any::<bool>(),
    ) {
        let text = format!("{}{}.{:04}", if negative { "-" } else { "" }, int, frac);
        let expected = i64::from(int) * 100 + i64::from(frac / 100);
        let expected = if negative { -expected } else { expected };
        prop_assert_eq!(parse_decimal(&text), expected);
    }

    #[test]
    fn test_parse_degrees_matches_minutes(
        degrees in 0u32..180,
        minutes in 0u32..60,
        frac in 0u32..10_000,
    ) {
        let text = format!("{}{:02}.{:04}", degrees, minutes, frac);
        let value = f64::from(degrees) + (f64::from(minutes) + f64::from(frac) / 10_000.0) / 60.0;
        let parsed = parse_degrees(&text) as f64 / 100_000.0;
        prop_assert!((parsed - value).abs() < 1e-5, "{} parsed as {}", text, parsed);
    }
}

#[test]
fn test_parse_known_coordinate() {
    // 41°40.8217'
    assert_eq!(parse_decimal("4140.8217"), 414082);
    assert_eq!(parse_degrees("4140.8217"), 4168036);
    let degrees = 41.0 + 40.8217 / 60.0;
    assert!((parse_degrees("4140.8217") as f64 / 100_000.0 - degrees).abs() < 1e-5);
}
