use core::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::{
    constants::*,
    device::Device,
    error::Error,
    mode::CommMode,
    sentence::{Field, Fields, SentenceKind},
    status::StatusFlags,
    transport::{Clock, Transport},
};

/// Navigation values as last reported by the receiver.
///
/// Every value is the verbatim token of the last sentence that carried it;
/// values are left untouched when a read fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Fix {
    time: Field,
    date: Field,
    latitude: Field,
    longitude: Field,
    altitude: Field,
    speed: Field,
    course: Field,
    fix_valid: bool,
}

impl Fix {
    /// UTC time, `hhmmss.sss`
    pub fn time(&self) -> &str {
        self.time.as_str()
    }

    /// UTC date, `ddmmyy`
    pub fn date(&self) -> &str {
        self.date.as_str()
    }

    /// `ddmm.mmmm`
    pub fn latitude(&self) -> &str {
        self.latitude.as_str()
    }

    /// `dddmm.mmmm`
    pub fn longitude(&self) -> &str {
        self.longitude.as_str()
    }

    /// Meters above mean sea level
    pub fn altitude(&self) -> &str {
        self.altitude.as_str()
    }

    /// Km/h over ground
    pub fn speed(&self) -> &str {
        self.speed.as_str()
    }

    /// True course over ground, degrees
    pub fn course(&self) -> &str {
        self.course.as_str()
    }

    /// The receiver reported a non-zero fix quality in its last GGA
    pub fn fix_valid(&self) -> bool {
        self.fix_valid
    }

    pub fn get(&self, field: FixField) -> &str {
        match field {
            FixField::Time => self.time(),
            FixField::Date => self.date(),
            FixField::Latitude => self.latitude(),
            FixField::Longitude => self.longitude(),
            FixField::Altitude => self.altitude(),
            FixField::Speed => self.speed(),
            FixField::Course => self.course(),
        }
    }

    pub fn utc_time(&self) -> Option<NaiveTime> {
        let s = self.time();
        let hour = two_digits(s, 0)?;
        let min = two_digits(s, 2)?;
        let sec = two_digits(s, 4)?;
        let milli = match s.as_bytes().get(6) {
            Some(b'.') => {
                let (frac, digits) = leading_digits(&s[7..]);
                // scale to exactly three digits
                match digits {
                    0 => 0,
                    1 => frac * 100,
                    2 => frac * 10,
                    3 => frac,
                    _ => frac / 10u64.pow((digits - 3) as u32),
                }
            }
            _ => 0,
        };
        NaiveTime::from_hms_milli_opt(hour, min, sec, u32::try_from(milli).ok()?)
    }

    pub fn utc_date(&self) -> Option<NaiveDate> {
        let s = self.date();
        let day = two_digits(s, 0)?;
        let month = two_digits(s, 2)?;
        let year = two_digits(s, 4)?;
        NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
    }

    pub fn utc_datetime(&self) -> Option<NaiveDateTime> {
        Some(self.utc_date()?.and_time(self.utc_time()?))
    }

    /// Latitude in hundred-thousandths of a degree, hemisphere not applied
    pub fn latitude_e5(&self) -> Option<u64> {
        non_empty(self.latitude()).map(parse_degrees)
    }

    /// Longitude in hundred-thousandths of a degree, hemisphere not applied
    pub fn longitude_e5(&self) -> Option<u64> {
        non_empty(self.longitude()).map(parse_degrees)
    }

    pub fn altitude_cm(&self) -> Option<i64> {
        non_empty(self.altitude()).map(parse_decimal)
    }

    /// Speed in hundredths of km/h
    pub fn speed_centi(&self) -> Option<i64> {
        non_empty(self.speed()).map(parse_decimal)
    }

    /// Course in hundredths of a degree
    pub fn course_centi(&self) -> Option<i64> {
        non_empty(self.course()).map(parse_decimal)
    }

    /// Copies the fields of a GGA, RMC or VTG sentence.
    ///
    /// Returns the sentence kind when `fields` was one of them.
    pub(crate) fn apply(&mut self, fields: &Fields) -> Option<SentenceKind> {
        let kind = fields.kind()?;
        match kind {
            SentenceKind::Gga => {
                self.time.set(fields.get(1));
                self.latitude.set(fields.get(2));
                self.longitude.set(fields.get(4));
                self.fix_valid = fix_quality(fields.get(6)) != 0;
                self.altitude.set(fields.get(9));
            }
            SentenceKind::Rmc => {
                self.time.set(fields.get(1));
                self.date.set(fields.get(9));
            }
            SentenceKind::Vtg => {
                self.course.set(fields.get(1));
                self.speed.set(fields.get(7));
            }
            SentenceKind::Gll | SentenceKind::Gsa | SentenceKind::Gsv => return None,
        }
        Some(kind)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn two_digits(s: &str, at: usize) -> Option<u32> {
    match s.as_bytes().get(at..at + 2)? {
        [h @ b'0'..=b'9', l @ b'0'..=b'9'] => Some(u32::from(h - b'0') * 10 + u32::from(l - b'0')),
        _ => None,
    }
}

/// Fix quality digit of a GGA, 0 when the field is not a digit
fn fix_quality(field: &str) -> u8 {
    match field.as_bytes().first() {
        Some(&d) if d.is_ascii_digit() => d - b'0',
        _ => 0,
    }
}

/// Value of the leading decimal digits of `s` and how many there were
fn leading_digits(s: &str) -> (u64, usize) {
    let mut value = 0u64;
    let mut count = 0;
    for d in s.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(u64::from(d - b'0'));
        count += 1;
    }
    (value, count)
}

/// Parses a decimal number into hundredths: `"-12.34"` is `-1234`.
///
/// Fraction digits past the second are ignored, parsing stops at the first
/// unexpected character.
pub fn parse_decimal(s: &str) -> i64 {
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int, digits) = leading_digits(s);
    let mut value = i64::try_from(int).unwrap_or(i64::MAX).saturating_mul(100);
    let frac = s[digits..].as_bytes();
    if let [b'.', tenths, rest @ ..] = frac {
        if tenths.is_ascii_digit() {
            value = value.saturating_add(i64::from(tenths - b'0') * 10);
            if let [hundredths, ..] = rest {
                if hundredths.is_ascii_digit() {
                    value = value.saturating_add(i64::from(hundredths - b'0'));
                }
            }
        }
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Converts `[d]ddmm.mmmm` degrees and minutes into hundred-thousandths of a
/// degree: `"4140.8217"` is `4168036`.
///
/// Minute fraction digits past the fourth are ignored.
pub fn parse_degrees(s: &str) -> u64 {
    let (left, digits) = leading_digits(s);
    let mut ten_thousandth_minutes = (left % 100) * 10_000;
    if let Some(frac) = s[digits..].strip_prefix('.') {
        let mut mult = 1000;
        for d in frac.bytes().take_while(u8::is_ascii_digit) {
            ten_thousandth_minutes += mult * u64::from(d - b'0');
            mult /= 10;
        }
    }
    (left / 100).saturating_mul(100_000) + ten_thousandth_minutes / 6
}

/// A navigation value that can be read on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixField {
    Time,
    Date,
    Latitude,
    Longitude,
    Altitude,
    Speed,
    Course,
}

impl FixField {
    pub const ALL: [FixField; 7] = [
        FixField::Time,
        FixField::Date,
        FixField::Latitude,
        FixField::Longitude,
        FixField::Altitude,
        FixField::Speed,
        FixField::Course,
    ];

    /// Sentence carrying the value
    pub const fn sentence(self) -> SentenceKind {
        match self {
            FixField::Time | FixField::Latitude | FixField::Longitude | FixField::Altitude => {
                SentenceKind::Gga
            }
            FixField::Date => SentenceKind::Rmc,
            FixField::Speed | FixField::Course => SentenceKind::Vtg,
        }
    }

    /// Mode that makes the receiver send only that sentence
    pub const fn mode(self) -> CommMode {
        match self.sentence() {
            SentenceKind::Gga => CommMode::NmeaGga,
            SentenceKind::Rmc => CommMode::NmeaRmc,
            SentenceKind::Vtg => CommMode::NmeaVtg,
            SentenceKind::Gll => CommMode::NmeaGll,
            SentenceKind::Gsa => CommMode::NmeaGsa,
            SentenceKind::Gsv => CommMode::NmeaGsv,
        }
    }

    /// Position values are meaningless without a fix
    const fn needs_fix(self) -> bool {
        matches!(
            self,
            FixField::Latitude | FixField::Longitude | FixField::Altitude
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            FixField::Time => "time",
            FixField::Date => "date",
            FixField::Latitude => "latitude",
            FixField::Longitude => "longitude",
            FixField::Altitude => "altitude",
            FixField::Speed => "speed",
            FixField::Course => "course",
        }
    }
}

impl fmt::Display for FixField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FixField {
    type Err = ParseFixFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FixField::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(s))
            .ok_or(ParseFixFieldError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFixFieldError;

impl fmt::Display for ParseFixFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(concat!(
            "unknown field, expected one of: ",
            "time, date, latitude, longitude, altitude, speed, course"
        ))
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseFixFieldError {}

#[derive(Default)]
struct Seen {
    gga: bool,
    rmc: bool,
    vtg: bool,
}

impl Seen {
    fn complete(&self) -> bool {
        self.gga && self.rmc && self.vtg
    }
}

impl<T, C, P> Device<T, C, P>
where
    T: Transport,
    C: Clock,
    P: OutputPin,
{
    /// Reads one value, switching the receiver to the sentence carrying it
    /// and back.
    ///
    /// Sets [`StatusFlags::INVALID`] and returns the previous value when the
    /// receiver sent something else, or has no fix for a position value.
    pub fn read_field(&mut self, field: FixField) -> Result<&str, Error<T::Error>> {
        self.flags.remove(StatusFlags::INVALID);
        let previous = self.comm_mode;
        if self.enter_mode(field.mode())? {
            self.extract(field.sentence(), field.needs_fix());
        } else {
            self.flags.insert(StatusFlags::INVALID);
        }
        self.restore_mode(previous)?;
        Ok(self.fix.get(field))
    }

    pub fn time(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Time)
    }

    pub fn date(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Date)
    }

    pub fn latitude(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Latitude)
    }

    pub fn longitude(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Longitude)
    }

    pub fn altitude(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Altitude)
    }

    pub fn speed(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Speed)
    }

    pub fn course(&mut self) -> Result<&str, Error<T::Error>> {
        self.read_field(FixField::Course)
    }

    /// Reads time, date, position, speed and course in one pass over the full
    /// NMEA output.
    ///
    /// Returns `true` when GGA, RMC and VTG were all seen within the position
    /// window and the receiver has a fix. Sets [`StatusFlags::TIMEOUT`] when
    /// the window closed first.
    pub fn position(&mut self) -> Result<bool, Error<T::Error>> {
        self.flags.remove(StatusFlags::INVALID | StatusFlags::TIMEOUT);
        let previous = self.comm_mode;
        if !self.enter_mode(CommMode::NmeaAll)? {
            self.flags.insert(StatusFlags::INVALID);
            self.restore_mode(previous)?;
            return Ok(false);
        }

        let window = self.channel.deadline(self.config.position_window_ms);
        let mut seen = Seen::default();
        let mut timed_out = false;
        self.collect_sentence(&mut seen);
        while !seen.complete() {
            self.reader
                .read_next_line(
                    &mut self.channel,
                    &mut self.flags,
                    0,
                    self.config.byte_timeout_ms,
                    &window,
                )
                .map_err(Error::Transport)?;
            if self.flags.contains(StatusFlags::TIMEOUT) {
                warn!("incomplete fix after {} ms", self.config.position_window_ms);
                timed_out = true;
                break;
            }
            self.fields
                .explode_into(self.reader.as_bytes(), NMEA_FIELD_SEPARATOR);
            self.collect_sentence(&mut seen);
        }

        self.restore_mode(previous)?;
        if timed_out {
            self.flags.insert(StatusFlags::TIMEOUT);
        }
        Ok(seen.complete() && !self.flags.contains(StatusFlags::INVALID))
    }

    /// Whether the receiver reports a satellite fix.
    pub fn has_fix(&mut self) -> Result<bool, Error<T::Error>> {
        self.flags.remove(StatusFlags::INVALID);
        let previous = self.comm_mode;
        let locked = if self.enter_mode(CommMode::NmeaGga)? {
            self.extract(SentenceKind::Gga, true);
            !self.flags.contains(StatusFlags::INVALID)
        } else {
            self.flags.insert(StatusFlags::INVALID);
            false
        };
        self.restore_mode(previous)?;
        Ok(locked)
    }

    /// Applies the current sentence when it is `expected`.
    fn extract(&mut self, expected: SentenceKind, needs_fix: bool) {
        if self.fields.kind() != Some(expected) {
            warn!("expected {}, got {:?}", expected.tag(), self.fields.tag());
            self.flags.insert(StatusFlags::INVALID);
            return;
        }
        self.fix.apply(&self.fields);
        if needs_fix && !self.fix.fix_valid() {
            debug!("receiver has no fix");
            self.flags.insert(StatusFlags::INVALID);
        }
    }

    fn collect_sentence(&mut self, seen: &mut Seen) {
        match self.fix.apply(&self.fields) {
            Some(SentenceKind::Gga) => {
                seen.gga = true;
                if !self.fix.fix_valid() {
                    self.flags.insert(StatusFlags::INVALID);
                }
            }
            Some(SentenceKind::Rmc) => seen.rmc = true,
            Some(SentenceKind::Vtg) => seen.vtg = true,
            _ => {},
        }
    }
}
