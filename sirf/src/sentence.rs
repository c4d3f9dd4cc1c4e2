use crate::{constants::*, text::Text};

pub type Field = Text<FIELD_CAPACITY>;

/// The NMEA sentences the driver understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SentenceKind {
    Gga,
    Gll,
    Gsa,
    Gsv,
    Rmc,
    Vtg,
}

impl SentenceKind {
    pub const ALL: [SentenceKind; 6] = [
        SentenceKind::Gga,
        SentenceKind::Gll,
        SentenceKind::Gsa,
        SentenceKind::Gsv,
        SentenceKind::Rmc,
        SentenceKind::Vtg,
    ];

    /// Field 0 of the sentence, including the `$`
    pub const fn tag(self) -> &'static str {
        match self {
            SentenceKind::Gga => "$GPGGA",
            SentenceKind::Gll => "$GPGLL",
            SentenceKind::Gsa => "$GPGSA",
            SentenceKind::Gsv => "$GPGSV",
            SentenceKind::Rmc => "$GPRMC",
            SentenceKind::Vtg => "$GPVTG",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Positional fields of one sentence.
///
/// At most [`MAX_FIELDS`] fields of at most [`FIELD_CAPACITY`] bytes each are
/// kept; anything beyond is dropped.
#[derive(Clone)]
pub struct Fields {
    fields: [Field; MAX_FIELDS],
    len: usize,
}

impl Fields {
    pub const fn new() -> Self {
        Self {
            fields: [Field::new(); MAX_FIELDS],
            len: 0,
        }
    }

    /// Field 0, e.g. `$GPGGA`
    pub fn tag(&self) -> &str {
        self.get(0)
    }

    pub fn kind(&self) -> Option<SentenceKind> {
        SentenceKind::from_tag(self.tag())
    }

    /// Field `idx`, or an empty string past the last field.
    pub fn get(&self, idx: usize) -> &str {
        if idx < self.len {
            self.fields[idx].as_str()
        } else {
            ""
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields[..self.len].iter().map(|f| f.as_str())
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Refills the fields from `line` split on `delimiter`.
    pub fn explode_into(&mut self, line: &[u8], delimiter: u8) {
        self.len = 0;
        for part in line.split(|&b| b == delimiter).take(MAX_FIELDS) {
            self.fields[self.len].set_bytes(part);
            self.len += 1;
        }
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.fields[..self.len] == other.fields[..other.len]
    }
}

impl Eq for Fields {}

impl Default for Fields {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Fields {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Splits `line` on `delimiter`.
///
/// Never fails: an empty line gives one empty field, a line without
/// delimiter gives one field and missing trailing fields read as empty.
pub fn explode(line: &[u8], delimiter: u8) -> Fields {
    let mut fields = Fields::new();
    fields.explode_into(line, delimiter);
    fields
}
