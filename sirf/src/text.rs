use core::fmt;

/// Fixed-capacity byte string.
///
/// Receiver output is ASCII but is not guaranteed to be: garbage bytes are
/// kept as-is and [`Text::as_str`] returns the longest valid UTF-8 prefix.
#[derive(Clone, Copy)]
pub struct Text<const N: usize> {
    buffer: [u8; N],
    len: usize,
}

impl<const N: usize> Text<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            len: 0,
        }
    }

    /// Builds a text from `s`, truncated to the capacity.
    pub fn from_str_truncated(s: &str) -> Self {
        let mut text = Self::new();
        text.set(s);
        text
    }

    /// Replaces the contents with `bytes`, truncated to the capacity.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        let to_copy = core::cmp::min(bytes.len(), N);
        self.buffer[..to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len = to_copy;
    }

    /// Replaces the contents with `s`, cut at the last char boundary that fits.
    pub fn set(&mut self, s: &str) {
        let mut end = core::cmp::min(s.len(), N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.set_bytes(&s.as_bytes()[..end]);
    }

    /// Appends a byte. Returns `false` when the buffer is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == N {
            return false;
        }
        self.buffer[self.len] = byte;
        self.len += 1;
        true
    }

    /// Removes the last byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.buffer[self.len])
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn last(&self) -> Option<u8> {
        self.as_bytes().last().copied()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.len]
    }

    pub fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
        }
    }
}

impl<const N: usize> Default for Text<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for Text<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for Text<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formatting into a full buffer fails instead of silently truncating.
impl<const N: usize> fmt::Write for Text<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if s.len() > N - self.len {
            return Err(fmt::Error);
        }
        for b in s.bytes() {
            self.push(b);
        }
        Ok(())
    }
}

/// Only the contents count, not what is left in the buffer past them.
impl<const N: usize> PartialEq for Text<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for Text<N> {}

impl<const N: usize> PartialEq<str> for Text<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> PartialEq<&str> for Text<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

#[cfg(feature = "serde")]
impl<const N: usize> serde::Serialize for Text<N> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Strings longer than the capacity are rejected, not truncated.
#[cfg(feature = "serde")]
impl<'de, const N: usize> serde::Deserialize<'de> for Text<N> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextVisitor<const N: usize>;

        impl<const N: usize> serde::de::Visitor<'_> for TextVisitor<N> {
            type Value = Text<N>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a string of at most {} bytes", N)
            }

            fn visit_str<E: serde::de::Error>(self, s: &str) -> Result<Text<N>, E> {
                if s.len() > N {
                    return Err(E::invalid_length(s.len(), &self));
                }
                Ok(Text::from_str_truncated(s))
            }
        }

        deserializer.deserialize_str(TextVisitor)
    }
}
