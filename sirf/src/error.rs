use core::fmt;

/// Hard failures of a receiver session.
///
/// Protocol trouble (silence, unexpected sentences, bad checksums) is never an
/// error: it is reported through [`StatusFlags`](crate::StatusFlags).
#[derive(Debug)]
pub enum Error<E> {
    /// The byte transport failed
    Transport(E),
    /// The power line could not be driven
    Power(embedded_hal::digital::ErrorKind),
    /// A command could not be encoded
    Frame(FrameError),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {:?}", e),
            Error::Power(kind) => write!(f, "power line error: {}", kind),
            Error::Frame(e) => write!(f, "cannot encode command: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}

/// Failures of the persistent storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The file does not exist or cannot be opened
    FileOpen,
    /// Reading past the end of the file
    Seek,
    Write,
    Create,
    Delete,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileOpen => f.write_str("cannot open file"),
            StorageError::Seek => f.write_str("seek past end of file"),
            StorageError::Write => f.write_str("cannot write file"),
            StorageError::Create => f.write_str("cannot create file"),
            StorageError::Delete => f.write_str("cannot delete file"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StorageError {}

/// Errors when building or checking a binary frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload does not fit in a frame
    TooLong { max: usize, got: usize },
    /// No `B0 B3` end sequence after the checksum slots
    MissingEndSequence,
    /// Formatted sentence does not fit the line buffer
    SentenceTooLong,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLong { max, got } => {
                write!(f, "payload too long, max {}, got {}", max, got)
            }
            FrameError::MissingEndSequence => f.write_str("frame has no end sequence"),
            FrameError::SentenceTooLong => f.write_str("sentence does not fit the line buffer"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}
