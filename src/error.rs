
//! Error type returned by the decoder.
//! Recoverable conditions never surface here: the section walkers
//! seek to the recorded end offset and carry on instead.

use std::borrow::Cow;
use std::io::ErrorKind;


/// A result that may fail with a parse [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A result with no useful success value.
pub type UnitResult = Result<()>;

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;

/// All possible fatal conditions of a decoding pass.
#[derive(Debug)]
pub enum Error {
    /// The contents of the file are not handled by this implementation,
    /// for example a raw-data descriptor value.
    NotSupported(Cow<'static, str>),

    /// The contents of the file are corrupt or insufficient:
    /// a signature, version, discriminant or range check failed,
    /// or the stream ended where the format guarantees more bytes.
    Invalid(Cow<'static, str>),

    /// The underlying byte stream could not be read correctly.
    Io(IoError),
}


impl Error {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Invalid(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::NotSupported(message.into())
    }

    pub(crate) fn end_of_stream() -> Self {
        Error::invalid("unexpected end of stream")
    }
}


/// Enable using the `?` operator on io::Result.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        if error.kind() == ErrorKind::UnexpectedEof {
            Error::end_of_stream()
        }

        else {
            Error::Io(error)
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotSupported(message) => write!(formatter, "not supported: {}", message),
            Error::Invalid(message) => write!(formatter, "invalid file: {}", message),
            Error::Io(error) => write!(formatter, "io error: {}", error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            _ => None,
        }
    }
}
