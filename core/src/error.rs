use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TapeError {
    #[error("malformed audio container: {0}")]
    MalformedContainer(&'static str),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("length prefix does not match actual data length")]
    LengthMismatch,

    #[error("stored checksum does not match calculated checksum")]
    ChecksumMismatch,

    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    #[error("sample position out of range")]
    OutOfRange,
}

pub type Result<T> = std::result::Result<T, TapeError>;
