use thiserror::Error;

/// Alias for `Result<T, bson2json::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced while transcoding a BSON document.
///
/// Every error is fatal to the current transcode call; no local recovery is
/// attempted. Output produced before the fault is discarded by its owner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,

    /// The document key being transcoded when the error occurred, if known.
    pub key: Option<String>,

    /// The array index being transcoded when the error occurred, if known.
    pub index: Option<usize>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(key) = self.key.as_deref() {
            write!(f, "error at key \"{key}\": ")?;
        } else if let Some(index) = self.index {
            write!(f, "error at array index {index}: ")?;
        }

        write!(f, "{}", self.kind)
    }
}

/// The kinds of errors that can occur while transcoding.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input buffer is shorter than the smallest possible document.
    #[error("input buffer must have length >= 5")]
    InputTooShort,

    /// A document length field is smaller than the smallest possible
    /// document.
    #[error("BSON size must be >= 5")]
    BsonSizeTooSmall,

    /// A document length field reaches past the end of the input.
    #[error("BSON size exceeds input length")]
    BsonSizeExceedsInput,

    /// A string length header is non-positive or extends past the input.
    #[error("bad string length")]
    BadStringLength,

    /// A fixed-length payload runs off the end of the input.
    #[error("truncated BSON (in {0})")]
    TruncatedPayload(&'static str),

    /// The last byte of a nested array body is not zero.
    #[error("invalid array terminator byte")]
    InvalidArrayTerminator,

    /// A field name has no null terminator before the end of the input.
    #[error("field name terminator not found")]
    NameTerminatorMissing,

    /// A BSON type with no JSON projection was encountered.
    #[error("BSON type {0:#04x} is incompatible with JSON")]
    IncompatibleType(u8),

    /// A type tag outside the BSON specification was encountered.
    #[error("unknown BSON type {0:#04x}")]
    UnknownType(u8),

    /// Growing the output buffer failed.
    #[error("allocation failure")]
    OutOfMemory,

    /// Document nesting exceeds the recursion limit.
    #[error("document nesting exceeds depth limit")]
    RecursionLimitExceeded,

    /// A paused transcode was abandoned by its consumer.
    #[error("transcode aborted by consumer")]
    Aborted,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            key: None,
            index: None,
        }
    }
}

impl Error {
    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub(crate) fn truncated(what: &'static str) -> Self {
        ErrorKind::TruncatedPayload(what).into()
    }
}
