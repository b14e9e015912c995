//! Shared error type across tally crates.

use thiserror::Error;

use crate::kind::Kind;

/// Stable error codes (used in test vectors and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A metric with this name already exists.
    DuplicateName,
    /// The declared maximum number of metrics is reached.
    CapacityExceeded,
    /// Metadata was already written to the block.
    AlreadySealed,
    /// A constant metric was written twice.
    ConstantAlreadySet,
    /// Values cannot be written before the block exists.
    NotSealed,
    /// Value kind does not match the slot kind.
    KindMismatch,
    /// Slot does not belong to this producer.
    InvalidSlot,
    /// Rejected metric definition.
    InvalidDefinition,
    /// Caller-supplied block cannot hold the layout.
    BlockTooSmall,
    /// Block was written by a different protocol version.
    VersionMismatch,
    /// Region is shorter than the header declares.
    Truncated,
    /// Inconsistent or out-of-bounds encoding.
    Malformed,
    /// Kind byte outside the known set.
    UnknownKind,
    /// Metadata length disagrees with the decoded records.
    SizeMismatch,
    /// No metric with this name.
    UnknownMetric,
}

impl ErrorCode {
    /// String representation used in vectors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateName => "DUPLICATE_NAME",
            ErrorCode::CapacityExceeded => "CAPACITY_EXCEEDED",
            ErrorCode::AlreadySealed => "ALREADY_SEALED",
            ErrorCode::ConstantAlreadySet => "CONSTANT_ALREADY_SET",
            ErrorCode::NotSealed => "NOT_SEALED",
            ErrorCode::KindMismatch => "KIND_MISMATCH",
            ErrorCode::InvalidSlot => "INVALID_SLOT",
            ErrorCode::InvalidDefinition => "INVALID_DEFINITION",
            ErrorCode::BlockTooSmall => "BLOCK_TOO_SMALL",
            ErrorCode::VersionMismatch => "VERSION_MISMATCH",
            ErrorCode::Truncated => "TRUNCATED",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::UnknownKind => "UNKNOWN_KIND",
            ErrorCode::SizeMismatch => "SIZE_MISMATCH",
            ErrorCode::UnknownMetric => "UNKNOWN_METRIC",
        }
    }

    /// True for faults caused by foreign or corrupted memory rather than by
    /// the calling code. Callers may treat these as "producer not ready".
    pub fn is_consumer_side(self) -> bool {
        matches!(
            self,
            ErrorCode::VersionMismatch
                | ErrorCode::Truncated
                | ErrorCode::Malformed
                | ErrorCode::UnknownKind
                | ErrorCode::SizeMismatch
        )
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type used by the producer, the consumer and the codec.
#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate metric name: {0}")]
    DuplicateName(String),
    #[error("capacity exceeded: at most {max} metrics")]
    CapacityExceeded { max: usize },
    #[error("metrics already sealed")]
    AlreadySealed,
    #[error("constant metric already set: {0}")]
    ConstantAlreadySet(String),
    #[error("metrics not sealed yet")]
    NotSealed,
    #[error("kind mismatch: slot is {expected:?}, value is {found:?}")]
    KindMismatch { expected: Kind, found: Option<Kind> },
    #[error("slot does not belong to this metrics block")]
    InvalidSlot,
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
    #[error("block too small: need {required} bytes, have {available}")]
    BlockTooSmall { required: usize, available: usize },
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("truncated block: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("malformed block: {0}")]
    Malformed(String),
    #[error("unknown kind code: {0}")]
    UnknownKind(u8),
    #[error("metadata size mismatch: declared {declared} bytes, consumed {consumed}")]
    SizeMismatch { declared: usize, consumed: usize },
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
}

impl Error {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::DuplicateName(_) => ErrorCode::DuplicateName,
            Error::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            Error::AlreadySealed => ErrorCode::AlreadySealed,
            Error::ConstantAlreadySet(_) => ErrorCode::ConstantAlreadySet,
            Error::NotSealed => ErrorCode::NotSealed,
            Error::KindMismatch { .. } => ErrorCode::KindMismatch,
            Error::InvalidSlot => ErrorCode::InvalidSlot,
            Error::InvalidDefinition(_) => ErrorCode::InvalidDefinition,
            Error::BlockTooSmall { .. } => ErrorCode::BlockTooSmall,
            Error::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Error::Truncated { .. } => ErrorCode::Truncated,
            Error::Malformed(_) => ErrorCode::Malformed,
            Error::UnknownKind(_) => ErrorCode::UnknownKind,
            Error::SizeMismatch { .. } => ErrorCode::SizeMismatch,
            Error::UnknownMetric(_) => ErrorCode::UnknownMetric,
        }
    }
}
