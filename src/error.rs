use thiserror::Error;

use crate::dcrt_poly::Format;

#[derive(Error, Debug)]
pub enum DcrtError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid dimension: expected {expected}, got {got}")]
    InvalidDimension {
        expected: usize,
        got: usize,
    },

    #[error("Invalid modulus: {0}")]
    InvalidModulus(String),

    #[error("Domain state mismatch: {left:?} vs {right:?}")]
    DomainStateMismatch {
        left: Format,
        right: Format,
    },

    #[error("Operation requires {required:?} format, polynomial is in {found:?} format")]
    FormatRequired {
        required: Format,
        found: Format,
    },

    #[error("Index ({row}, {col}) out of range for {rows}x{cols} matrix")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Spectral bound violation: s = {spectral_bound} must exceed c = {base_width}")]
    SpectralBoundViolation {
        spectral_bound: f64,
        base_width: f64,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error at {path}: {reason}")]
    SerializationError {
        path: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DcrtError>;

impl DcrtError {
    /// Builds a `SerializationError` for a file path or a stream label.
    pub(crate) fn serialization(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SerializationError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<num_bigint::ParseBigIntError> for DcrtError {
    fn from(err: num_bigint::ParseBigIntError) -> Self {
        Self::ParseError(format!("Big integer decoding error: {}", err))
    }
}
