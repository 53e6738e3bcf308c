use thiserror::Error;

use crate::format::purpose::Purpose;

/// Everything that can go wrong while identifying or reading a spectrum file.
///
/// A failed file never yields a partial collection: every variant aborts the
/// read that raised it.
#[derive(Debug, Error)]
pub enum SpectraError {
    /// A required parameter combination was not supplied by the format config.
    #[error("misconfiguration: {0}")]
    Configuration(String),

    /// The role of a data unit could not be determined.
    #[error("cannot identify purpose: {0}")]
    PurposeResolution(String),

    /// An error unit appeared before any spectrum it could attach to, or
    /// after that spectrum already received its errors.
    #[error("no spectra to associate with {purpose}")]
    Association { purpose: Purpose },

    #[error("header keyword '{keyword}' is missing")]
    MissingKeyword { keyword: String },

    #[error("invalid unit '{unit}': {reason}")]
    InvalidUnit { unit: String, reason: String },

    /// The file is not a FITS file we can decode.
    #[error("malformed FITS data: {0}")]
    Fits(String),

    /// Parallel arrays of a spectrum disagree in length.
    #[error("array length mismatch: expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("no registered format recognises {0}")]
    NoMatchingFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpectraError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn purpose(message: impl Into<String>) -> Self {
        Self::PurposeResolution(message.into())
    }

    pub(crate) fn fits(message: impl Into<String>) -> Self {
        Self::Fits(message.into())
    }

    pub(crate) fn missing(keyword: impl Into<String>) -> Self {
        Self::MissingKeyword {
            keyword: keyword.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpectraError>;
