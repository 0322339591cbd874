//! Error type shared by the encoding, dataset and model code.

use thiserror::Error;

/// Every failure the library can report.
///
/// Only validation problems live here. Tensor shape errors surface as
/// [`Error::Tch`] from libtorch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid year: {0} (must be 1000-9999)")]
    InvalidYear(u16),

    #[error("Invalid month: {0} (must be 1-12)")]
    InvalidMonth(u8),

    #[error("Invalid day {day} for month {year}-{month:02}")]
    InvalidDay { year: u16, month: u8, day: u8 },

    #[error("minYear {min_year} must be smaller than maxYear {max_year}")]
    InvalidYearRange { min_year: u16, max_year: u16 },

    #[error("Invalid split: train {train} / validation {validation}")]
    InvalidSplit { train: f64, validation: f64 },

    /// A character outside the vocabulary was found while encoding.
    #[error("Unknown char {ch:?} at position {position}")]
    UnknownChar { ch: char, position: usize },

    #[error("Unknown vocabulary index: {0}")]
    UnknownIndex(i64),

    #[error("Input {input:?} is longer than {max} characters")]
    InputTooLong { input: String, max: usize },

    #[error("Empty date string")]
    EmptyInput,

    #[error("Date string is not in ISO format: {0:?}")]
    NotIsoFormat(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown alignment: {0}")]
    UnknownAlignment(String),

    /// A model dimension that the vocabulary fixes was set to something else.
    #[error("Model {field} must be {expected}, got {value}")]
    ModelFieldMismatch {
        field: &'static str,
        value: i64,
        expected: i64,
    },

    #[error("Model {field} must be positive, got {value}")]
    NonPositiveDim { field: &'static str, value: i64 },

    #[error("Dataset has no rows")]
    EmptyDataset,

    #[error(transparent)]
    Tch(#[from] tch::TchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
