//! Error types for the expense crate.
//!
//! - `ExpenseError`: a field failed validation, never retried
//! - `StoreError`: the storage collaborator failed, possibly transient

use std::fmt;

/// Validation errors for expense fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseError {
    /// Expense name was empty.
    EmptyName,
    /// Date was not a valid `YYYY-MM-DD` calendar date.
    InvalidDate { value: String },
    /// Amount was negative, infinite or NaN.
    InvalidAmount { value: String },
    /// Category is not one of the supported values.
    UnknownCategory { value: String },
    /// Start of a date range lies after its end.
    InvertedRange { start: String, end: String },
}

impl fmt::Display for ExpenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "expense name must not be empty"),
            Self::InvalidDate { value } => {
                write!(f, "invalid date '{value}', expected YYYY-MM-DD")
            }
            Self::InvalidAmount { value } => {
                write!(f, "invalid amount '{value}', expected a non-negative number")
            }
            Self::UnknownCategory { value } => {
                write!(
                    f,
                    "unknown category '{value}', expected one of food, clothing, housing, transport"
                )
            }
            Self::InvertedRange { start, end } => {
                write!(f, "start date {start} is after end date {end}")
            }
        }
    }
}

impl std::error::Error for ExpenseError {}

/// Errors from the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached or the operation failed in transit.
    Unavailable { reason: String },
    /// A stored record could not be decoded.
    Corrupt { reason: String },
}

impl StoreError {
    /// Returns true if repeating the operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "expense store unavailable: {reason}"),
            Self::Corrupt { reason } => write!(f, "corrupt expense record: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}
