//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

/// The base error type for `cohort-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid count: {0}")]
    InvalidCount(String),
}

/// Shorthand result type for `cohort-core`.
pub type CoreResult<T> = Result<T, CoreError>;
