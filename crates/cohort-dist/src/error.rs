use cohort_agent::AgentError;
use thiserror::Error;

/// Errors raised while building, binding, or drawing from distributions.
///
/// `dist` fields carry [`Distribution::describe`][crate::Distribution::describe]:
/// the label plus the structural path once bound.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistError {
    #[error("duplicate stream identity {path}: already registered by `{existing}`, claimed again by `{incoming}`")]
    DuplicateStreamIdentity {
        path:     String,
        existing: String,
        incoming: String,
    },

    #[error("distribution `{dist}` is already bound to {bound}; cannot rebind to {requested}")]
    AlreadyBound {
        dist:      String,
        bound:     String,
        requested: String,
    },

    #[error("distribution `{dist}` is not bound to a stream")]
    NotBound { dist: String },

    #[error("distribution `{dist}`: invalid draw count: {reason}")]
    InvalidDrawCount { dist: String, reason: String },

    #[error("distribution `{dist}`: invalid parameter `{param}`: {reason}")]
    InvalidParameter {
        dist:   String,
        param:  String,
        reason: String,
    },

    #[error("distribution `{dist}`: stream state belongs to stream {found:#018x}, expected {expected:#018x}")]
    StateMismatch { dist: String, expected: u64, found: u64 },

    #[error(transparent)]
    Agent(#[from] AgentError),
}

pub type DistResult<T> = Result<T, DistError>;
