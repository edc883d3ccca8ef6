use cohort_core::Uid;
use thiserror::Error;

/// Errors raised by UID allocation and UID-keyed storage.
///
/// Every array error names the array (its label) so a failing simulation
/// step points straight at the offending state column.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("{array}: {uid} was never allocated")]
    UnknownUid { array: String, uid: Uid },

    #[error("{array}: {uid} was reclaimed by compaction (now at epoch {epoch})")]
    Reclaimed { array: String, uid: Uid, epoch: u64 },

    #[error("{array}: {uids} UIDs but {values} values")]
    ShapeMismatch { array: String, uids: usize, values: usize },

    #[error("{array}: {uid} is not newer than every UID already stored")]
    NotFresh { array: String, uid: Uid },

    #[error("invalid allocation count: {0}")]
    InvalidCount(String),

    #[error("UID space exhausted: requested {requested}, {remaining} remaining")]
    UidSpaceExhausted { requested: usize, remaining: usize },

    #[error("population snapshot does not fit: {0}")]
    SnapshotMismatch(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
