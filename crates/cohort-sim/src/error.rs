use cohort_agent::AgentError;
use cohort_core::CoreError;
use cohort_dist::DistError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Dist(#[from] DistError),

    #[error("module `{module}`: {message}")]
    Module { module: String, message: String },

    #[error("simulation is already initialized")]
    AlreadyInitialized,

    #[error("simulation is not initialized; call `init` first")]
    NotInitialized,

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl SimError {
    pub fn module(module: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::Module { module: module.into(), message: message.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
