use thiserror::Error;

use crate::domain::TaskType;

/// Errors that stop the engine.
///
/// Everything else (lost claims, handler failures, report failures) is
/// absorbed by the worker loops and only shows up in task reports and logs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("orchestrator queue unreachable after {failures} consecutive poll failures")]
    QueueUnreachable { failures: u32 },

    #[error("background loop panicked: {0}")]
    LoopPanicked(String),
}

/// Failure talking to the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),

    #[error("orchestrator rejected request: {0}")]
    Rejected(String),

    #[error("task {0} not known to orchestrator")]
    UnknownTask(String),

    #[error("external payload not found: {0}")]
    PayloadNotFound(String),
}

/// Error returned by a handler.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Business logic failed.
    #[error("{0}")]
    Failed(String),

    /// The handler produced a result outside the contract.
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// A handler returned something that does not satisfy the result contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("handler returned non-terminal status {0}")]
    NonTerminalStatus(String),

    #[error("callback_delay_seconds must be >= 0, got {0}")]
    NegativeCallbackDelay(i64),

    #[error("malformed handler result: {0}")]
    Malformed(String),
}

/// Errors detected while assembling an engine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<TaskType>),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}
