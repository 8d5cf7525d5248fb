//! Handler contract.
//!
//! A registered handler is a *blueprint*: it is shared read-only between all
//! worker loops, and every execution runs on a fresh instance produced by
//! `HandlerBlueprint::instantiate`. State a handler mutates during `execute`
//! is therefore never visible to a concurrent execution of the same type.

use async_trait::async_trait;

use crate::domain::{TaskResult, TaskUnit};
use crate::error::HandlerError;

/// Business logic for one task type.
///
/// `execute` receives the task with its input already resolved. Returning
/// `Err` or panicking both end up as a FAILED report.
#[async_trait]
pub trait TaskHandler: Send {
    async fn execute(&mut self, task: &TaskUnit) -> Result<TaskResult, HandlerError>;
}

/// Produces an isolated handler instance per execution.
pub trait HandlerBlueprint: Send + Sync {
    fn instantiate(&self) -> Box<dyn TaskHandler>;
}

/// Any cloneable handler is its own blueprint: one clone per execution.
impl<H> HandlerBlueprint for H
where
    H: TaskHandler + Clone + Sync + 'static,
{
    fn instantiate(&self) -> Box<dyn TaskHandler> {
        Box::new(self.clone())
    }
}
