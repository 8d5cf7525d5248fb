//! Domain model (IDs, task units, results, definitions).

pub mod definition;
pub mod ids;
pub mod outcome;
pub mod task;

pub use definition::{TaskDefinition, TimeoutPolicy};
pub use ids::{TaskId, WorkerId};
pub use outcome::{TaskReport, TaskResult, TaskStatus};
pub use task::{Payload, TaskType, TaskUnit};
