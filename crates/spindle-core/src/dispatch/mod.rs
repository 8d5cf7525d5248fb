//! Dispatch - 公平な task_type の割り当て

mod table;

pub use table::{Assignment, DispatchStats, DispatchTable, Generation};
