//! Identifiers.
//!
//! - `TaskId` は orchestrator が払い出す文字列 ID（こちらでは生成しない）
//! - `WorkerId` はこのプロセスが ULID から生成する
//!
//! ULID は時刻でソート可能なので、ログ上でワーカーの起動順がそのまま読める。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a claimed task unit, assigned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of one worker loop, sent with every claim and report.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(Ulid);

impl WorkerId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for WorkerId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_display_has_prefix() {
        let ulid = Ulid::new();
        let id = WorkerId::from_ulid(ulid);
        assert_eq!(id.to_string(), format!("worker-{ulid}"));
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn worker_ids_sort_by_creation_time() {
        let id1 = WorkerId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = WorkerId::from_ulid(Ulid::new());
        assert!(id1 < id2);
    }

    #[test]
    fn task_id_serializes_as_plain_string() {
        let id = TaskId::new("t-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t-42\"");
        let back: TaskId = serde_json::from_str("\"t-42\"").unwrap();
        assert_eq!(back, id);
    }
}
