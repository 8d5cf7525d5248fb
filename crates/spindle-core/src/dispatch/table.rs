//! DispatchTable - どの task_type を次に claim しに行くかを決める共有テーブル
//!
//! # 状態
//! - handler registry + 登録順の task_type 列（round-robin 用）
//! - generation: refresh のたびに進むトークン
//! - snapshot: 今の generation で claim を試す価値がある残り件数
//! - running: dispatch 済みでまだ精算されていない件数（観測用）
//!
//! 全操作は短い read-modify-write なので、std の Mutex 1 本で守る。
//! ロックを保持したまま `.await` することはない。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::domain::TaskType;
use crate::handler::HandlerBlueprint;

/// Version token of one queue snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// The task type a worker should try to claim next.
#[derive(Clone)]
pub struct Assignment {
    task_type: TaskType,
    blueprint: Arc<dyn HandlerBlueprint>,
    generation: Generation,
}

impl Assignment {
    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn blueprint(&self) -> &Arc<dyn HandlerBlueprint> {
        &self.blueprint
    }

    /// Generation of the snapshot this assignment was drawn from.
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl fmt::Debug for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assignment")
            .field("task_type", &self.task_type)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the table, for logs and status endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub generation: u64,
    pub registered: usize,
    pub pending: BTreeMap<TaskType, i64>,
    pub running: BTreeMap<TaskType, u64>,
}

struct TableState {
    handlers: HashMap<TaskType, Arc<dyn HandlerBlueprint>>,
    order: Vec<TaskType>,
    cursor: usize,
    generation: Generation,
    snapshot: HashMap<TaskType, i64>,
    running: HashMap<TaskType, u64>,
}

impl TableState {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
            cursor: 0,
            generation: Generation(0),
            snapshot: HashMap::new(),
            running: HashMap::new(),
        }
    }

    fn release(&mut self, task_type: &TaskType) {
        if let Some(count) = self.running.get_mut(task_type) {
            *count = count.saturating_sub(1);
        }
    }

    /// Advance the cursor until it lands on a type with budget left.
    ///
    /// snapshot のキーは必ず order に含まれる（refresh で絞り込み済み）ので、
    /// snapshot が空でなければ order.len() 回以内に見つかる。
    fn advance_to_pending(&mut self) -> Option<TaskType> {
        let len = self.order.len();
        for _ in 0..len {
            let candidate = &self.order[self.cursor];
            self.cursor = (self.cursor + 1) % len;
            if self.snapshot.contains_key(candidate) {
                return Some(candidate.clone());
            }
        }
        None
    }
}

/// Shared fairness structure between the queue-size poller and the workers.
pub struct DispatchTable {
    state: Mutex<TableState>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::new()),
        }
    }

    // どの操作も途中で panic しないので、poison されても中身は整合している
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler blueprint.
    ///
    /// Re-registering a type replaces its blueprint but keeps its
    /// round-robin position.
    pub fn register(&self, task_type: TaskType, blueprint: Arc<dyn HandlerBlueprint>) {
        let mut state = self.lock();
        if state.handlers.insert(task_type.clone(), blueprint).is_none() {
            state.order.push(task_type);
        }
    }

    /// Replace the snapshot with fresh remote counts and mint a new
    /// generation. Unregistered types and non-positive counts are dropped.
    pub fn refresh(&self, remote_counts: HashMap<TaskType, i64>) -> Generation {
        let mut state = self.lock();
        let snapshot: HashMap<TaskType, i64> = remote_counts
            .into_iter()
            .filter(|(task_type, count)| *count > 0 && state.handlers.contains_key(task_type))
            .collect();
        state.generation = state.generation.next();
        state.snapshot = snapshot;
        state.generation
    }

    /// Pick the next task type to try, round-robin over types with budget.
    ///
    /// `previous_type` is the type of the assignment the caller just
    /// finished with; its running count is released first.
    pub fn next(&self, previous_type: Option<&TaskType>) -> Option<Assignment> {
        let mut state = self.lock();

        if let Some(previous) = previous_type {
            state.release(previous);
        }

        if state.snapshot.is_empty() {
            return None;
        }

        let task_type = state.advance_to_pending()?;

        *state.running.entry(task_type.clone()).or_insert(0) += 1;
        if let Some(budget) = state.snapshot.get_mut(&task_type) {
            *budget -= 1;
            if *budget <= 0 {
                state.snapshot.remove(&task_type);
            }
        }

        let blueprint = Arc::clone(state.handlers.get(&task_type)?);
        Some(Assignment {
            task_type,
            blueprint,
            generation: state.generation,
        })
    }

    /// Report that a claim for `assignment` came back empty.
    ///
    /// The type is dropped from the snapshot only if the snapshot is still
    /// the one the assignment was drawn from; a signal from an older
    /// generation must not touch a fresher snapshot. The running slot is
    /// released either way. Returns whether the snapshot entry was removed.
    pub fn invalidate(&self, assignment: &Assignment) -> bool {
        let mut state = self.lock();
        state.release(&assignment.task_type);
        if assignment.generation != state.generation {
            return false;
        }
        state.snapshot.remove(&assignment.task_type).is_some()
    }

    pub fn registered_types(&self) -> Vec<TaskType> {
        self.lock().order.clone()
    }

    pub fn is_registered(&self, task_type: &TaskType) -> bool {
        self.lock().handlers.contains_key(task_type)
    }

    pub fn generation(&self) -> Generation {
        self.lock().generation
    }

    pub fn stats(&self) -> DispatchStats {
        let state = self.lock();
        DispatchStats {
            generation: state.generation.as_u64(),
            registered: state.order.len(),
            pending: state
                .snapshot
                .iter()
                .map(|(t, c)| (t.clone(), *c))
                .collect(),
            running: state
                .running
                .iter()
                .filter(|(_, c)| **c > 0)
                .map(|(t, c)| (t.clone(), *c))
                .collect(),
        }
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}
