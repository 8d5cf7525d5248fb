//! Engine - poller と worker 群を束ねるトップレベル
//!
//! - `register()`: 定義を orchestrator に送ってから（失敗しても続行）DispatchTable に登録
//! - `start()`: poller 1 本 + worker N 本を spawn して `EngineHandle` を返す
//! - `EngineHandle::wait()`: poller が止まるまで待つ（致命的エラーはここで返る）

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::EngineConfig;
use super::poller::QueueSizePoller;
use super::worker_loop::WorkerLoop;
use crate::dispatch::{DispatchStats, DispatchTable};
use crate::domain::{TaskDefinition, TaskType, WorkerId};
use crate::error::EngineError;
use crate::handler::HandlerBlueprint;
use crate::ports::{IdGenerator, Orchestrator, SystemClock, UlidGenerator};

pub struct Engine {
    config: EngineConfig,
    orchestrator: Arc<dyn Orchestrator>,
    table: Arc<DispatchTable>,
    id_generator: Box<dyn IdGenerator>,
}

impl Engine {
    pub fn new(config: EngineConfig, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            table: Arc::new(DispatchTable::new()),
            id_generator: Box::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_id_generator(mut self, id_generator: Box<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    pub fn stats(&self) -> DispatchStats {
        self.table.stats()
    }

    /// Register a task type with default definition metadata.
    pub async fn register(&self, task_type: TaskType, blueprint: Arc<dyn HandlerBlueprint>) {
        self.register_with_definition(TaskDefinition::new(task_type), blueprint)
            .await;
    }

    /// Advertise `definition` to the orchestrator, then expose the type for
    /// dispatch. A failed advertisement (e.g. the definition already exists)
    /// is logged and does not prevent processing.
    pub async fn register_with_definition(
        &self,
        definition: TaskDefinition,
        blueprint: Arc<dyn HandlerBlueprint>,
    ) {
        let task_type = definition.name.clone();
        match self.orchestrator.register_definition(&definition).await {
            Ok(()) => info!(task_type = %task_type, "task definition registered"),
            Err(e) => warn!(
                task_type = %task_type,
                error = %e,
                "failed to register task definition, continuing"
            ),
        }
        self.table.register(task_type, blueprint);
    }

    /// Spawn the poller and `worker_count` workers.
    pub fn start(&self) -> EngineHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poller = QueueSizePoller::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.table),
            self.config.poll_interval,
            self.config.max_poll_failures,
        );
        let poller = tokio::spawn(poller.run(shutdown_rx.clone()));

        let mut worker_ids = Vec::with_capacity(self.config.worker_count);
        let mut workers = Vec::with_capacity(self.config.worker_count);
        for _ in 0..self.config.worker_count {
            let worker_id = self.id_generator.generate_worker_id();
            let worker = WorkerLoop::new(
                worker_id,
                Arc::clone(&self.orchestrator),
                Arc::clone(&self.table),
                self.config.poll_interval,
            );
            workers.push(tokio::spawn(worker.run(shutdown_rx.clone())));
            worker_ids.push(worker_id);
        }

        info!(
            workers = self.config.worker_count,
            task_types = self.table.registered_types().len(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "engine started"
        );

        EngineHandle {
            shutdown_tx,
            poller,
            workers,
            worker_ids,
        }
    }

    /// Start and block until the engine stops.
    pub async fn run(&self) -> Result<(), EngineError> {
        self.start().wait().await
    }
}

/// Handle to a running engine.
///
/// `request_shutdown()` で全ループが新しい claim をやめる。
/// 実行中のタスクは報告まで終えてから止まる。
pub struct EngineHandle {
    shutdown_tx: watch::Sender<bool>,
    poller: JoinHandle<Result<(), EngineError>>,
    workers: Vec<JoinHandle<()>>,
    worker_ids: Vec<WorkerId>,
}

impl EngineHandle {
    pub fn worker_ids(&self) -> &[WorkerId] {
        &self.worker_ids
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the poller to stop.
    ///
    /// On a fatal poller error the workers are aborted (in-flight tasks are
    /// abandoned and left for the orchestrator to re-queue). On a requested
    /// shutdown the workers are joined.
    pub async fn wait(self) -> Result<(), EngineError> {
        let result = match self.poller.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::LoopPanicked(e.to_string())),
        };

        let _ = self.shutdown_tx.send(true);
        match &result {
            Ok(()) => {
                for worker in self.workers {
                    if let Err(e) = worker.await {
                        error!(error = %e, "worker loop panicked");
                    }
                }
                info!("engine stopped");
            }
            Err(e) => {
                error!(error = %e, "engine stopping");
                for worker in &self.workers {
                    worker.abort();
                }
            }
        }
        result
    }

    pub async fn shutdown_and_join(self) -> Result<(), EngineError> {
        self.request_shutdown();
        self.wait().await
    }
}
