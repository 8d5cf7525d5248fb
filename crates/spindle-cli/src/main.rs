//! Spindle demo: drains an in-memory orchestrator with the dispatch engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use spindle_core::app::{DEFAULT_MAX_POLL_FAILURES, EngineBuilder, EngineConfig};
use spindle_core::domain::{Payload, TaskId, TaskResult, TaskStatus, TaskType, TaskUnit};
use spindle_core::error::HandlerError;
use spindle_core::handler::TaskHandler;
use spindle_core::impls::InMemoryOrchestrator;
use spindle_core::typed::{Handler, Task};

#[derive(Parser)]
#[command(name = "spindle")]
#[command(about = "Run the dispatch engine against an in-memory queue", long_about = None)]
struct Args {
    /// Queue-size poll interval in milliseconds
    #[arg(long, default_value_t = 50)]
    poll_interval_ms: u64,

    /// Number of worker loops
    #[arg(short, long, default_value_t = 2)]
    workers: usize,

    /// Tasks seeded per task type
    #[arg(short, long, default_value_t = 5)]
    tasks: usize,

    /// Consecutive queue-size failures tolerated
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_FAILURES)]
    max_poll_failures: u32,

    /// Number of hello tasks that fail on purpose
    #[arg(long, default_value_t = 1)]
    failures: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    name: String,
}

impl Task for Hello {
    const TYPE: &'static str = "demo.hello.v1";
}

/// 失敗回数は全インスタンスで共有（handler 自体は task ごとに複製される）
#[derive(Clone)]
struct HelloHandler {
    remaining_failures: Arc<AtomicU32>,
}

#[async_trait]
impl Handler<Hello> for HelloHandler {
    async fn handle(&mut self, task: Hello) -> Result<TaskResult, HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::new(format!(
                "intentional failure (left={left})"
            )));
        }
        Ok(TaskResult::success()
            .with_output("greeting", json!(format!("Hello, {}!", task.name)))
            .with_log(format!("greeted {}", task.name)))
    }
}

/// Untyped handler that builds its result from raw JSON.
#[derive(Clone, Default)]
struct WordCountHandler {
    seen: usize,
}

#[async_trait]
impl TaskHandler for WordCountHandler {
    async fn execute(&mut self, task: &TaskUnit) -> Result<TaskResult, HandlerError> {
        let text = task
            .input
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerError::new("missing `text`"))?;
        self.seen += 1;
        let result = TaskResult::from_value(json!({
            "status": "SUCCESS",
            "output": { "words": text.split_whitespace().count() },
            "logs": [format!("instance invocation #{}", self.seen)],
        }))?;
        Ok(result)
    }
}

fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn seed(orchestrator: &InMemoryOrchestrator, tasks: usize) {
    for i in 0..tasks {
        orchestrator.enqueue(
            TaskUnit::new(
                TaskId::new(format!("hello-{i}")),
                Hello::task_type(),
                payload(json!({ "name": format!("spindle-{i}") })),
            )
            .with_workflow_instance(format!("wf-{i}")),
        );

        let words = TaskUnit::new(
            TaskId::new(format!("words-{i}")),
            TaskType::new("demo.word-count"),
            payload(json!({ "text": "the quick brown fox" })),
        );
        // 最初の 1 件は入力を外部ストレージに置く
        if i == 0 {
            let path = "blob://inputs/words-0.json";
            orchestrator.store_external_payload(
                path,
                br#"{"text": "jumps over the lazy dog twice"}"#.to_vec(),
            );
            orchestrator.enqueue(words.with_external_input(path));
        } else {
            orchestrator.enqueue(words);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let orchestrator = Arc::new(InMemoryOrchestrator::new());
    seed(&orchestrator, args.tasks);

    let config = EngineConfig::default()
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms))
        .with_worker_count(args.workers)
        .with_max_poll_failures(args.max_poll_failures);

    let engine = EngineBuilder::new(config)
        .register_typed::<Hello, _>(HelloHandler {
            remaining_failures: Arc::new(AtomicU32::new(args.failures)),
        })
        .register(TaskType::new("demo.word-count"), WordCountHandler::default())
        .expect_tasks(&[Hello::TYPE, "demo.word-count"])
        .build(orchestrator.clone())
        .await?;

    let handle = engine.start();
    info!(workers = ?handle.worker_ids(), "engine running");

    while !orchestrator.is_drained() {
        sleep(engine.config().poll_interval).await;
    }
    handle.shutdown_and_join().await?;

    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    for report in orchestrator.reports() {
        let detail = match report.status {
            TaskStatus::Failed => report.reason_for_incompletion.clone().unwrap_or_default(),
            _ => serde_json::to_string(&report.output)?,
        };
        println!(
            "{:<12} {:<18} {:?} {}",
            report.task_id, report.task_type, report.status, detail
        );
    }

    Ok(())
}
