//! App - アプリケーション層
//!
//! ports と DispatchTable を組み合わせてエンジンを動かす。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: エンジンの構築とワイヤリング
//! - **Engine / EngineHandle**: poller と worker 群の起動・停止
//! - **QueueSizePoller**: キューサイズの定期取得と DispatchTable の更新
//! - **WorkerLoop**: next → claim → execute → report のループ
//! - **TaskExecutor**: 1 タスクの隔離実行と報告

pub mod builder;
pub mod config;
pub mod engine;
pub mod executor;
pub mod poller;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::EngineBuilder;
pub use self::config::{DEFAULT_MAX_POLL_FAILURES, EngineConfig};
pub use self::engine::{Engine, EngineHandle};
pub use self::executor::TaskExecutor;
pub use self::poller::QueueSizePoller;
pub use self::worker_loop::{StepOutcome, WorkerLoop};
