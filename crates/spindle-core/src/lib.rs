//! spindle-core
//!
//! Fair task dispatch and execution for a remote workflow-task queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, outcome, definition）
//! - **dispatch**: DispatchTable（pending 数と実行中数に基づく round-robin 配分）
//! - **ports**: 抽象化レイヤー（Orchestrator, Clock, IdGenerator）
//! - **handler**: TaskHandler と、タスクごとに新しい handler を作る HandlerBlueprint
//! - **typed**: 型付き Task API（Task trait, Handler trait, PayloadCodec）
//! - **app**: エンジン本体（builder, engine, poller, worker_loop, executor）
//! - **impls**: 実装（InMemoryOrchestrator など開発用）
//! - **error**: エラー型

pub mod app;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod handler;
pub mod impls;
pub mod ports;
pub mod typed;
