//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryOrchestrator**: プロセス内で完結する orchestrator
//!
//! 本番用の orchestrator クライアント（HTTP/gRPC）は別クレートに置く想定。

pub mod inmem_orchestrator;

pub use self::inmem_orchestrator::InMemoryOrchestrator;
