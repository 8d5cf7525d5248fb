//! Ports - 抽象化レイヤー
//!
//! 外部システム（orchestrator, 時計, ID 生成）へのインターフェース。
//! 実装は `impls` またはエンジンを組み込むアプリケーション側に置く。

pub mod clock;
pub mod id_generator;
pub mod orchestrator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::orchestrator::{ClaimOutcome, Orchestrator};
