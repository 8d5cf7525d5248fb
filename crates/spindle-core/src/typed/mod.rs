//! Typed - 型付き Task API
//!
//! task_type の typo を型で排除し、入力の decode をエンジン側で済ませる。

pub mod codec;
pub mod handler;
pub mod task;

pub use self::codec::{CodecError, PayloadCodec};
pub use self::handler::{Handler, TypedHandler};
pub use self::task::Task;
