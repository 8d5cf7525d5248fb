//! Handler<T> - 型付き Handler と、それを TaskHandler に変換するアダプタ
//!
//! # 二層構造
//! - **表層**: `Handler<T>` は decode 済みの `T` を受け取る
//! - **内部**: `TypedHandler<T, H>` が input を decode して `TaskHandler` として振る舞う

use std::marker::PhantomData;

use async_trait::async_trait;

use super::codec::PayloadCodec;
use super::task::Task;
use crate::domain::{TaskResult, TaskUnit};
use crate::error::HandlerError;
use crate::handler::TaskHandler;

/// Handler は decode 済みの Task を実行して TaskResult を返す
///
/// ```ignore
/// #[derive(Clone)]
/// struct ResizeHandler;
///
/// #[async_trait]
/// impl Handler<ResizeImage> for ResizeHandler {
///     async fn handle(&mut self, task: ResizeImage) -> Result<TaskResult, HandlerError> {
///         Ok(TaskResult::success())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: Task>: Send {
    async fn handle(&mut self, task: T) -> Result<TaskResult, HandlerError>;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

// derive(Clone) だと T: Clone を要求してしまうので手書き
impl<T: Task, H: Handler<T> + Clone> Clone for TypedHandler<T, H> {
    fn clone(&self) -> Self {
        Self::new(self.handler.clone())
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> TaskHandler for TypedHandler<T, H> {
    async fn execute(&mut self, task: &TaskUnit) -> Result<TaskResult, HandlerError> {
        let input: T =
            PayloadCodec::decode(&task.input).map_err(|e| HandlerError::new(e.to_string()))?;
        self.handler.handle(input).await
    }
}
