//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - expect_tasks() で期待される task_type を宣言
//! - build() 時に「期待集合 ⊆ 登録済み集合」と config をチェック
//! - 不足があれば BuildError を返す（orchestrator には何も送らない）

use std::sync::Arc;

use super::config::EngineConfig;
use super::engine::Engine;
use crate::domain::{TaskDefinition, TaskType};
use crate::error::BuildError;
use crate::handler::HandlerBlueprint;
use crate::ports::{IdGenerator, Orchestrator};
use crate::typed::{Handler, Task, TypedHandler};

/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new(config)
///     .register(TaskType::new("resize"), ResizeHandler::default())
///     .register_typed::<Encode, _>(EncodeHandler)
///     .expect_tasks(&["resize", "media.encode.v1"])
///     .build(orchestrator)
///     .await?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    registrations: Vec<(TaskDefinition, Arc<dyn HandlerBlueprint>)>,
    expected_tasks: Option<Vec<TaskType>>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registrations: Vec::new(),
            expected_tasks: None,
            id_generator: None,
        }
    }

    pub fn register<B: HandlerBlueprint + 'static>(self, task_type: TaskType, blueprint: B) -> Self {
        self.register_with_definition(TaskDefinition::new(task_type), blueprint)
    }

    pub fn register_with_definition<B: HandlerBlueprint + 'static>(
        mut self,
        definition: TaskDefinition,
        blueprint: B,
    ) -> Self {
        let blueprint: Arc<dyn HandlerBlueprint> = Arc::new(blueprint);
        self.registrations.push((definition, blueprint));
        self
    }

    /// Register a typed handler under `T::TYPE`.
    pub fn register_typed<T, H>(self, handler: H) -> Self
    where
        T: Task,
        H: Handler<T> + Clone + Sync + 'static,
    {
        self.register(T::task_type(), TypedHandler::<T, H>::new(handler))
    }

    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|t| TaskType::new(*t)).collect());
        self
    }

    pub fn id_generator(mut self, id_generator: Box<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.config.validate()?;
        if let Some(expected_tasks) = &self.expected_tasks {
            let missing: Vec<TaskType> = expected_tasks
                .iter()
                .filter(|t| !self.registrations.iter().any(|(d, _)| &d.name == *t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }
        Ok(())
    }

    /// Validate, then register every handler with the orchestrator and the
    /// dispatch table in registration order.
    pub async fn build(self, orchestrator: Arc<dyn Orchestrator>) -> Result<Engine, BuildError> {
        self.validate()?;

        let mut engine = Engine::new(self.config, orchestrator);
        if let Some(id_generator) = self.id_generator {
            engine = engine.with_id_generator(id_generator);
        }
        for (definition, blueprint) in self.registrations {
            engine.register_with_definition(definition, blueprint).await;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskResult, TaskUnit};
    use crate::error::HandlerError;
    use crate::handler::TaskHandler;
    use crate::impls::InMemoryOrchestrator;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Clone)]
    struct NoopHandler;

    #[async_trait]
    impl TaskHandler for NoopHandler {
        async fn execute(&mut self, _task: &TaskUnit) -> Result<TaskResult, HandlerError> {
            Ok(TaskResult::success())
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Ping {}

    impl Task for Ping {
        const TYPE: &'static str = "test.ping.v1";
    }

    #[derive(Clone)]
    struct PingHandler;

    #[async_trait]
    impl Handler<Ping> for PingHandler {
        async fn handle(&mut self, _task: Ping) -> Result<TaskResult, HandlerError> {
            Ok(TaskResult::success())
        }
    }

    #[tokio::test]
    async fn build_registers_definitions_and_table_entries() {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let engine = EngineBuilder::new(EngineConfig::default())
            .register(TaskType::new("a"), NoopHandler)
            .register_typed::<Ping, _>(PingHandler)
            .expect_tasks(&["a", Ping::TYPE])
            .build(orchestrator.clone())
            .await
            .unwrap();

        assert_eq!(
            engine.table().registered_types(),
            vec![TaskType::new("a"), Ping::task_type()]
        );
        assert_eq!(orchestrator.definitions().len(), 2);
    }

    #[tokio::test]
    async fn build_fails_on_missing_task_types() {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let result = EngineBuilder::new(EngineConfig::default())
            .register(TaskType::new("a"), NoopHandler)
            .expect_tasks(&["a", "b"])
            .build(orchestrator.clone())
            .await;

        assert!(matches!(
            result,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec![TaskType::new("b")]
        ));
        assert!(orchestrator.definitions().is_empty());
    }

    #[tokio::test]
    async fn build_fails_on_invalid_config() {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let result = EngineBuilder::new(EngineConfig::new(Duration::from_millis(10), 0))
            .build(orchestrator)
            .await;

        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn definition_failure_does_not_block_registration() {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        orchestrator.fail_next_registrations(1);

        let engine = EngineBuilder::new(EngineConfig::default())
            .register(TaskType::new("a"), NoopHandler)
            .build(orchestrator.clone())
            .await
            .unwrap();

        assert!(engine.table().is_registered(&TaskType::new("a")));
        assert!(orchestrator.definitions().is_empty());
    }
}
