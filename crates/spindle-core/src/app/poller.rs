//! QueueSizePoller - orchestrator の pending 件数を DispatchTable に流し込む producer
//!
//! # フロー
//! 1. poll_interval だけ待つ
//! 2. 登録済み task_type の pending 件数を問い合わせる
//! 3. 成功: refresh(counts)、連続失敗カウンタを 0 に戻す
//! 4. 失敗: refresh({}) でワーカーを待機させ、カウンタを進める
//!    上限を超えたら EngineError::QueueUnreachable で止まる

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::dispatch::DispatchTable;
use crate::error::EngineError;
use crate::ports::Orchestrator;

pub struct QueueSizePoller {
    orchestrator: Arc<dyn Orchestrator>,
    table: Arc<DispatchTable>,
    poll_interval: Duration,
    max_failures: u32,
    consecutive_failures: u32,
}

impl QueueSizePoller {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        table: Arc<DispatchTable>,
        poll_interval: Duration,
        max_failures: u32,
    ) -> Self {
        Self {
            orchestrator,
            table,
            poll_interval,
            max_failures,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Poll until shutdown is requested or the queue has been unreachable
    /// for too long.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), EngineError> {
        loop {
            if *shutdown_rx.borrow() {
                return Ok(());
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender が drop された場合も停止扱い
                    if changed.is_err() {
                        return Ok(());
                    }
                    continue;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            self.poll_once().await?;
        }
    }

    /// One poll cycle: fetch counts and refresh the table.
    pub async fn poll_once(&mut self) -> Result<(), EngineError> {
        let task_types = self.table.registered_types();
        match self.orchestrator.get_pending_counts(&task_types).await {
            Ok(counts) => {
                let generation = self.table.refresh(counts);
                self.consecutive_failures = 0;
                debug!(%generation, "queue sizes refreshed");
                Ok(())
            }
            Err(e) => {
                // 古い件数のまま claim を空振りし続けないよう、空にしておく
                self.table.refresh(HashMap::new());
                self.consecutive_failures += 1;
                warn!(
                    error = %e,
                    failures = self.consecutive_failures,
                    "failed to fetch queue sizes"
                );
                if self.consecutive_failures > self.max_failures {
                    error!(
                        failures = self.consecutive_failures,
                        "queue unreachable, giving up"
                    );
                    return Err(EngineError::QueueUnreachable {
                        failures: self.consecutive_failures,
                    });
                }
                Ok(())
            }
        }
    }
}
