//! Engine configuration.

use std::time::Duration;

use crate::error::BuildError;

/// Default number of consecutive failed queue-size polls before the engine
/// gives up.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delay between queue-size polls, and a worker's back-off when there is
    /// nothing to dispatch.
    pub poll_interval: Duration,

    /// Number of worker loops.
    pub worker_count: usize,

    /// Consecutive poll failures tolerated before the engine stops.
    pub max_poll_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            worker_count: 1,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

impl EngineConfig {
    pub fn new(poll_interval: Duration, worker_count: usize) -> Self {
        Self {
            poll_interval,
            worker_count,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_max_poll_failures(mut self, max_poll_failures: u32) -> Self {
        self.max_poll_failures = max_poll_failures;
        self
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.worker_count == 0 {
            return Err(BuildError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(BuildError::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_poll_failures, 10);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = EngineConfig::default().with_worker_count(0);
        assert!(matches!(config.validate(), Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = EngineConfig::new(Duration::ZERO, 4);
        assert!(matches!(config.validate(), Err(BuildError::InvalidConfig(_))));
    }
}
