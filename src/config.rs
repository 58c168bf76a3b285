use std::time::Duration;

use crate::estimator::DurationEstimator;

/// Configuration for a [`GenerationTracker`](crate::GenerationTracker).
///
/// Use [`TrackerConfig::builder()`] for ergonomic construction, or
/// [`TrackerConfig::default()`] for the stock settings (1s poll interval).
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Fixed interval between status polls.
    pub poll_interval: Duration,

    /// Estimator used to answer "how long will this take".
    pub estimator: DurationEstimator,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            estimator: DurationEstimator::default(),
        }
    }
}

impl TrackerConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }
}

/// Builder for [`TrackerConfig`].
#[derive(Debug, Default)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// Set the interval between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the duration estimator (calibrates the baseline).
    pub fn with_estimator(mut self, estimator: DurationEstimator) -> Self {
        self.config.estimator = estimator;
        self
    }

    /// Build the final [`TrackerConfig`].
    pub fn build(self) -> TrackerConfig {
        self.config
    }
}
