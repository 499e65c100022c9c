//! Construction-time settings for a [`BufferedSink`](crate::BufferedSink).

use crate::error::{Error, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of records the pending queue can hold.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5000;

/// Default buffer size (in bytes) that triggers an eager flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024;

/// Default period of the flush timer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// What `write` does when the pending queue is full.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Block the producer until the worker frees a slot.
    #[default]
    Block,

    /// Block for at most the given time, then reject the record.
    BlockTimeout(Duration),

    /// Reject the record immediately.
    Reject,
}

/// What the worker does with a batch the underlying writer refused.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushFailurePolicy {
    /// Drop the batch and carry on with an empty buffer.
    #[default]
    Discard,

    /// Keep the batch for the next flush attempt while the buffer stays within
    /// `max_bytes`. Anything past that bound is dropped.
    Retain {
        /// Upper bound on retained plus newly appended bytes.
        max_bytes: usize,
    },
}

/// Sink configuration. All values are fixed once the sink is built.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Capacity of the pending queue, in records.
    pub queue_capacity: usize,

    /// Buffer length at which the worker flushes without waiting for the timer.
    pub flush_threshold: usize,

    /// Period of the flush timer.
    pub flush_interval: Duration,

    /// Behaviour of `write` when the queue is full.
    pub overflow: OverflowPolicy,

    /// Behaviour of the worker when a flush fails.
    pub on_flush_failure: FlushFailurePolicy,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            overflow: OverflowPolicy::default(),
            on_flush_failure: FlushFailurePolicy::default(),
        }
    }
}

impl SinkConfig {
    /// Starts a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> SinkConfigBuilder {
        SinkConfigBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }

        if self.flush_threshold == 0 {
            return Err(Error::InvalidConfig(
                "flush_threshold must be greater than zero".to_string(),
            ));
        }

        if self.flush_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "flush_interval must be greater than zero".to_string(),
            ));
        }

        if let FlushFailurePolicy::Retain { max_bytes: 0 } = self.on_flush_failure {
            return Err(Error::InvalidConfig(
                "retain policy needs a non-zero max_bytes".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`SinkConfig`].
#[derive(Clone, Debug, Default)]
pub struct SinkConfigBuilder {
    config: SinkConfig,
}

impl SinkConfigBuilder {
    /// Sets the pending queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the eager flush threshold in bytes.
    #[must_use]
    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.config.flush_threshold = bytes;
        self
    }

    /// Sets the flush timer period.
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Sets the queue overflow policy.
    #[must_use]
    pub fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow = policy;
        self
    }

    /// Sets the flush failure policy.
    #[must_use]
    pub fn on_flush_failure(mut self, policy: FlushFailurePolicy) -> Self {
        self.config.on_flush_failure = policy;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> SinkConfig {
        self.config
    }
}
