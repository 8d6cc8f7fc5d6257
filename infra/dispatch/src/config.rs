use crate::error::{DispatchError, Result};
use crate::queue::EventQueue;
use std::borrow::Cow;

const DEFAULT_NAME: &str = "default";
const DEFAULT_CAPACITY: usize = 16;

/// Settings of an [`EventQueue`]; fixed once the queue is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    name: Cow<'static, str>,
    capacity: usize,
    warn_on_drop: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { name: Cow::Borrowed(DEFAULT_NAME), capacity: DEFAULT_CAPACITY, warn_on_drop: false }
    }
}

impl QueueConfig {
    /// Name attached to every log record of the queue.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of handler slots reserved up front.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether dropped channel deliveries are logged at `WARN` instead of `TRACE`.
    #[must_use]
    pub const fn warn_on_drop(&self) -> bool {
        self.warn_on_drop
    }
}

/// A builder for configuring an [`EventQueue`].
#[derive(Debug, Default)]
pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    /// Sets the queue name used in logs.
    #[must_use = "The builder must be configured before it can be used to build the queue."]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Reserves room for `capacity` handlers.
    #[must_use = "The builder must be configured before it can be used to build the queue."]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Logs dropped channel deliveries at `WARN`.
    #[must_use = "The builder must be configured before it can be used to build the queue."]
    pub const fn warn_on_drop(mut self, enabled: bool) -> Self {
        self.config.warn_on_drop = enabled;
        self
    }

    /// Consumes the builder and creates the queue.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidConfiguration`] if the name is blank.
    pub fn build(self) -> Result<EventQueue> {
        validate_config(&self.config)?;
        Ok(EventQueue::with_config(self.config))
    }
}

fn validate_config(config: &QueueConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(DispatchError::InvalidConfiguration {
            message: "Queue name cannot be empty".into(),
            context: None,
        });
    }

    Ok(())
}
