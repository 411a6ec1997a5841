//! Pool configuration.

/// Default number of idle instances a pool retains.
pub const DEFAULT_MAX_IDLE: usize = 256;

/// Configuration for an object pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Maximum number of retired instances kept for reuse.
    ///
    /// Instances returned while the pool already holds this many are dropped.
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of idle instances.
    #[must_use]
    pub fn max_idle(mut self, count: usize) -> Self {
        self.max_idle = count;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crate::error::PoolError> {
        if self.max_idle == 0 {
            return Err(crate::error::PoolError::Configuration(
                "max_idle must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
