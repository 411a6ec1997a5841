//! Pool error types.

use thiserror::Error;

/// Errors that can occur when configuring a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}
