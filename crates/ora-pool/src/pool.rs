//! Object pool implementation.

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::{Origin, Recycle};

/// A cache of retired instances of one resource kind.
///
/// [`get`](ObjectPool::get) and [`put`](ObjectPool::put) may be called
/// concurrently from any number of threads. An instance handed out by `get`
/// is owned by the caller until it is given back with `put`, so it can never
/// be handed out twice at the same time.
pub struct ObjectPool<T> {
    name: &'static str,
    config: PoolConfig,
    inner: Mutex<PoolInner<T>>,
}

struct PoolInner<T> {
    idle: Vec<T>,
    created: u64,
    reused: u64,
    returned: u64,
    discarded: u64,
}

impl<T: Recycle> ObjectPool<T> {
    /// Create a pool without validating the configuration.
    #[must_use]
    pub fn new(name: &'static str, config: PoolConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(PoolInner {
                idle: Vec::new(),
                created: 0,
                reused: 0,
                returned: 0,
                discarded: 0,
            }),
        }
    }

    /// Create a pool after validating the configuration.
    pub fn with_config(name: &'static str, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self::new(name, config))
    }

    /// Get an instance from the pool.
    ///
    /// Returns the most recently retired instance if there is one, otherwise
    /// a new `T::default()`.
    pub fn get(&self) -> T {
        self.lease().0
    }

    /// Get an instance together with where it came from.
    pub fn lease(&self) -> (T, Origin) {
        let mut inner = self.inner.lock();
        match inner.idle.pop() {
            Some(item) => {
                inner.reused += 1;
                tracing::trace!(
                    pool = self.name,
                    idle = inner.idle.len(),
                    "reusing pooled instance"
                );
                (item, Origin::Recycled)
            }
            None => {
                inner.created += 1;
                drop(inner);
                tracing::trace!(pool = self.name, "pool empty, constructing instance");
                (T::default(), Origin::Fresh)
            }
        }
    }

    /// Return a retired instance to the pool.
    ///
    /// The instance must already be reset. Instances that are not, or that
    /// arrive while the pool is at its idle cap, are dropped. Returns whether
    /// the instance was retained.
    pub fn put(&self, item: T) -> bool {
        if !item.is_reset() {
            tracing::warn!(pool = self.name, "discarding instance returned without reset");
            self.inner.lock().discarded += 1;
            return false;
        }

        let mut inner = self.inner.lock();
        if inner.idle.len() >= self.config.max_idle {
            inner.discarded += 1;
            tracing::debug!(
                pool = self.name,
                max_idle = self.config.max_idle,
                "pool full, dropping instance"
            );
            return false;
        }
        inner.returned += 1;
        inner.idle.push(item);
        true
    }

    /// Drop every idle instance, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let drained: Vec<T> = std::mem::take(&mut self.inner.lock().idle);
        let count = drained.len();
        tracing::debug!(pool = self.name, count, "cleared object pool");
        count
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let inner = self.inner.lock();
        PoolStatus {
            idle: inner.idle.len(),
            created: inner.created,
            reused: inner.reused,
            returned: inner.returned,
            discarded: inner.discarded,
        }
    }

    /// Get the pool name used in log output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("name", &self.name)
            .field("idle", &self.inner.lock().idle.len())
            .field("max_idle", &self.config.max_idle)
            .finish()
    }
}

/// Status information about a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle instances available for reuse.
    pub idle: usize,
    /// Instances constructed because the pool was empty.
    pub created: u64,
    /// Leases served from an idle instance.
    pub reused: u64,
    /// Instances accepted back into the pool.
    pub returned: u64,
    /// Instances dropped on return (not reset, or pool full).
    pub discarded: u64,
}
