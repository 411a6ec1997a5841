//! # ora-driver-pool
//!
//! Thread-safe object pool for recycling resource bodies in the Oracle client.
//!
//! Environments, servers, sessions and connections are short-lived bookkeeping
//! structs that carry a few native handles and a couple of child registries.
//! Rather than allocating those registries again for every open, a retired
//! body is reset by its owner and handed back to an [`ObjectPool`], which
//! hands it out again on the next open.
//!
//! ## Features
//!
//! - LIFO reuse of retired instances, so a hot body stays warm in cache
//! - Rejection of instances that were not reset before being returned
//! - Configurable cap on retained idle instances
//! - Lifetime counters for created, reused, returned and discarded instances
//!
//! The pool never resets anything itself. Callers implement [`Recycle`] and
//! are responsible for clearing native handles and parent references before
//! calling [`ObjectPool::put`].
//!
//! ## Example
//!
//! ```rust
//! use ora_driver_pool::{ObjectPool, PoolConfig, Recycle};
//!
//! #[derive(Default)]
//! struct Body {
//!     id: u64,
//!     live: bool,
//! }
//!
//! impl Recycle for Body {
//!     fn is_reset(&self) -> bool {
//!         !self.live
//!     }
//! }
//!
//! let pool = ObjectPool::<Body>::new("body", PoolConfig::default());
//! let mut body = pool.get();
//! body.id = 7;
//! pool.put(body);
//!
//! // The same instance comes back, identity intact.
//! assert_eq!(pool.get().id, 7);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use lifecycle::{Origin, Recycle};
pub use pool::{ObjectPool, PoolStatus};
