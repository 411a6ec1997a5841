//! Instance lifecycle contract.
//!
//! This module defines what the pool expects from the instances it caches
//! and how it reports where a leased instance came from.

/// Trait for instances that can be parked in an [`ObjectPool`](crate::ObjectPool).
///
/// `Default` builds the zero-value instance handed out when the pool is
/// empty. [`is_reset`](Recycle::is_reset) lets the pool refuse instances that
/// still hold live state: a cached instance must hold no live native handle
/// and no parent reference.
pub trait Recycle: Default + Send {
    /// Check if the instance has been returned to its pool-ready state.
    fn is_reset(&self) -> bool;
}

/// Where a leased instance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Constructed because the pool had no idle instance.
    Fresh,
    /// A previously retired instance.
    Recycled,
}

impl Origin {
    /// Check if the instance was recycled.
    #[must_use]
    pub fn is_recycled(&self) -> bool {
        matches!(self, Self::Recycled)
    }
}
