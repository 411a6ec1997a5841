//! Client error types.

use thiserror::Error;

use crate::multi_error::MultiError;
use crate::state::ResourceId;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Operation attempted on a closed or never-opened node.
    #[error("{resource} is closed")]
    NotOpen {
        /// The node the operation was attempted on.
        resource: ResourceId,
    },

    /// The native layer refused to allocate (or recognise) a handle.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// A native call made while opening a resource reported failure.
    #[error("{operation} failed: {message}")]
    NativeCallFailed {
        /// The native operation that failed.
        operation: &'static str,
        /// Message reported by the native layer.
        message: String,
    },

    /// Error text fetched verbatim from the native error context.
    #[error("{0}")]
    Native(String),

    /// Malformed connect string.
    #[error("invalid connect string: {0}")]
    InvalidConnectString(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Object pool configuration error.
    #[error(transparent)]
    Pool(#[from] ora_driver_pool::PoolError),

    /// A panic intercepted while closing resources.
    #[error("internal fault: {0}")]
    InternalFault(String),

    /// Several failures collected during one cascading close.
    #[error(transparent)]
    Multi(#[from] MultiError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`Error::NotOpen`].
    NotOpen,
    /// See [`Error::AllocationFailed`].
    AllocationFailed,
    /// See [`Error::NativeCallFailed`].
    NativeCallFailed,
    /// See [`Error::Native`].
    NativeError,
    /// See [`Error::InvalidConnectString`].
    InvalidConnectionString,
    /// See [`Error::Config`] and [`Error::Pool`].
    InvalidConfig,
    /// See [`Error::InternalFault`].
    InternalFault,
    /// See [`Error::Multi`].
    MultiError,
}

impl Error {
    pub(crate) fn not_open(resource: ResourceId) -> Self {
        Self::NotOpen { resource }
    }

    /// Get the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotOpen { .. } => ErrorKind::NotOpen,
            Self::AllocationFailed(_) => ErrorKind::AllocationFailed,
            Self::NativeCallFailed { .. } => ErrorKind::NativeCallFailed,
            Self::Native(_) => ErrorKind::NativeError,
            Self::InvalidConnectString(_) => ErrorKind::InvalidConnectionString,
            Self::Config(_) | Self::Pool(_) => ErrorKind::InvalidConfig,
            Self::InternalFault(_) => ErrorKind::InternalFault,
            Self::Multi(_) => ErrorKind::MultiError,
        }
    }

    /// Check if this error came from the native layer.
    #[must_use]
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailed(_) | Self::NativeCallFailed { .. } | Self::Native(_)
        )
    }

    /// Get the resource this error reports as closed, if any.
    #[must_use]
    pub fn not_open_resource(&self) -> Option<ResourceId> {
        match self {
            Self::NotOpen { resource } => Some(*resource),
            _ => None,
        }
    }

    /// Get the aggregate if this is a [`Error::Multi`].
    #[must_use]
    pub fn as_multi(&self) -> Option<&MultiError> {
        match self {
            Self::Multi(multi) => Some(multi),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
