//! Native handle capability.
//!
//! The client never talks to the database itself. Every resource it manages
//! is backed by opaque handles owned by a native client library, reached
//! through the [`NativeApi`] trait. The trait mirrors the handful of calls
//! the lifecycle layer needs: allocate and free handles, attach to and
//! detach from a server, set attributes, begin and end sessions, and read
//! the last error message.
//!
//! Status mapping used throughout the crate:
//!
//! | native status            | error                                    |
//! |--------------------------|------------------------------------------|
//! | `InvalidHandle`          | [`Error::AllocationFailed`]              |
//! | `Error` on an open path  | [`Error::NativeCallFailed`]              |
//! | `Error` on a close path  | [`Error::Native`] (last error message)   |

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Opaque native handle.
///
/// The value is whatever the native layer hands out; the client only copies
/// it around and passes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// Wrap a raw handle value.
    #[must_use]
    pub fn new(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    /// Wrap a raw handle value, rejecting the null handle.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Get the raw handle value.
    #[must_use]
    pub fn as_raw(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Kind of native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Root environment handle.
    Environment,
    /// Error context handle, child of the environment.
    Error,
    /// Server attachment handle.
    Server,
    /// Service context binding a server and a session.
    ServiceContext,
    /// User session handle.
    Session,
}

impl HandleKind {
    /// Get the kind name used in messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Error => "error",
            Self::Server => "server",
            Self::ServiceContext => "service context",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Return status of a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Status {
    /// The call succeeded.
    Success,
    /// The handle passed in was not valid.
    InvalidHandle,
    /// The call failed; details are on the error context.
    Error,
}

impl Status {
    /// Check if the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Handle attribute set through [`NativeApi::set_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Server handle on a service context.
    Server,
    /// Session handle on a service context.
    Session,
    /// Username on a session handle.
    Username,
    /// Password on a session handle.
    Password,
}

/// Value passed to [`NativeApi::set_attribute`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AttrValue<'a> {
    /// Another handle.
    Handle(Handle),
    /// Text value.
    Text(&'a str),
}

impl fmt::Debug for AttrValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(handle) => f.debug_tuple("Handle").field(handle).finish(),
            // Text attributes carry credentials.
            Self::Text(_) => f.debug_tuple("Text").field(&"[REDACTED]").finish(),
        }
    }
}

/// How a session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Username and password checked by the database.
    Database,
    /// Externally authenticated (OS or wallet); no username or password.
    External,
}

/// Operations the client delegates to the native client library.
///
/// Implementations must be callable from any thread. Handles are opaque to
/// the client; `error` parameters are the environment's error context,
/// which [`last_error_message`](NativeApi::last_error_message) reads back.
pub trait NativeApi: Send + Sync {
    /// Allocate a handle of `kind` under `parent` (`None` for an
    /// environment). Returns `None` when the native layer refuses.
    fn allocate(&self, parent: Option<Handle>, kind: HandleKind) -> Option<Handle>;

    /// Free a handle. Freeing an environment also frees its error context.
    fn free(&self, handle: Handle, kind: HandleKind) -> Status;

    /// Attach a server handle to the database named by `target`.
    fn attach(&self, server: Handle, target: &str, error: Handle) -> Status;

    /// Detach a server handle from its database.
    fn detach(&self, server: Handle, error: Handle) -> Status;

    /// Set an attribute on a handle.
    fn set_attribute(
        &self,
        target: Handle,
        target_kind: HandleKind,
        value: AttrValue<'_>,
        attribute: Attribute,
        error: Handle,
    ) -> Status;

    /// Begin a user session on a service context.
    fn begin_session(
        &self,
        service_context: Handle,
        session: Handle,
        credentials: CredentialKind,
        error: Handle,
    ) -> Status;

    /// End a user session.
    fn end_session(&self, service_context: Handle, session: Handle, error: Handle) -> Status;

    /// Get the most recent error message recorded on an error context.
    fn last_error_message(&self, error: Handle) -> String;
}

/// An environment's view of the native layer: the capability plus the
/// environment and error-context handles every call is made against.
#[derive(Clone)]
pub(crate) struct NativeContext {
    api: Arc<dyn NativeApi>,
    env: Handle,
    error: Handle,
}

impl NativeContext {
    pub(crate) fn new(api: Arc<dyn NativeApi>, env: Handle, error: Handle) -> Self {
        Self { api, env, error }
    }

    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.api.as_ref()
    }

    pub(crate) fn env_handle(&self) -> Handle {
        self.env
    }

    pub(crate) fn error_handle(&self) -> Handle {
        self.error
    }

    /// Allocate a child handle of the environment.
    pub(crate) fn allocate(&self, kind: HandleKind) -> Result<Handle> {
        let handle = self.api.allocate(Some(self.env), kind);
        tracing::trace!(kind = %kind, ok = handle.is_some(), "allocate native handle");
        handle.ok_or_else(|| Error::AllocationFailed(format!("unable to allocate {kind} handle")))
    }

    /// Free a handle, mapping a failure through the error context.
    pub(crate) fn free(&self, handle: Handle, kind: HandleKind) -> Result<()> {
        tracing::trace!(kind = %kind, handle = %handle, "free native handle");
        match self.api.free(handle, kind) {
            Status::Success => Ok(()),
            Status::InvalidHandle => Err(Error::AllocationFailed(format!(
                "unable to free {kind} handle"
            ))),
            Status::Error => Err(self.native_error()),
        }
    }

    /// Check the status of a call made while opening a resource.
    pub(crate) fn check_open(&self, operation: &'static str, status: Status) -> Result<()> {
        tracing::trace!(operation, ?status, "native call");
        match status {
            Status::Success => Ok(()),
            Status::InvalidHandle => Err(Error::AllocationFailed(format!(
                "{operation}: invalid handle"
            ))),
            Status::Error => Err(Error::NativeCallFailed {
                operation,
                message: self.last_error_message(),
            }),
        }
    }

    /// Check the status of a call made while closing a resource.
    pub(crate) fn check_close(&self, operation: &'static str, status: Status) -> Result<()> {
        tracing::trace!(operation, ?status, "native call");
        match status {
            Status::Success => Ok(()),
            Status::InvalidHandle => Err(Error::AllocationFailed(format!(
                "{operation}: invalid handle"
            ))),
            Status::Error => Err(self.native_error()),
        }
    }

    /// Wrap the last native error message as [`Error::Native`].
    pub(crate) fn native_error(&self) -> Error {
        Error::Native(self.last_error_message())
    }

    fn last_error_message(&self) -> String {
        self.api.last_error_message(self.error)
    }
}

impl fmt::Debug for NativeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeContext")
            .field("env", &self.env)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
