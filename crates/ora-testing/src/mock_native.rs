//! Mock native client library for unit testing.
//!
//! [`MockNative`] implements [`NativeApi`] in memory. It hands out handles,
//! tracks which are live, records every call, and can be told to fail or
//! panic on chosen calls, so lifecycle code can be tested without a native
//! client installed.
//!
//! ## Example
//!
//! ```rust
//! use ora_client::{Driver, HandleKind};
//! use ora_testing::mock_native::{MockNative, Outcome, Trigger};
//!
//! let native = MockNative::new();
//! native.fail_once(
//!     Trigger::EndSession,
//!     Outcome::error("ORA-03113: end-of-file on communication channel"),
//! );
//!
//! let driver = Driver::new(native.clone());
//! let mut env = driver.open_env().unwrap();
//! env.open_connection("scott/tiger@orcl").unwrap();
//!
//! let err = env.close().unwrap_err();
//! assert!(err.to_string().contains("ORA-03113"));
//! assert_eq!(native.live_count(), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use ora_client::{AttrValue, Attribute, CredentialKind, Handle, HandleKind, NativeApi, Status};
use parking_lot::Mutex;

/// Message reported by [`NativeApi::last_error_message`] before any failure.
pub const NO_ERROR: &str = "ORA-00000: normal, successful completion";

/// One recorded call into the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    /// Handle allocation; `handle` is `None` when refused.
    Allocate {
        /// Parent handle.
        parent: Option<Handle>,
        /// Requested kind.
        kind: HandleKind,
        /// Handle handed out.
        handle: Option<Handle>,
    },
    /// Handle release.
    Free {
        /// Handle freed.
        handle: Handle,
        /// Kind passed by the caller.
        kind: HandleKind,
    },
    /// Server attach.
    Attach {
        /// Server handle.
        server: Handle,
        /// Target name.
        target: String,
    },
    /// Server detach.
    Detach {
        /// Server handle.
        server: Handle,
    },
    /// Attribute set. Text values are not recorded.
    SetAttribute {
        /// Handle the attribute was set on.
        target: Handle,
        /// Attribute.
        attribute: Attribute,
    },
    /// Session begin.
    BeginSession {
        /// Session handle.
        session: Handle,
        /// Credential kind.
        credentials: CredentialKind,
    },
    /// Session end.
    EndSession {
        /// Session handle.
        session: Handle,
    },
}

/// Which call an injected failure applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Allocation of a handle of this kind.
    Allocate(HandleKind),
    /// Free of any handle of this kind.
    Free(HandleKind),
    /// Free of exactly this handle.
    FreeHandle(Handle),
    /// Any server attach.
    Attach,
    /// Attach to this target.
    AttachTarget(String),
    /// Any server detach.
    Detach,
    /// Setting this attribute.
    SetAttribute(Attribute),
    /// Any session begin.
    BeginSession,
    /// Any session end.
    EndSession,
}

impl Trigger {
    fn matches(&self, call: &NativeCall) -> bool {
        match (self, call) {
            (Self::Allocate(want), NativeCall::Allocate { kind, .. }) => want == kind,
            (Self::Free(want), NativeCall::Free { kind, .. }) => want == kind,
            (Self::FreeHandle(want), NativeCall::Free { handle, .. }) => want == handle,
            (Self::Attach, NativeCall::Attach { .. }) => true,
            (Self::AttachTarget(want), NativeCall::Attach { target, .. }) => want == target,
            (Self::Detach, NativeCall::Detach { .. }) => true,
            (Self::SetAttribute(want), NativeCall::SetAttribute { attribute, .. }) => {
                want == attribute
            }
            (Self::BeginSession, NativeCall::BeginSession { .. }) => true,
            (Self::EndSession, NativeCall::EndSession { .. }) => true,
            _ => false,
        }
    }
}

/// What happens when a [`Trigger`] fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Return [`Status::Error`] and record this as the last error message.
    /// Allocations are refused instead.
    Error(String),
    /// Return [`Status::InvalidHandle`]. Allocations are refused instead.
    InvalidHandle,
    /// Panic with this message, as a misbehaving native layer might.
    Panic(String),
}

impl Outcome {
    /// Shorthand for [`Outcome::Error`].
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Shorthand for [`Outcome::Panic`].
    pub fn panic(message: impl Into<String>) -> Self {
        Self::Panic(message.into())
    }
}

#[derive(Debug)]
struct Rule {
    trigger: Trigger,
    outcome: Outcome,
    remaining: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct LiveHandle {
    kind: HandleKind,
    parent: Option<Handle>,
}

#[derive(Debug)]
struct MockState {
    next: u64,
    live: HashMap<Handle, LiveHandle>,
    allocated: Vec<(Handle, HandleKind)>,
    freed: Vec<(Handle, HandleKind)>,
    attached: HashSet<Handle>,
    active_sessions: HashSet<Handle>,
    calls: Vec<NativeCall>,
    rules: Vec<Rule>,
    last_error: String,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next: 0x1000,
            live: HashMap::new(),
            allocated: Vec::new(),
            freed: Vec::new(),
            attached: HashSet::new(),
            active_sessions: HashSet::new(),
            calls: Vec::new(),
            rules: Vec::new(),
            last_error: NO_ERROR.to_owned(),
        }
    }
}

impl MockState {
    /// Record `call` and return the injected outcome for it, if any.
    fn record(&mut self, call: NativeCall) -> Option<Outcome> {
        let outcome = self
            .rules
            .iter_mut()
            .find(|rule| rule.remaining != Some(0) && rule.trigger.matches(&call))
            .map(|rule| {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                rule.outcome.clone()
            });
        self.calls.push(call);
        outcome
    }

    fn is_live(&self, handle: Handle, kind: HandleKind) -> bool {
        self.live.get(&handle).is_some_and(|live| live.kind == kind)
    }

    fn fail(&mut self, outcome: Outcome) -> Status {
        match outcome {
            Outcome::Error(message) => {
                self.last_error = message;
                Status::Error
            }
            Outcome::InvalidHandle => Status::InvalidHandle,
            Outcome::Panic(_) => Status::Error,
        }
    }

    fn error(&mut self, message: &str) -> Status {
        self.last_error = message.to_owned();
        Status::Error
    }
}

/// In-memory [`NativeApi`] implementation.
///
/// Clones share state, so a test can hand one clone to a
/// [`Driver`](ora_client::Driver) and inspect another.
#[derive(Clone, Default)]
pub struct MockNative {
    state: Arc<Mutex<MockState>>,
}

impl MockNative {
    /// Create a mock with no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call matching `trigger` produce `outcome`.
    pub fn fail_once(&self, trigger: Trigger, outcome: Outcome) {
        self.fail_times(trigger, outcome, 1);
    }

    /// Make the next `times` calls matching `trigger` produce `outcome`.
    pub fn fail_times(&self, trigger: Trigger, outcome: Outcome, times: usize) {
        self.state.lock().rules.push(Rule {
            trigger,
            outcome,
            remaining: Some(times),
        });
    }

    /// Make every call matching `trigger` produce `outcome`.
    pub fn fail_always(&self, trigger: Trigger, outcome: Outcome) {
        self.state.lock().rules.push(Rule {
            trigger,
            outcome,
            remaining: None,
        });
    }

    /// Drop every injected failure.
    pub fn clear_failures(&self) {
        self.state.lock().rules.clear();
    }

    /// Get every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.lock().calls.clone()
    }

    /// Count recorded calls matching `trigger`.
    #[must_use]
    pub fn call_count(&self, trigger: &Trigger) -> usize {
        let state = self.state.lock();
        state.calls.iter().filter(|call| trigger.matches(call)).count()
    }

    /// Number of handles currently live.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Number of live handles of one kind.
    #[must_use]
    pub fn live_count_of(&self, kind: HandleKind) -> usize {
        let state = self.state.lock();
        state.live.values().filter(|live| live.kind == kind).count()
    }

    /// Check if a handle is live.
    #[must_use]
    pub fn is_live(&self, handle: Handle) -> bool {
        self.state.lock().live.contains_key(&handle)
    }

    /// Check if a handle was released by an explicit free.
    #[must_use]
    pub fn was_freed(&self, handle: Handle) -> bool {
        self.state.lock().freed.iter().any(|(freed, _)| *freed == handle)
    }

    /// Every handle of `kind` handed out so far, in allocation order.
    #[must_use]
    pub fn handles_of(&self, kind: HandleKind) -> Vec<Handle> {
        let state = self.state.lock();
        state
            .allocated
            .iter()
            .filter(|(_, allocated)| *allocated == kind)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Kinds of explicitly freed handles, in free order.
    #[must_use]
    pub fn free_order(&self) -> Vec<HandleKind> {
        self.state.lock().freed.iter().map(|(_, kind)| *kind).collect()
    }

    /// Number of explicit frees of handles of `kind`.
    #[must_use]
    pub fn free_count(&self, kind: HandleKind) -> usize {
        let state = self.state.lock();
        state.freed.iter().filter(|(_, freed)| *freed == kind).count()
    }

    /// Number of servers currently attached.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.state.lock().attached.len()
    }

    /// Number of sessions currently begun.
    #[must_use]
    pub fn active_session_count(&self) -> usize {
        self.state.lock().active_sessions.len()
    }

    /// Run a status call: record it, apply any injected outcome, otherwise
    /// defer to `succeed`. A panic outcome is raised after the lock is
    /// released.
    fn status_call(
        &self,
        call: NativeCall,
        succeed: impl FnOnce(&mut MockState) -> Status,
    ) -> Status {
        let mut state = self.state.lock();
        let outcome = state.record(call);
        match outcome {
            Some(Outcome::Panic(message)) => {
                drop(state);
                raise(&message)
            }
            Some(outcome) => state.fail(outcome),
            None => succeed(&mut state),
        }
    }
}

#[allow(clippy::panic)]
fn raise(message: &str) -> ! {
    panic!("{message}")
}

impl NativeApi for MockNative {
    fn allocate(&self, parent: Option<Handle>, kind: HandleKind) -> Option<Handle> {
        let mut state = self.state.lock();
        let outcome = state.record(NativeCall::Allocate {
            parent,
            kind,
            handle: None,
        });
        match outcome {
            Some(Outcome::Panic(message)) => {
                drop(state);
                raise(&message)
            }
            Some(_) => return None,
            None => {}
        }
        if parent.is_some_and(|parent| !state.live.contains_key(&parent)) {
            return None;
        }

        state.next += 0x10;
        let handle = Handle::from_raw(state.next)?;
        state.live.insert(handle, LiveHandle { kind, parent });
        state.allocated.push((handle, kind));
        if let Some(NativeCall::Allocate { handle: recorded, .. }) = state.calls.last_mut() {
            *recorded = Some(handle);
        }
        Some(handle)
    }

    fn free(&self, handle: Handle, kind: HandleKind) -> Status {
        self.status_call(NativeCall::Free { handle, kind }, |state| {
            if !state.is_live(handle, kind) {
                return Status::InvalidHandle;
            }
            state.live.remove(&handle);
            state.attached.remove(&handle);
            state.active_sessions.remove(&handle);
            state.freed.push((handle, kind));
            if kind == HandleKind::Environment {
                state.live.retain(|_, live| {
                    !(live.kind == HandleKind::Error && live.parent == Some(handle))
                });
            }
            Status::Success
        })
    }

    fn attach(&self, server: Handle, target: &str, _error: Handle) -> Status {
        let call = NativeCall::Attach {
            server,
            target: target.to_owned(),
        };
        self.status_call(call, |state| {
            if !state.is_live(server, HandleKind::Server) {
                return Status::InvalidHandle;
            }
            if !state.attached.insert(server) {
                return state.error("ORA-24309: already connected to a server");
            }
            Status::Success
        })
    }

    fn detach(&self, server: Handle, _error: Handle) -> Status {
        self.status_call(NativeCall::Detach { server }, |state| {
            if !state.is_live(server, HandleKind::Server) {
                return Status::InvalidHandle;
            }
            if !state.attached.remove(&server) {
                return state.error("ORA-24324: service handle not initialized");
            }
            Status::Success
        })
    }

    fn set_attribute(
        &self,
        target: Handle,
        target_kind: HandleKind,
        value: AttrValue<'_>,
        attribute: Attribute,
        _error: Handle,
    ) -> Status {
        self.status_call(NativeCall::SetAttribute { target, attribute }, |state| {
            if !state.is_live(target, target_kind) {
                return Status::InvalidHandle;
            }
            match value {
                AttrValue::Handle(handle) if !state.live.contains_key(&handle) => {
                    Status::InvalidHandle
                }
                _ => Status::Success,
            }
        })
    }

    fn begin_session(
        &self,
        service_context: Handle,
        session: Handle,
        credentials: CredentialKind,
        _error: Handle,
    ) -> Status {
        self.status_call(NativeCall::BeginSession { session, credentials }, |state| {
            if !state.is_live(service_context, HandleKind::ServiceContext)
                || !state.is_live(session, HandleKind::Session)
            {
                return Status::InvalidHandle;
            }
            state.active_sessions.insert(session);
            Status::Success
        })
    }

    fn end_session(&self, service_context: Handle, session: Handle, _error: Handle) -> Status {
        self.status_call(NativeCall::EndSession { session }, |state| {
            if !state.is_live(service_context, HandleKind::ServiceContext) {
                return Status::InvalidHandle;
            }
            if !state.active_sessions.remove(&session) {
                return state.error("ORA-01012: not logged on");
            }
            Status::Success
        })
    }

    fn last_error_message(&self, _error: Handle) -> String {
        self.state.lock().last_error.clone()
    }
}

impl fmt::Debug for MockNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockNative")
            .field("live", &state.live.len())
            .field("calls", &state.calls.len())
            .field("rules", &state.rules.len())
            .finish()
    }
}
