//! Resource node state, identity and keys.
//!
//! Every node in the hierarchy (environment, server, session, connection)
//! is either open, holding its native handles and its place in the parent
//! registry, or closed. A closed node is pool-ready: it keeps its identity
//! and the capacity of its registries, and nothing else.
//!
//! ## State Transitions
//!
//! ```text
//! Closed (pooled) -> Open (via open_* on the parent)
//! Open -> Closed (via close, directly or through the parent's cascade)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::Key;

/// Open/closed state of a resource node.
///
/// `T` is whatever the node only holds while open: native handles,
/// bindings to other nodes.
#[derive(Debug)]
pub(crate) enum NodeState<T> {
    /// The node is live.
    Open(T),
    /// The node is closed or was never opened.
    Closed,
}

impl<T> Default for NodeState<T> {
    fn default() -> Self {
        Self::Closed
    }
}

impl<T> NodeState<T> {
    pub(crate) fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub(crate) fn as_open(&self) -> Option<&T> {
        match self {
            Self::Open(inner) => Some(inner),
            Self::Closed => None,
        }
    }

    /// Move the open payload out, leaving the node closed.
    pub(crate) fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Self::Open(inner) => Some(inner),
            Self::Closed => None,
        }
    }
}

/// Kind of resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Root scope owning servers and connections.
    Environment,
    /// Attachment to one database server process.
    Server,
    /// Authenticated user session on a server.
    Session,
    /// Server plus session opened together from a connect string.
    Connection,
}

impl ResourceKind {
    /// Get the kind name used in messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Server => "server",
            Self::Session => "session",
            Self::Connection => "connection",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a resource node, as reported in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Node kind.
    pub kind: ResourceKind,
    /// Node identity, unique among open siblings under one parent.
    pub id: u64,
}

impl ResourceId {
    /// Create a resource id.
    #[must_use]
    pub fn new(kind: ResourceKind, id: u64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Identity carried by a pooled body across lease/return cycles.
///
/// The identity is assigned the first time a body is leased under a parent
/// and kept while the body moves through the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Identity {
    id: u64,
    issuer: u64,
}

impl Identity {
    pub(crate) fn get(&self) -> u64 {
        self.id
    }
}

static NEXT_ISSUER: AtomicU64 = AtomicU64::new(1);

/// Per-parent identity counter.
///
/// Every scope gets a process-unique issuer token the first time it hands
/// out an id. A body that comes back from the pool keeps its id only if this
/// scope issued it; otherwise it draws a fresh one, so ids stay unique among
/// the open children of one parent even though pools are shared.
#[derive(Debug, Default)]
pub(crate) struct IdScope {
    issuer: u64,
    last: u64,
}

impl IdScope {
    pub(crate) fn issue(&mut self, identity: &mut Identity) -> u64 {
        if self.issuer == 0 {
            self.issuer = NEXT_ISSUER.fetch_add(1, Ordering::Relaxed);
        }
        if identity.id == 0 || identity.issuer != self.issuer {
            self.last += 1;
            identity.id = self.last;
            identity.issuer = self.issuer;
        }
        identity.id
    }

    /// Process-unique token of this scope, zero until the first id is issued.
    pub(crate) fn issuer(&self) -> u64 {
        self.issuer
    }
}

macro_rules! resource_key {
    ($(#[$doc:meta])* $name:ident => $node:ty, $kind:expr) => {
        $(#[$doc])*
        ///
        /// The key is the node's membership in its parent registry and only
        /// resolves through the parent that issued it. After the node closes
        /// every lookup with it fails with `NotOpen`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            pub(crate) slot: Key<$node>,
            pub(crate) scope: u64,
            pub(crate) id: u64,
        }

        impl $name {
            /// Get the identity of the node this key refers to.
            #[must_use]
            pub fn id(&self) -> u64 {
                self.id
            }

            /// Get the resource id reported in errors.
            #[must_use]
            pub fn resource(&self) -> ResourceId {
                ResourceId::new($kind, self.id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.resource().fmt(f)
            }
        }
    };
}

resource_key!(
    /// Key of a server opened on an environment.
    ServerKey => crate::server::Server, ResourceKind::Server
);
resource_key!(
    /// Key of a session opened on a server.
    SessionKey => crate::session::Session, ResourceKind::Session
);
resource_key!(
    /// Key of a connection opened on an environment.
    ConnectionKey => crate::connection::Connection, ResourceKind::Connection
);
