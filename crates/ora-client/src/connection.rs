//! Connections: a server and a session opened together from a connect
//! string.
//!
//! A connection does not own native handles of its own. It holds the keys of
//! the server and session it opened, and closing it closes both, session
//! first.

use ora_driver_pool::Recycle;

use crate::driver::Scope;
use crate::error::{Error, Result};
use crate::multi_error::ErrorCollector;
use crate::registry::Registry;
use crate::server::Server;
use crate::state::{Identity, NodeState, ResourceId, ResourceKind, ServerKey, SessionKey};

/// A server plus session opened from one connect string.
#[derive(Debug, Default)]
pub struct Connection {
    identity: Identity,
    env_id: u64,
    state: NodeState<Binding>,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    server: ServerKey,
    session: SessionKey,
}

impl Connection {
    /// Get the connection identity, unique among open connections of its
    /// environment.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.identity.get()
    }

    /// Get the identity of the owning environment.
    #[must_use]
    pub fn env_id(&self) -> u64 {
        self.env_id
    }

    /// Check if the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Get the key of the server this connection opened.
    #[must_use]
    pub fn server(&self) -> Option<ServerKey> {
        self.state.as_open().map(|binding| binding.server)
    }

    /// Get the key of the session this connection opened.
    #[must_use]
    pub fn session(&self) -> Option<SessionKey> {
        self.state.as_open().map(|binding| binding.session)
    }

    pub(crate) fn resource(&self) -> ResourceId {
        ResourceId::new(ResourceKind::Connection, self.id())
    }

    pub(crate) fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    pub(crate) fn activate(&mut self, env_id: u64, server: ServerKey, session: SessionKey) {
        self.env_id = env_id;
        self.state = NodeState::Open(Binding { server, session });
    }

    /// Close the bound session, then the bound server, then return the body
    /// to the pool.
    ///
    /// The server is removed from `servers` first. A server or session that
    /// was already closed on its own is skipped.
    pub(crate) fn close(mut self, scope: &Scope<'_>, servers: &mut Registry<Server>) -> Result<()> {
        let resource = self.resource();
        let Some(binding) = self.state.take() else {
            return Err(Error::not_open(resource));
        };
        tracing::info!(env = self.env_id, connection = self.id(), "closing connection");

        let mut errors = ErrorCollector::new(resource);
        match take_server(servers, binding.server) {
            Some(mut server) => {
                if server.has_session(binding.session) {
                    errors.run(binding.session.resource(), || {
                        server.close_session(scope, binding.session)
                    });
                } else {
                    tracing::debug!(session = binding.session.id(), "bound session already closed");
                }
                errors.run(binding.server.resource(), || server.close(scope));
            }
            None => {
                tracing::debug!(server = binding.server.id(), "bound server already closed");
            }
        }

        self.reset();
        scope.pools.connections.put(self);
        errors.finish()
    }

    fn reset(&mut self) {
        self.state = NodeState::Closed;
        self.env_id = 0;
    }
}

impl Recycle for Connection {
    fn is_reset(&self) -> bool {
        !self.state.is_open()
    }
}

/// Remove the server `key` refers to, if it is still that server.
pub(crate) fn take_server(servers: &mut Registry<Server>, key: ServerKey) -> Option<Server> {
    let current = servers.get(key.slot)?;
    if current.id() != key.id {
        return None;
    }
    servers.remove(key.slot)
}
