//! Environments: the root scope of the resource hierarchy.
//!
//! An environment owns servers (each owning its sessions) and connections.
//! Closing it closes connections first, oldest first, then any server that
//! is still open, then frees the environment's own handles. Every step runs
//! regardless of earlier failures; failures are returned together as one
//! [`MultiError`](crate::MultiError).

use std::fmt;
use std::sync::Arc;

use ora_driver_pool::Recycle;

use crate::config::StatementConfig;
use crate::connect_string::{ConnectString, Credentials};
use crate::connection::{Connection, take_server};
use crate::driver::{DriverShared, Scope};
use crate::error::{Error, Result};
use crate::multi_error::ErrorCollector;
use crate::native::{HandleKind, NativeContext};
use crate::registry::{Key, Registry};
use crate::server::Server;
use crate::session::Session;
use crate::state::{
    ConnectionKey, IdScope, Identity, NodeState, ResourceId, ResourceKind, ServerKey, SessionKey,
};

/// Pooled part of an environment: identity, child registries and the
/// statement defaults.
#[derive(Debug, Default)]
pub(crate) struct EnvironmentBody {
    identity: Identity,
    server_ids: IdScope,
    connection_ids: IdScope,
    servers: Registry<Server>,
    connections: Registry<Connection>,
    statement_config: StatementConfig,
}

impl EnvironmentBody {
    pub(crate) fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    pub(crate) fn set_statement_config(&mut self, config: StatementConfig) {
        self.statement_config = config;
    }

    fn id(&self) -> u64 {
        self.identity.get()
    }

    fn server(&self, key: ServerKey) -> Result<&Server> {
        let issued_here = key.scope == self.server_ids.issuer();
        self.servers
            .get(key.slot)
            .filter(|server| issued_here && server.id() == key.id)
            .ok_or_else(|| Error::not_open(key.resource()))
    }

    fn server_mut(&mut self, key: ServerKey) -> Result<&mut Server> {
        let issued_here = key.scope == self.server_ids.issuer();
        self.servers
            .get_mut(key.slot)
            .filter(|server| issued_here && server.id() == key.id)
            .ok_or_else(|| Error::not_open(key.resource()))
    }

    fn connection(&self, key: ConnectionKey) -> Result<&Connection> {
        let issued_here = key.scope == self.connection_ids.issuer();
        self.connections
            .get(key.slot)
            .filter(|conn| issued_here && conn.id() == key.id)
            .ok_or_else(|| Error::not_open(key.resource()))
    }

    fn open_server(&mut self, scope: &Scope<'_>, target: &str) -> Result<ServerKey> {
        let handles = Server::attach(scope.native, target)?;

        let (mut server, origin) = scope.pools.servers.lease();
        let env_id = self.id();
        let id = self.server_ids.issue(server.identity_mut());
        server.activate(env_id, handles, target, &self.statement_config);
        let slot = self.servers.insert(server);

        tracing::info!(
            env = env_id,
            server = id,
            target,
            recycled = origin.is_recycled(),
            "opened server"
        );
        Ok(ServerKey {
            slot,
            scope: self.server_ids.issuer(),
            id,
        })
    }

    fn close_server(&mut self, scope: &Scope<'_>, key: ServerKey) -> Result<()> {
        self.server(key)?;
        let server =
            take_server(&mut self.servers, key).ok_or_else(|| Error::not_open(key.resource()))?;
        server.close(scope)
    }

    fn open_connection(
        &mut self,
        scope: &Scope<'_>,
        connect_string: &str,
    ) -> Result<ConnectionKey> {
        let (credentials, target) = ConnectString::parse(connect_string)?.into_parts();

        let server = self.open_server(scope, &target)?;
        let session = match self.open_session(scope, server, &credentials) {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_err) = self.close_server(scope, server) {
                    tracing::warn!(
                        error = %close_err,
                        "failed to close server after session failure"
                    );
                }
                return Err(e);
            }
        };

        let (mut conn, origin) = scope.pools.connections.lease();
        let env_id = self.id();
        let id = self.connection_ids.issue(conn.identity_mut());
        conn.activate(env_id, server, session);
        let slot = self.connections.insert(conn);

        tracing::info!(
            env = env_id,
            connection = id,
            server = server.id(),
            session = session.id(),
            recycled = origin.is_recycled(),
            "opened connection"
        );
        Ok(ConnectionKey {
            slot,
            scope: self.connection_ids.issuer(),
            id,
        })
    }

    fn open_session(
        &mut self,
        scope: &Scope<'_>,
        server: ServerKey,
        credentials: &Credentials,
    ) -> Result<SessionKey> {
        self.server_mut(server)?.open_session(scope, credentials)
    }

    fn close_connection(&mut self, scope: &Scope<'_>, key: ConnectionKey) -> Result<()> {
        self.connection(key)?;
        let conn = self
            .connections
            .remove(key.slot)
            .ok_or_else(|| Error::not_open(key.resource()))?;
        conn.close(scope, &mut self.servers)
    }

    /// Close every child, oldest connection first, then leftover servers.
    fn close_children(&mut self, scope: &Scope<'_>, errors: &mut ErrorCollector) {
        while let Some((_, conn)) = self.connections.pop_front() {
            let source = conn.resource();
            let servers = &mut self.servers;
            errors.run(source, || conn.close(scope, servers));
        }
        while let Some((_, server)) = self.servers.pop_front() {
            let source = server.resource();
            errors.run(source, || server.close(scope));
        }
    }

    fn reset(&mut self) {
        self.servers.clear();
        self.connections.clear();
        self.statement_config = StatementConfig::default();
    }
}

impl Recycle for EnvironmentBody {
    fn is_reset(&self) -> bool {
        self.servers.is_empty() && self.connections.is_empty()
    }
}

/// The root scope of the resource hierarchy.
///
/// Obtained from [`Driver::open_env`](crate::Driver::open_env). Every
/// operation fails with [`Error::NotOpen`] once the environment is closed.
///
/// Dropping an open environment closes it; failures are logged. Call
/// [`close`](Environment::close) to observe them.
pub struct Environment {
    id: u64,
    state: NodeState<OpenEnvironment>,
}

struct OpenEnvironment {
    shared: Arc<DriverShared>,
    native: NativeContext,
    body: EnvironmentBody,
    membership: Key<u64>,
}

impl OpenEnvironment {
    fn split(&mut self) -> (Scope<'_>, &mut EnvironmentBody) {
        (
            Scope {
                native: &self.native,
                pools: &self.shared.pools,
            },
            &mut self.body,
        )
    }
}

impl Environment {
    pub(crate) fn new(
        shared: Arc<DriverShared>,
        native: NativeContext,
        body: EnvironmentBody,
        membership: Key<u64>,
    ) -> Self {
        Self {
            id: body.id(),
            state: NodeState::Open(OpenEnvironment {
                shared,
                native,
                body,
                membership,
            }),
        }
    }

    /// Get the environment identity, unique among open environments of the
    /// driver.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if the environment is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    fn resource(&self) -> ResourceId {
        ResourceId::new(ResourceKind::Environment, self.id)
    }

    fn open(&self) -> Result<&OpenEnvironment> {
        self.state
            .as_open()
            .ok_or_else(|| Error::not_open(self.resource()))
    }

    fn open_mut(&mut self) -> Result<&mut OpenEnvironment> {
        let resource = self.resource();
        match &mut self.state {
            NodeState::Open(open) => Ok(open),
            NodeState::Closed => Err(Error::not_open(resource)),
        }
    }

    /// Number of open servers, including those owned by connections.
    pub fn num_servers(&self) -> Result<usize> {
        Ok(self.open()?.body.servers.len())
    }

    /// Number of open connections.
    pub fn num_connections(&self) -> Result<usize> {
        Ok(self.open()?.body.connections.len())
    }

    /// Attach to a server.
    ///
    /// On failure every handle acquired along the way has been released.
    pub fn open_server(&mut self, target: &str) -> Result<ServerKey> {
        let (scope, body) = self.open_mut()?.split();
        body.open_server(&scope, target)
    }

    /// Close a server and every session open on it.
    pub fn close_server(&mut self, key: ServerKey) -> Result<()> {
        let (scope, body) = self.open_mut()?.split();
        body.close_server(&scope, key)
    }

    /// Get an open server.
    pub fn server(&self, key: ServerKey) -> Result<&Server> {
        self.open()?.body.server(key)
    }

    /// Get an open server mutably.
    pub fn server_mut(&mut self, key: ServerKey) -> Result<&mut Server> {
        self.open_mut()?.body.server_mut(key)
    }

    /// Iterate open servers in the order they were opened.
    pub fn servers(&self) -> Result<impl Iterator<Item = &Server>> {
        Ok(self.open()?.body.servers.iter())
    }

    /// Begin a session on an open server.
    pub fn open_session(
        &mut self,
        server: ServerKey,
        credentials: &Credentials,
    ) -> Result<SessionKey> {
        let (scope, body) = self.open_mut()?.split();
        body.open_session(&scope, server, credentials)
    }

    /// End a session and release its handle.
    pub fn close_session(&mut self, server: ServerKey, session: SessionKey) -> Result<()> {
        let (scope, body) = self.open_mut()?.split();
        body.server_mut(server)?.close_session(&scope, session)
    }

    /// Get an open session.
    pub fn session(&self, server: ServerKey, session: SessionKey) -> Result<&Session> {
        self.server(server)?.session(session)
    }

    /// Get an open session mutably.
    pub fn session_mut(&mut self, server: ServerKey, session: SessionKey) -> Result<&mut Session> {
        self.server_mut(server)?.session_mut(session)
    }

    /// Parse a connect string, attach to its target and begin a session.
    ///
    /// If the session cannot be begun the server opened for it is closed
    /// again and the session error is returned.
    pub fn open_connection(&mut self, connect_string: &str) -> Result<ConnectionKey> {
        let (scope, body) = self.open_mut()?.split();
        body.open_connection(&scope, connect_string)
    }

    /// Close a connection: its session, then its server.
    pub fn close_connection(&mut self, key: ConnectionKey) -> Result<()> {
        let (scope, body) = self.open_mut()?.split();
        body.close_connection(&scope, key)
    }

    /// Get an open connection.
    pub fn connection(&self, key: ConnectionKey) -> Result<&Connection> {
        self.open()?.body.connection(key)
    }

    /// Get the environment's statement defaults.
    pub fn statement_config(&self) -> Result<&StatementConfig> {
        Ok(&self.open()?.body.statement_config)
    }

    /// Get the environment's statement defaults mutably.
    ///
    /// Changes made here only reach servers opened afterwards; use
    /// [`set_statement_config`](Environment::set_statement_config) to push
    /// them to servers that are already open.
    pub fn statement_config_mut(&mut self) -> Result<&mut StatementConfig> {
        Ok(&mut self.open_mut()?.body.statement_config)
    }

    /// Replace the statement defaults and push them to every open server,
    /// which pushes them on to its sessions.
    pub fn set_statement_config(&mut self, config: StatementConfig) -> Result<()> {
        let body = &mut self.open_mut()?.body;
        config.validate()?;
        for server in body.servers.values_mut() {
            server.set_statement_config(config.clone())?;
        }
        body.statement_config = config;
        Ok(())
    }

    /// Read the last native error recorded on the environment's error
    /// context.
    pub fn native_error(&self) -> Result<Error> {
        Ok(self.open()?.native.native_error())
    }

    /// Close every connection and server, free the environment's handles
    /// and return its body to the pool.
    ///
    /// Every step is attempted even when earlier ones fail or fault. If any
    /// failed, the result is an [`Error::Multi`] with one entry per failed
    /// step, even when there is only one. Closing twice fails with
    /// [`Error::NotOpen`].
    pub fn close(&mut self) -> Result<()> {
        let resource = self.resource();
        let Some(mut open) = self.state.take() else {
            return Err(Error::not_open(resource));
        };
        tracing::info!(
            env = self.id,
            connections = open.body.connections.len(),
            servers = open.body.servers.len(),
            "closing environment"
        );

        let mut errors = ErrorCollector::new(resource);
        {
            let (scope, body) = open.split();
            body.close_children(&scope, &mut errors);
        }

        let native = &open.native;
        errors.run(resource, || native.free(native.env_handle(), HandleKind::Environment));

        open.shared.release_env(open.membership);
        open.body.reset();
        let OpenEnvironment { shared, body, .. } = open;
        shared.pools.environments.put(body);

        errors.finish()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if !self.state.is_open() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(env = self.id, error = %e, "environment closed on drop with errors");
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Environment");
        debug.field("id", &self.id).field("open", &self.is_open());
        if let NodeState::Open(open) = &self.state {
            debug
                .field("native", &open.native)
                .field("servers", &open.body.servers.len())
                .field("connections", &open.body.connections.len());
        }
        debug.finish()
    }
}
