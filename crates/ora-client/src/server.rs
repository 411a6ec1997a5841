//! Server attachments and the sessions opened on them.

use ora_driver_pool::Recycle;

use crate::config::StatementConfig;
use crate::connect_string::Credentials;
use crate::driver::Scope;
use crate::error::{Error, Result};
use crate::multi_error::ErrorCollector;
use crate::native::{AttrValue, Attribute, Handle, HandleKind, NativeContext};
use crate::registry::Registry;
use crate::session::Session;
use crate::state::{IdScope, Identity, NodeState, ResourceId, ResourceKind, SessionKey};

/// An attachment to one database server.
///
/// A server holds a server handle and the service context bound to it, plus
/// the sessions opened through it. Servers are owned by their
/// [`Environment`](crate::Environment) and reached through a
/// [`ServerKey`](crate::ServerKey).
#[derive(Debug, Default)]
pub struct Server {
    identity: Identity,
    env_id: u64,
    state: NodeState<ServerHandles>,
    target: String,
    statement_config: StatementConfig,
    sessions: Registry<Session>,
    session_ids: IdScope,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerHandles {
    server: Handle,
    service_context: Handle,
}

impl Server {
    /// Get the server identity, unique among open servers of its
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

    /// Check if the server is attached.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Get the target this server is attached to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Number of open sessions.
    #[must_use]
    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Get the server's statement defaults.
    #[must_use]
    pub fn statement_config(&self) -> &StatementConfig {
        &self.statement_config
    }

    /// Replace the server's statement defaults and push them to every open
    /// session.
    pub fn set_statement_config(&mut self, config: StatementConfig) -> Result<()> {
        config.validate()?;
        for session in self.sessions.values_mut() {
            session.set_statement_config(config.clone())?;
        }
        self.statement_config = config;
        Ok(())
    }

    /// Iterate open sessions in the order they were opened.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub(crate) fn resource(&self) -> ResourceId {
        ResourceId::new(ResourceKind::Server, self.id())
    }

    pub(crate) fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    pub(crate) fn activate(
        &mut self,
        env_id: u64,
        handles: ServerHandles,
        target: &str,
        statement_config: &StatementConfig,
    ) {
        self.env_id = env_id;
        self.state = NodeState::Open(handles);
        self.target.push_str(target);
        self.statement_config = statement_config.clone();
    }

    /// Allocate a server handle, attach it to `target` and bind it to a new
    /// service context.
    ///
    /// Whatever was acquired before a failing step is released again, in
    /// reverse order, before the error is returned.
    pub(crate) fn attach(native: &NativeContext, target: &str) -> Result<ServerHandles> {
        let api = native.api();
        let error = native.error_handle();

        let server = native.allocate(HandleKind::Server)?;

        if let Err(e) = native.check_open("server attach", api.attach(server, target, error)) {
            release(native, server, false, None);
            return Err(e);
        }

        let service_context = match native.allocate(HandleKind::ServiceContext) {
            Ok(handle) => handle,
            Err(e) => {
                release(native, server, true, None);
                return Err(e);
            }
        };

        if let Err(e) = native.check_open(
            "set server on service context",
            api.set_attribute(
                service_context,
                HandleKind::ServiceContext,
                AttrValue::Handle(server),
                Attribute::Server,
                error,
            ),
        ) {
            release(native, server, true, Some(service_context));
            return Err(e);
        }

        Ok(ServerHandles {
            server,
            service_context,
        })
    }

    fn handles(&self) -> Result<ServerHandles> {
        self.state
            .as_open()
            .copied()
            .ok_or_else(|| Error::not_open(self.resource()))
    }

    /// Begin a session and register it under this server.
    pub(crate) fn open_session(
        &mut self,
        scope: &Scope<'_>,
        credentials: &Credentials,
    ) -> Result<SessionKey> {
        let handles = self.handles()?;
        let handle = Session::begin(scope, handles.service_context, credentials)?;

        let (mut session, origin) = scope.pools.sessions.lease();
        let server_id = self.id();
        let id = self.session_ids.issue(session.identity_mut());
        session.activate(server_id, handle, credentials, &self.statement_config);
        let slot = self.sessions.insert(session);

        tracing::info!(
            server = server_id,
            session = id,
            recycled = origin.is_recycled(),
            "opened session"
        );
        Ok(SessionKey {
            slot,
            scope: self.session_ids.issuer(),
            id,
        })
    }

    pub(crate) fn session(&self, key: SessionKey) -> Result<&Session> {
        let issued_here = key.scope == self.session_ids.issuer();
        self.sessions
            .get(key.slot)
            .filter(|session| issued_here && session.id() == key.id)
            .ok_or_else(|| Error::not_open(key.resource()))
    }

    pub(crate) fn session_mut(&mut self, key: SessionKey) -> Result<&mut Session> {
        let issued_here = key.scope == self.session_ids.issuer();
        self.sessions
            .get_mut(key.slot)
            .filter(|session| issued_here && session.id() == key.id)
            .ok_or_else(|| Error::not_open(key.resource()))
    }

    pub(crate) fn has_session(&self, key: SessionKey) -> bool {
        self.session(key).is_ok()
    }

    /// Unregister and close one session.
    pub(crate) fn close_session(&mut self, scope: &Scope<'_>, key: SessionKey) -> Result<()> {
        let handles = self.handles()?;
        self.session(key)?;
        let session = self
            .sessions
            .remove(key.slot)
            .ok_or_else(|| Error::not_open(key.resource()))?;
        session.close(scope, handles.service_context)
    }

    /// Close every session, detach, free the service context and server
    /// handles, then return the body to the pool.
    ///
    /// Every step runs even when an earlier one fails; the failures come back
    /// together.
    pub(crate) fn close(mut self, scope: &Scope<'_>) -> Result<()> {
        let resource = self.resource();
        let Some(handles) = self.state.take() else {
            return Err(Error::not_open(resource));
        };
        tracing::info!(
            env = self.env_id,
            server = self.id(),
            sessions = self.sessions.len(),
            "closing server"
        );

        let native = scope.native;
        let mut errors = ErrorCollector::new(resource);

        while let Some((_, session)) = self.sessions.pop_front() {
            let source = session.resource();
            errors.run(source, || session.close(scope, handles.service_context));
        }

        errors.run(resource, || {
            native.check_close(
                "server detach",
                native
                    .api()
                    .detach(handles.server, native.error_handle()),
            )
        });
        errors.run(resource, || {
            native.free(handles.service_context, HandleKind::ServiceContext)
        });
        errors.run(resource, || native.free(handles.server, HandleKind::Server));

        self.reset();
        scope.pools.servers.put(self);
        errors.finish()
    }

    fn reset(&mut self) {
        self.state = NodeState::Closed;
        self.env_id = 0;
        self.target.clear();
        self.statement_config = StatementConfig::default();
        self.sessions.clear();
    }
}

impl Recycle for Server {
    fn is_reset(&self) -> bool {
        !self.state.is_open() && self.sessions.is_empty() && self.target.is_empty()
    }
}

/// Undo a partially completed [`Server::attach`]. Failures are only logged;
/// the caller reports the error that started the unwind.
fn release(
    native: &NativeContext,
    server: Handle,
    attached: bool,
    service_context: Option<Handle>,
) {
    if let Some(service_context) = service_context {
        if let Err(e) = native.free(service_context, HandleKind::ServiceContext) {
            tracing::warn!(error = %e, "failed to free service context during unwind");
        }
    }
    if attached {
        let status = native.api().detach(server, native.error_handle());
        if let Err(e) = native.check_close("server detach", status) {
            tracing::warn!(error = %e, "failed to detach server during unwind");
        }
    }
    if let Err(e) = native.free(server, HandleKind::Server) {
        tracing::warn!(error = %e, "failed to free server handle during unwind");
    }
}
