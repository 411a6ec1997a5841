//! User sessions.

use ora_driver_pool::Recycle;

use crate::config::StatementConfig;
use crate::connect_string::Credentials;
use crate::driver::Scope;
use crate::error::{Error, Result};
use crate::multi_error::ErrorCollector;
use crate::native::{AttrValue, Attribute, CredentialKind, Handle, HandleKind};
use crate::state::{Identity, NodeState, ResourceId, ResourceKind};

/// An authenticated user session on a server.
///
/// Sessions are owned by their [`Server`](crate::Server) and reached through
/// a [`SessionKey`](crate::SessionKey).
#[derive(Debug, Default)]
pub struct Session {
    identity: Identity,
    server_id: u64,
    state: NodeState<SessionHandle>,
    username: String,
    statement_config: StatementConfig,
}

#[derive(Debug, Clone, Copy)]
struct SessionHandle {
    handle: Handle,
    credentials: CredentialKind,
}

impl Session {
    /// Get the session identity, unique among open sessions of its server.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.identity.get()
    }

    /// Get the identity of the owning server.
    #[must_use]
    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Check if the session is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Get the username the session authenticated as (empty if external).
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get how the session authenticated.
    #[must_use]
    pub fn credential_kind(&self) -> Option<CredentialKind> {
        self.state.as_open().map(|open| open.credentials)
    }

    /// Get the session's statement defaults.
    #[must_use]
    pub fn statement_config(&self) -> &StatementConfig {
        &self.statement_config
    }

    /// Replace the session's statement defaults.
    pub fn set_statement_config(&mut self, config: StatementConfig) -> Result<()> {
        config.validate()?;
        self.statement_config = config;
        Ok(())
    }

    pub(crate) fn resource(&self) -> ResourceId {
        ResourceId::new(ResourceKind::Session, self.id())
    }

    pub(crate) fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    /// Populate a leased body with a session begun by [`Session::begin`].
    pub(crate) fn activate(
        &mut self,
        server_id: u64,
        handle: Handle,
        credentials: &Credentials,
        statement_config: &StatementConfig,
    ) {
        self.server_id = server_id;
        self.state = NodeState::Open(SessionHandle {
            handle,
            credentials: credentials.kind(),
        });
        self.username.push_str(credentials.username());
        self.statement_config = statement_config.clone();
    }

    /// Allocate a session handle and begin a session on `service_context`.
    ///
    /// On failure the session handle is freed before the error is returned.
    pub(crate) fn begin(
        scope: &Scope<'_>,
        service_context: Handle,
        credentials: &Credentials,
    ) -> Result<Handle> {
        let native = scope.native;
        let handle = native.allocate(HandleKind::Session)?;

        if let Err(e) = Self::authenticate(scope, service_context, handle, credentials) {
            if let Err(free_err) = native.free(handle, HandleKind::Session) {
                tracing::warn!(
                    error = %free_err,
                    "failed to free session handle after failed begin"
                );
            }
            return Err(e);
        }
        Ok(handle)
    }

    fn authenticate(
        scope: &Scope<'_>,
        service_context: Handle,
        session: Handle,
        credentials: &Credentials,
    ) -> Result<()> {
        let native = scope.native;
        let api = native.api();
        let error = native.error_handle();

        if let Credentials::Database { username, password } = credentials {
            native.check_open(
                "set session username",
                api.set_attribute(
                    session,
                    HandleKind::Session,
                    AttrValue::Text(username),
                    Attribute::Username,
                    error,
                ),
            )?;
            native.check_open(
                "set session password",
                api.set_attribute(
                    session,
                    HandleKind::Session,
                    AttrValue::Text(password),
                    Attribute::Password,
                    error,
                ),
            )?;
        }

        native.check_open(
            "session begin",
            api.begin_session(service_context, session, credentials.kind(), error),
        )?;

        let bound = native.check_open(
            "set session on service context",
            api.set_attribute(
                service_context,
                HandleKind::ServiceContext,
                AttrValue::Handle(session),
                Attribute::Session,
                error,
            ),
        );
        if bound.is_err() {
            let status = api.end_session(service_context, session, error);
            if let Err(e) = native.check_close("session end", status) {
                tracing::warn!(error = %e, "failed to end session during unwind");
            }
        }
        bound
    }

    /// End the session and free its handle, then return the body to the
    /// pool.
    ///
    /// Both steps are attempted even if the first fails.
    pub(crate) fn close(mut self, scope: &Scope<'_>, service_context: Handle) -> Result<()> {
        let resource = self.resource();
        let Some(open) = self.state.take() else {
            return Err(Error::not_open(resource));
        };
        tracing::debug!(server = self.server_id, session = self.id(), "closing session");

        let native = scope.native;
        let mut errors = ErrorCollector::new(resource);
        errors.run(resource, || {
            native.check_close(
                "session end",
                native
                    .api()
                    .end_session(service_context, open.handle, native.error_handle()),
            )
        });
        errors.run(resource, || native.free(open.handle, HandleKind::Session));

        self.reset();
        scope.pools.sessions.put(self);
        errors.finish()
    }

    fn reset(&mut self) {
        self.state = NodeState::Closed;
        self.server_id = 0;
        self.username.clear();
        self.statement_config = StatementConfig::default();
    }
}

impl Recycle for Session {
    fn is_reset(&self) -> bool {
        !self.state.is_open() && self.username.is_empty()
    }
}
