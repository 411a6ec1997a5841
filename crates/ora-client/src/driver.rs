//! Driver entry point and shared resource pools.

use std::fmt;
use std::sync::Arc;

use ora_driver_pool::{ObjectPool, PoolConfig, PoolStatus};
use parking_lot::Mutex;

use crate::config::DriverConfig;
use crate::connection::Connection;
use crate::environment::{Environment, EnvironmentBody};
use crate::error::{Error, Result};
use crate::native::{HandleKind, NativeApi, NativeContext};
use crate::registry::{Key, Registry};
use crate::server::Server;
use crate::session::Session;
use crate::state::IdScope;

/// Entry point to the client.
///
/// A driver wraps the native capability and the object pools every
/// environment draws its resource bodies from. It is cheap to clone; clones
/// share the same pools.
///
/// # Example
///
/// ```rust,ignore
/// use ora_client::Driver;
///
/// let driver = Driver::new(native);
/// let mut env = driver.open_env()?;
/// let conn = env.open_connection("scott/tiger@orcl")?;
/// env.close()?;
/// ```
#[derive(Clone)]
pub struct Driver {
    shared: Arc<DriverShared>,
}

pub(crate) struct DriverShared {
    api: Arc<dyn NativeApi>,
    config: DriverConfig,
    pub(crate) pools: ResourcePools,
    envs: Mutex<EnvRegistry>,
}

#[derive(Default)]
struct EnvRegistry {
    ids: IdScope,
    open: Registry<u64>,
}

impl Driver {
    /// Create a driver with default configuration.
    pub fn new(api: impl NativeApi + 'static) -> Self {
        Self::build(Arc::new(api), DriverConfig::default())
    }

    /// Create a driver with custom configuration.
    pub fn with_config(api: impl NativeApi + 'static, config: DriverConfig) -> Result<Self> {
        Self::from_shared(Arc::new(api), config)
    }

    /// Create a driver over a native capability that is shared elsewhere.
    pub fn from_shared(api: Arc<dyn NativeApi>, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(api, config))
    }

    fn build(api: Arc<dyn NativeApi>, config: DriverConfig) -> Self {
        let pools = ResourcePools::new(&config.pool);
        Self {
            shared: Arc::new(DriverShared {
                api,
                config,
                pools,
                envs: Mutex::new(EnvRegistry::default()),
            }),
        }
    }

    /// Get the driver configuration.
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }

    /// Allocate a native environment with its error context and return the
    /// open [`Environment`].
    ///
    /// If the error context cannot be allocated, the environment handle is
    /// freed again before the error is returned.
    pub fn open_env(&self) -> Result<Environment> {
        let shared = &self.shared;
        let api = shared.api.as_ref();

        let env = api
            .allocate(None, HandleKind::Environment)
            .ok_or_else(|| {
                Error::AllocationFailed("unable to allocate environment handle".into())
            })?;
        let Some(error) = api.allocate(Some(env), HandleKind::Error) else {
            if !api.free(env, HandleKind::Environment).is_success() {
                tracing::warn!(
                    "failed to free environment handle after error handle allocation failed"
                );
            }
            return Err(Error::AllocationFailed("unable to allocate error handle".into()));
        };
        let native = NativeContext::new(Arc::clone(&shared.api), env, error);

        let (mut body, origin) = shared.pools.environments.lease();
        let (id, membership) = {
            let mut envs = shared.envs.lock();
            let id = envs.ids.issue(body.identity_mut());
            (id, envs.open.insert(id))
        };
        body.set_statement_config(shared.config.statement.clone());

        tracing::info!(env = id, recycled = origin.is_recycled(), "opened environment");
        Ok(Environment::new(Arc::clone(shared), native, body, membership))
    }

    /// Number of environments currently open on this driver.
    #[must_use]
    pub fn num_env(&self) -> usize {
        self.shared.envs.lock().open.len()
    }

    /// Get a snapshot of every resource pool.
    #[must_use]
    pub fn pool_status(&self) -> ResourcePoolStatus {
        self.shared.pools.status()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.shared.config)
            .field("num_env", &self.num_env())
            .finish_non_exhaustive()
    }
}

impl DriverShared {
    /// Drop an environment from the open set.
    pub(crate) fn release_env(&self, membership: Key<u64>) {
        self.envs.lock().open.remove(membership);
    }
}

/// Object pools for every resource body kind.
pub(crate) struct ResourcePools {
    pub(crate) environments: ObjectPool<EnvironmentBody>,
    pub(crate) servers: ObjectPool<Server>,
    pub(crate) sessions: ObjectPool<Session>,
    pub(crate) connections: ObjectPool<Connection>,
}

impl ResourcePools {
    fn new(config: &PoolConfig) -> Self {
        Self {
            environments: ObjectPool::new("environment", config.clone()),
            servers: ObjectPool::new("server", config.clone()),
            sessions: ObjectPool::new("session", config.clone()),
            connections: ObjectPool::new("connection", config.clone()),
        }
    }

    fn status(&self) -> ResourcePoolStatus {
        ResourcePoolStatus {
            environments: self.environments.status(),
            servers: self.servers.status(),
            sessions: self.sessions.status(),
            connections: self.connections.status(),
        }
    }
}

/// Snapshot of the driver's resource pools.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePoolStatus {
    /// Environment bodies.
    pub environments: PoolStatus,
    /// Server bodies.
    pub servers: PoolStatus,
    /// Session bodies.
    pub sessions: PoolStatus,
    /// Connection bodies.
    pub connections: PoolStatus,
}

/// Everything a node needs while opening or closing: the environment's
/// native context and the pools to return bodies to.
pub(crate) struct Scope<'a> {
    pub(crate) native: &'a NativeContext,
    pub(crate) pools: &'a ResourcePools,
}
