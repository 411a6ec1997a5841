//! # ora-client
//!
//! Client-side resource management for a native Oracle client library.
//!
//! The native library hands out opaque handles for environments, servers,
//! service contexts and sessions. This crate owns those handles on behalf of
//! the caller and arranges them in a strict hierarchy:
//!
//! ```text
//! Driver
//! └── Environment          (environment + error context handles)
//!     ├── Server           (server + service context handles)
//!     │   └── Session      (session handle)
//!     └── Connection       (a server and a session opened together)
//! ```
//!
//! ## Features
//!
//! - **Cascading close**: closing a node closes its children first, oldest
//!   first, and attempts every step even when earlier steps fail
//! - **Error aggregation**: failures from a cascade come back together as
//!   one [`MultiError`]
//! - **Fault barrier**: a panic raised while closing a child is turned into
//!   [`Error::InternalFault`] and does not stop the parent from releasing its
//!   own handles
//! - **Object pooling**: node bodies are recycled through per-kind pools
//!   shared by every environment of a [`Driver`]
//! - **Stale keys**: a key kept past its node's close fails with
//!   [`Error::NotOpen`] instead of reaching a different node
//!
//! ## Example
//!
//! ```rust,ignore
//! use ora_client::{Credentials, Driver};
//!
//! let driver = Driver::new(native_api);
//! let mut env = driver.open_env()?;
//!
//! // Server and session opened together from a connect string
//! let conn = env.open_connection("scott/tiger@orcl")?;
//!
//! // Or step by step
//! let server = env.open_server("//dbhost:1521/ORCLPDB1")?;
//! let session = env.open_session(server, &Credentials::database("scott", "tiger"))?;
//!
//! // Closes `conn`, `session` and `server`; reports every failure at once
//! env.close()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connect_string;
mod connection;
mod driver;
mod environment;
pub mod error;
pub mod multi_error;
pub mod native;
pub mod registry;
mod server;
mod session;
pub mod state;

// Re-export commonly used types
pub use config::{DriverConfig, StatementConfig};
pub use connect_string::{ConnectString, Credentials};
pub use connection::Connection;
pub use driver::{Driver, ResourcePoolStatus};
pub use environment::Environment;
pub use error::{Error, ErrorKind, Result};
pub use multi_error::{Failure, MultiError};
pub use native::{AttrValue, Attribute, CredentialKind, Handle, HandleKind, NativeApi, Status};
pub use ora_driver_pool::{PoolConfig, PoolStatus};
pub use server::Server;
pub use session::Session;
pub use state::{ConnectionKey, ResourceId, ResourceKind, ServerKey, SessionKey};
