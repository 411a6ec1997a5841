//! # ora-testing
//!
//! Test infrastructure for the Oracle client crates.
//!
//! This crate provides an in-memory stand-in for the native client library
//! and the lifecycle tests that need it. The tests live here rather than in
//! `ora-client` because this crate depends on `ora-client`.
//!
//! ## Features
//!
//! - Mock native layer with handle tracking and call recording
//! - Failure and panic injection on any native call
//! - Test fixture utilities
//!
//! ## Mock Example
//!
//! ```rust
//! use ora_client::HandleKind;
//! use ora_testing::fixtures::{DATABASE_CONNECT, driver_with_mock};
//!
//! let (driver, native) = driver_with_mock();
//! let mut env = driver.open_env().unwrap();
//! env.open_connection(DATABASE_CONNECT).unwrap();
//! assert_eq!(native.live_count_of(HandleKind::Session), 1);
//!
//! env.close().unwrap();
//! assert_eq!(native.live_count(), 0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_native;

pub use mock_native::{MockNative, NativeCall, Outcome, Trigger};
