//! Cascading close tests: error aggregation and the fault barrier.
//!
//! A failing or panicking child must never stop its siblings from closing or
//! the environment from freeing its own handle.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ora_client::{Error, ErrorKind, HandleKind, MultiError, ResourceKind};
use ora_testing::fixtures::{DATABASE_CONNECT, driver_with_mock, init_tracing};
use ora_testing::{Outcome, Trigger};

const END_OF_FILE: &str = "ORA-03113: end-of-file on communication channel";

fn multi(err: &Error) -> &MultiError {
    err.as_multi()
        .unwrap_or_else(|| unreachable!("expected a multi-error, got {err}"))
}

#[test]
fn test_clean_close_is_ok() {
    let (driver, _native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    env.open_connection(DATABASE_CONNECT).unwrap();
    env.open_server("orcl").unwrap();

    assert!(env.close().is_ok());
}

#[test]
fn test_single_child_failure_is_still_multi_error() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    let server = env.open_server("orcl").unwrap();
    native.fail_once(Trigger::Detach, Outcome::error(END_OF_FILE));

    let err = env.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MultiError);
    let multi = multi(&err);
    assert_eq!(multi.len(), 1);
    assert_eq!(multi.scope().kind, ResourceKind::Environment);
    assert_eq!(multi.failures()[0].source, server.resource());
    assert!(err.to_string().contains("ORA-03113"));
    assert!(err.to_string().contains(&format!("[server {}]", server.id())));
}

#[test]
fn test_k_failing_children_give_k_entries() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    for _ in 0..3 {
        env.open_connection(DATABASE_CONNECT).unwrap();
    }
    let servers: Vec<_> = (0..4).map(|_| env.open_server("orcl").unwrap()).collect();

    // Two connections fail to end their session, one plain server fails to
    // free its handle.
    let plain = native.handles_of(HandleKind::Server)[3];
    native.fail_times(Trigger::EndSession, Outcome::error("ORA-01012: not logged on"), 2);
    native.fail_once(Trigger::FreeHandle(plain), Outcome::error("ORA-24338: handle not executed"));

    let err = env.close().unwrap_err();
    let multi = multi(&err);
    assert_eq!(multi.len(), 3);

    let sources: Vec<ResourceKind> = multi.failures().iter().map(|f| f.source.kind).collect();
    assert_eq!(
        sources,
        [ResourceKind::Connection, ResourceKind::Connection, ResourceKind::Server]
    );
    assert_eq!(multi.failures()[2].source, servers[0].resource());

    // Only the handle whose free failed is left behind.
    assert_eq!(native.live_count(), 1);
    assert!(native.is_live(plain));
    assert!(!env.is_open());
}

#[test]
fn test_sub_errors_are_preserved() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    env.open_server("orcl").unwrap();
    native.fail_once(Trigger::Free(HandleKind::Server), Outcome::InvalidHandle);

    let err = env.close().unwrap_err();
    let server_failure = &multi(&err).failures()[0];
    // The server's own close aggregated its step failure.
    let inner = multi(&server_failure.error);
    assert_eq!(inner.scope().kind, ResourceKind::Server);
    let kinds: Vec<ErrorKind> = inner.errors().map(Error::kind).collect();
    assert_eq!(kinds, [ErrorKind::AllocationFailed]);
    assert!(std::error::Error::source(multi(&err)).is_some());
}

#[test]
fn test_failed_child_does_not_stop_siblings() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    let first = env.open_server("first").unwrap();
    env.open_server("second").unwrap();
    env.open_server("third").unwrap();

    let handle = native.handles_of(HandleKind::Server)[0];
    native.fail_always(
        Trigger::FreeHandle(handle),
        Outcome::error("ORA-24338: handle not executed"),
    );

    let err = env.close().unwrap_err();
    assert_eq!(multi(&err).len(), 1);
    assert_eq!(multi(&err).failures()[0].source, first.resource());
    assert_eq!(native.free_count(HandleKind::Server), 2);
    assert_eq!(native.live_count(), 1, "only the server whose free failed leaks");
    assert!(native.is_live(handle));
    assert!(!native.is_live(native.handles_of(HandleKind::Environment)[0]));
}

#[test]
fn test_env_free_failure_is_reported() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    env.open_server("orcl").unwrap();
    native.fail_once(
        Trigger::Free(HandleKind::Environment),
        Outcome::error("ORA-24334: no descriptor for this position"),
    );

    let err = env.close().unwrap_err();
    let multi = multi(&err);
    assert_eq!(multi.len(), 1);
    assert_eq!(multi.failures()[0].source.kind, ResourceKind::Environment);
    assert_eq!(multi.failures()[0].error.kind(), ErrorKind::NativeError);
    // Closed anyway: the node does not come back to life.
    assert!(!env.is_open());
    assert_eq!(driver.num_env(), 0);
}

#[test]
fn test_connections_close_before_servers() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    env.open_server("plain").unwrap();
    env.open_connection("scott/tiger@conn").unwrap();

    env.close().unwrap();
    let detached: Vec<_> = native
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ora_testing::NativeCall::Detach { server } => Some(server),
            _ => None,
        })
        .collect();
    let servers = native.handles_of(HandleKind::Server);
    // The connection's server (allocated second) is detached first.
    assert_eq!(detached, [servers[1], servers[0]]);
}

#[test]
fn test_children_close_oldest_first() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    for target in ["a", "b", "c"] {
        env.open_server(target).unwrap();
    }

    env.close().unwrap();
    let freed_servers: Vec<_> = native
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ora_testing::NativeCall::Free {
                handle,
                kind: HandleKind::Server,
            } => Some(handle),
            _ => None,
        })
        .collect();
    assert_eq!(freed_servers, native.handles_of(HandleKind::Server));
}

// =============================================================================
// Fault barrier
// =============================================================================

#[test]
fn test_panic_in_child_close_still_frees_env() {
    init_tracing();
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    env.open_connection(DATABASE_CONNECT).unwrap();
    env.open_connection(DATABASE_CONNECT).unwrap();
    env.open_server("orcl").unwrap();

    // The first connection's session end panics inside the native layer.
    native.fail_once(Trigger::EndSession, Outcome::panic("segfault in native layer"));

    let err = env.close().unwrap_err();
    let multi = multi(&err);
    assert_eq!(multi.len(), 1);

    let failure = &multi.failures()[0];
    assert_eq!(failure.source.kind, ResourceKind::Connection);
    let text = failure.error.to_string();
    assert!(text.contains("internal fault"), "{text}");
    assert!(text.contains("segfault in native layer"), "{text}");

    // Every sibling closed and the environment handle was freed.
    let env_handle = native.handles_of(HandleKind::Environment)[0];
    assert!(native.was_freed(env_handle));
    assert_eq!(native.free_count(HandleKind::Server), 3);
    assert!(!env.is_open());
    assert_eq!(driver.num_env(), 0);
}

#[test]
fn test_panic_in_server_free_is_internal_fault() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    let server = env.open_server("orcl").unwrap();
    env.open_server("orcl").unwrap();
    native.fail_once(Trigger::Free(HandleKind::Server), Outcome::panic("double free detected"));

    let err = env.close().unwrap_err();
    let multi = multi(&err);
    assert_eq!(multi.len(), 1);
    assert_eq!(multi.failures()[0].source, server.resource());

    let inner = multi.failures()[0].error.as_multi().unwrap();
    assert_eq!(inner.errors().next().unwrap().kind(), ErrorKind::InternalFault);
    assert_eq!(native.live_count(), 1, "the panicking free leaked its handle");
}

#[test]
fn test_panic_in_env_free_is_caught() {
    let (driver, native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    native.fail_once(Trigger::Free(HandleKind::Environment), Outcome::panic("heap corruption"));

    let err = env.close().unwrap_err();
    assert_eq!(multi(&err).failures()[0].error.kind(), ErrorKind::InternalFault);
    assert!(!env.is_open());
}

#[test]
fn test_drop_after_failed_close_does_not_retry() {
    let (driver, native) = driver_with_mock();
    {
        let mut env = driver.open_env().unwrap();
        env.open_server("orcl").unwrap();
        native.fail_once(Trigger::Detach, Outcome::error(END_OF_FILE));
        assert!(env.close().is_err());
    }
    assert_eq!(native.call_count(&Trigger::Free(HandleKind::Environment)), 1);
}
