//! Identity and pooling tests.
//!
//! Ids are unique among the open children of one parent, even though the
//! bodies carrying them move between parents through driver-wide pools.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;

use ora_client::{ConnectionKey, DriverConfig, Environment, PoolConfig, ServerKey};
use ora_testing::fixtures::{DATABASE_CONNECT, driver_with_config, driver_with_mock};
use proptest::prelude::*;

#[test]
fn test_pool_round_trip_keeps_identity() {
    let (driver, _native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();

    let first = env.open_server("orcl").unwrap();
    env.close_server(first).unwrap();
    assert_eq!(driver.pool_status().servers.idle, 1);

    // Same body, same parent: the id comes back with it.
    let second = env.open_server("orcl").unwrap();
    assert_eq!(second.id(), first.id());
    assert_eq!(driver.pool_status().servers.reused, 1);
    assert_ne!(second, first, "the key itself is fresh");
}

#[test]
fn test_body_from_other_env_gets_fresh_id() {
    let (driver, _native) = driver_with_mock();
    let mut first = driver.open_env().unwrap();
    let mut second = driver.open_env().unwrap();

    let a = first.open_server("orcl").unwrap();
    assert_eq!(a.id(), 1);
    let b = second.open_server("orcl").unwrap();
    assert_eq!(b.id(), 1);
    first.close_server(a).unwrap();

    // The pooled body carries id 1 issued by `first`; `second` already has an
    // open server 1, so the body must not keep its id there.
    let c = second.open_server("orcl").unwrap();
    assert_eq!(c.id(), 2);
    assert_eq!(driver.pool_status().servers.reused, 1);
}

#[test]
fn test_environment_body_reused_with_identity() {
    let (driver, _native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    let id = env.id();
    env.close().unwrap();

    let env = driver.open_env().unwrap();
    assert_eq!(env.id(), id);
    assert_eq!(driver.pool_status().environments.reused, 1);
}

#[test]
fn test_pooled_bodies_are_reset() {
    let (driver, _native) = driver_with_mock();
    let mut env = driver.open_env().unwrap();
    env.open_connection(DATABASE_CONNECT).unwrap();
    env.close().unwrap();

    let status = driver.pool_status();
    assert_eq!(status.connections.idle, 1);
    assert_eq!(status.servers.idle, 1);
    assert_eq!(status.sessions.idle, 1);
    assert_eq!(status.environments.idle, 1);
    assert_eq!(status.servers.discarded, 0);

    // A recycled environment starts empty.
    let env = driver.open_env().unwrap();
    assert_eq!(env.num_servers().unwrap(), 0);
    assert_eq!(env.num_connections().unwrap(), 0);
}

#[test]
fn test_pool_idle_cap() {
    let config = DriverConfig::new().pool(PoolConfig::new().max_idle(2));
    let (driver, _native) = driver_with_config(config).unwrap();
    let mut env = driver.open_env().unwrap();
    for _ in 0..5 {
        env.open_server("orcl").unwrap();
    }
    env.close().unwrap();

    let servers = driver.pool_status().servers;
    assert_eq!(servers.idle, 2);
    assert_eq!(servers.discarded, 3);
}

#[test]
fn test_driver_is_shared_across_threads() {
    let (driver, native) = driver_with_mock();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let driver = driver.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let mut env = driver.open_env().unwrap();
                    env.open_connection(DATABASE_CONNECT).unwrap();
                    env.close().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(driver.num_env(), 0);
    assert_eq!(native.live_count(), 0);
}

#[derive(Debug, Clone)]
enum Op {
    OpenServer,
    OpenConnection,
    CloseServer(usize),
    CloseConnection(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::OpenServer),
        Just(Op::OpenConnection),
        any::<usize>().prop_map(Op::CloseServer),
        any::<usize>().prop_map(Op::CloseConnection),
    ]
}

fn assert_unique_ids(env: &Environment) {
    let ids: Vec<u64> = env.servers().unwrap().map(|server| server.id()).collect();
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate server ids: {ids:?}");
}

proptest! {
    #[test]
    fn prop_open_ids_unique_under_churn(ops in prop::collection::vec(op(), 1..60)) {
        let (driver, native) = driver_with_mock();
        let mut env = driver.open_env().unwrap();
        // A second environment shares the pools and competes for bodies.
        let mut other = driver.open_env().unwrap();
        let mut servers: Vec<ServerKey> = Vec::new();
        let mut connections: Vec<ConnectionKey> = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::OpenServer => servers.push(env.open_server("orcl").unwrap()),
                Op::OpenConnection => {
                    connections.push(env.open_connection(DATABASE_CONNECT).unwrap());
                }
                Op::CloseServer(i) if !servers.is_empty() => {
                    let key = servers.swap_remove(i % servers.len());
                    env.close_server(key).unwrap();
                }
                Op::CloseConnection(i) if !connections.is_empty() => {
                    let key = connections.swap_remove(i % connections.len());
                    env.close_connection(key).unwrap();
                }
                _ => {}
            }
            if step % 3 == 0 {
                let key = other.open_server("other").unwrap();
                other.close_server(key).unwrap();
            }

            assert_unique_ids(&env);
            let conn_ids: HashSet<u64> = connections.iter().map(|key| key.id()).collect();
            prop_assert_eq!(conn_ids.len(), connections.len());
            prop_assert_eq!(env.num_servers().unwrap(), servers.len() + connections.len());
            prop_assert_eq!(env.num_connections().unwrap(), connections.len());
        }

        env.close().unwrap();
        other.close().unwrap();
        prop_assert_eq!(native.live_count(), 0);
    }
}
