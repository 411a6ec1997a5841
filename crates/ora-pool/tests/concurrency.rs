//! Object pool concurrency tests.
//!
//! Many threads lease and retire instances at the same time. Every instance
//! carries a unique tag; a tag seen twice while leased means the pool handed
//! the same instance out twice.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use ora_driver_pool::{ObjectPool, PoolConfig, Recycle};
use parking_lot::Mutex;
use proptest::prelude::*;

#[derive(Debug, Default)]
struct Tagged {
    tag: u64,
    leased: bool,
}

impl Recycle for Tagged {
    fn is_reset(&self) -> bool {
        !self.leased
    }
}

#[test]
fn test_concurrent_get_put_never_double_leases() {
    let pool = Arc::new(ObjectPool::<Tagged>::new("tagged", PoolConfig::new().max_idle(16)));
    let next_tag = Arc::new(AtomicU64::new(1));
    let in_use = Arc::new(Mutex::new(HashSet::new()));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let next_tag = Arc::clone(&next_tag);
            let in_use = Arc::clone(&in_use);
            thread::spawn(move || {
                for _ in 0..500 {
                    let mut item = pool.get();
                    if item.tag == 0 {
                        item.tag = next_tag.fetch_add(1, Ordering::Relaxed);
                    }
                    item.leased = true;
                    assert!(in_use.lock().insert(item.tag), "tag {} leased twice", item.tag);

                    assert!(in_use.lock().remove(&item.tag));
                    item.leased = false;
                    pool.put(item);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let status = pool.status();
    assert_eq!(status.created + status.reused, 8 * 500);
    assert!(status.idle <= 16);
    assert!(in_use.lock().is_empty());
}

proptest! {
    #[test]
    fn prop_recycled_instance_keeps_tag(tags in proptest::collection::vec(1u64..1000, 1..32)) {
        let pool = ObjectPool::<Tagged>::new("tagged", PoolConfig::new().max_idle(64));
        for tag in &tags {
            pool.put(Tagged { tag: *tag, leased: false });
        }
        // LIFO: tags come back in reverse order of return.
        for tag in tags.iter().rev() {
            prop_assert_eq!(pool.get().tag, *tag);
        }
        prop_assert_eq!(pool.get().tag, 0);
    }
}
