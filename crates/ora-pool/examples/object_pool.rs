//! Object pool example.
//!
//! Leases a handful of instances, retires them, and prints the pool
//! counters so the reuse is visible.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=trace cargo run -p ora-driver-pool --example object_pool
//! ```

use ora_driver_pool::{ObjectPool, PoolConfig, Recycle};

#[derive(Debug, Default)]
struct Scratch {
    id: u64,
    buffer: Vec<u8>,
}

impl Recycle for Scratch {
    fn is_reset(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let pool = ObjectPool::<Scratch>::with_config("scratch", PoolConfig::new().max_idle(4))?;

    let mut next_id = 0;
    for round in 0..3 {
        let mut leased: Vec<Scratch> = (0..3).map(|_| pool.get()).collect();
        for item in &mut leased {
            if item.id == 0 {
                next_id += 1;
                item.id = next_id;
            }
            item.buffer.extend_from_slice(b"work");
        }
        println!("round {round}: ids {:?}", leased.iter().map(|s| s.id).collect::<Vec<_>>());

        for mut item in leased {
            item.buffer.clear();
            pool.put(item);
        }
    }

    let status = pool.status();
    println!("created {}, reused {}, idle {}", status.created, status.reused, status.idle);
    Ok(())
}
