//! Per-device mutual exclusion.
//!
//! A device's iperf3 port has a single owner at a time, so a directional test
//! holds the locks of both its client and its server for its whole duration.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One lock per inventory index.
#[derive(Debug, Clone)]
pub struct DeviceLocks {
    locks: Vec<Arc<Mutex<()>>>,
}

/// Guards held for the lifetime of one directional test.
#[derive(Debug)]
pub struct PairGuard {
    _first: OwnedMutexGuard<()>,
    _second: OwnedMutexGuard<()>,
}

impl DeviceLocks {
    pub fn new(devices: usize) -> Self {
        Self {
            locks: (0..devices).map(|_| Arc::new(Mutex::new(()))).collect(),
        }
    }

    /// Lock devices `a` and `b` (distinct indices), always in ascending index
    /// order so two tests can never wait on each other.
    pub async fn lock_pair(&self, a: usize, b: usize) -> PairGuard {
        debug_assert_ne!(a, b);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let first = self.locks[lo].clone().lock_owned().await;
        let second = self.locks[hi].clone().lock_owned().await;
        PairGuard {
            _first: first,
            _second: second,
        }
    }
}
