//! Fixed-window admission control.
//!
//! Every request is charged to a partition key (the authenticated identity, or
//! the caller's network origin when there is none). Each partition owns an
//! independent window that admits `permit_limit` requests per `window`.
//! Requests over the limit are rejected immediately; there is no queue.
//!
//! Partitions are created lazily and are not evicted.

use dashmap::DashMap;
use log::*;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// The request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    /// Requests still available to this partition in the current window.
    pub remaining: u32,
}

/// The partition has used up its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// Time left until the partition's window rolls over.
    pub retry_after: Duration,
}

pub struct FixedWindowLimiter {
    permit_limit: u32,
    window: Duration,
    partitions: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(permit_limit: u32, window: Duration) -> Self {
        Self {
            permit_limit,
            window,
            partitions: DashMap::new(),
        }
    }

    /// Charge one request to `partition_key`.
    ///
    /// The rollover check, the limit check and the increment happen while the
    /// partition's entry is locked, so concurrent callers on the same key can
    /// never admit more than `permit_limit` requests between them.
    pub fn try_acquire(&self, partition_key: &str) -> Result<Permit, Rejected> {
        let now = Instant::now();

        let mut window = self
            .partitions
            .entry(partition_key.to_string())
            .or_insert(Window {
                started_at: now,
                count: 0,
            });

        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.permit_limit {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(window.started_at));
            debug!("Admission rejected for partition {partition_key}, retry in {retry_after:?}");
            return Err(Rejected { retry_after });
        }

        window.count += 1;

        Ok(Permit {
            remaining: self.permit_limit - window.count,
        })
    }

    pub fn permit_limit(&self) -> u32 {
        self.permit_limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}
