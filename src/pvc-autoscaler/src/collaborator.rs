//! Interfaces the engine calls out through.
//!
//! Every blocking operation lives behind one of these traits; the decision
//! logic never talks to the cluster or the metrics backend directly.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::VolumeError;
use crate::policy::VolumeRef;
use crate::size::StorageQuantity;

#[async_trait]
pub trait VolumeResizer: Send + Sync {
    /// set the requested storage of `target` to `size`, written as given
    async fn resize_volume(&self, target: &VolumeRef, size: &str) -> Result<(), VolumeError>;
}

#[async_trait]
pub trait VolumeSizeReader: Send + Sync {
    /// currently requested storage of `target`
    async fn read_volume_size(&self, target: &VolumeRef) -> Result<StorageQuantity, VolumeError>;
}

#[async_trait]
pub trait UsageSource: Send + Sync {
    /// used capacity of `target` in percent, `None` if unknown
    async fn fetch_usage(&self, target: &VolumeRef) -> Option<f64>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let now = self.now();
        self.set(now + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
