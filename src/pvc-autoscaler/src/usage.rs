//! Usage percentages per volume.
//!
//! [`StaticUsage`] holds values pushed by the caller. [`VolumeStatsSnapshot`]
//! derives them from the kubelet volume stats metrics, in Prometheus text
//! exposition format, as scraped from one or more nodes.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use prometheus_parse::{Scrape, Value};
use tracing::{debug, trace};

use crate::collaborator::UsageSource;
use crate::error::StatsError;
use crate::policy::VolumeRef;

#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub target: VolumeRef,
    pub usage_percent: f64,
}

impl UsageSample {
    pub fn new(target: VolumeRef, usage_percent: f64) -> Self {
        Self {
            target,
            usage_percent,
        }
    }
}

#[derive(Debug, Default)]
pub struct StaticUsage {
    samples: RwLock<HashMap<VolumeRef, f64>>,
}

impl StaticUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = UsageSample>,
    {
        let usage = Self::new();
        for sample in samples {
            usage.set(sample.target, sample.usage_percent);
        }
        usage
    }

    pub fn set(&self, target: VolumeRef, usage_percent: f64) {
        match self.samples.write() {
            Ok(mut samples) => samples.insert(target, usage_percent),
            Err(poisoned) => poisoned.into_inner().insert(target, usage_percent),
        };
    }

    pub fn remove(&self, target: &VolumeRef) -> Option<f64> {
        match self.samples.write() {
            Ok(mut samples) => samples.remove(target),
            Err(poisoned) => poisoned.into_inner().remove(target),
        }
    }

    pub fn get(&self, target: &VolumeRef) -> Option<f64> {
        match self.samples.read() {
            Ok(samples) => samples.get(target).copied(),
            Err(poisoned) => poisoned.into_inner().get(target).copied(),
        }
    }
}

#[async_trait]
impl UsageSource for StaticUsage {
    async fn fetch_usage(&self, target: &VolumeRef) -> Option<f64> {
        self.get(target)
    }
}

pub const USED_BYTES: &str = "kubelet_volume_stats_used_bytes";
pub const CAPACITY_BYTES: &str = "kubelet_volume_stats_capacity_bytes";

const NAMESPACE_LABEL: &str = "namespace";
const CLAIM_LABEL: &str = "persistentvolumeclaim";

fn sample_value(value: &Value) -> Option<f64> {
    match value {
        Value::Counter(v) | Value::Gauge(v) | Value::Untyped(v) => Some(*v),
        _ => None,
    }
}

/// Used and capacity bytes per claim from kubelet metrics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VolumeStatsSnapshot {
    used: BTreeMap<VolumeRef, f64>,
    capacity: BTreeMap<VolumeRef, f64>,
}

impl VolumeStatsSnapshot {
    /// Parse one scrape. Samples of other metrics, or without both claim
    /// labels, are skipped.
    pub fn parse(text: &str) -> Result<Self, StatsError> {
        let lines = text.lines().map(|line| Ok(line.to_owned()));
        let scrape = Scrape::parse(lines)?;

        let mut snapshot = Self::default();
        for sample in scrape.samples {
            let table = match sample.metric.as_str() {
                USED_BYTES => &mut snapshot.used,
                CAPACITY_BYTES => &mut snapshot.capacity,
                _ => continue,
            };
            let namespace = sample.labels.get(NAMESPACE_LABEL);
            let claim = sample.labels.get(CLAIM_LABEL);
            match (namespace, claim, sample_value(&sample.value)) {
                (Some(namespace), Some(claim), Some(value)) if value.is_finite() => {
                    table.insert(VolumeRef::new(namespace, claim), value);
                }
                _ => trace!(metric = %sample.metric, ?namespace, ?claim, "skipping sample"),
            }
        }
        debug!(
            used = snapshot.used.len(),
            capacity = snapshot.capacity.len(),
            "parsed volume stats"
        );
        Ok(snapshot)
    }

    /// fold in a scrape from another node, its values win on conflict
    pub fn merge(&mut self, other: VolumeStatsSnapshot) {
        self.used.extend(other.used);
        self.capacity.extend(other.capacity);
    }

    /// `used / capacity * 100`, `None` without both values or with zero capacity
    pub fn usage(&self, target: &VolumeRef) -> Option<f64> {
        let used = self.used.get(target)?;
        let capacity = self.capacity.get(target)?;
        if *capacity <= 0.0 {
            return None;
        }
        Some(used / capacity * 100.0)
    }

    pub fn samples(&self) -> Vec<UsageSample> {
        self.used
            .keys()
            .filter_map(|target| {
                self.usage(target)
                    .map(|usage| UsageSample::new(target.clone(), usage))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty() && self.capacity.is_empty()
    }
}

#[async_trait]
impl UsageSource for VolumeStatsSnapshot {
    async fn fetch_usage(&self, target: &VolumeRef) -> Option<f64> {
        self.usage(target)
    }
}
