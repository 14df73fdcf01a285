//! Reconciliation engine for PersistentVolumeClaim autoscaling.
//!
//! Two entry points share the size arithmetic in [`size`]:
//!
//! * [`AutoscaleReconciler`] grows a claim by a fixed step once usage crosses
//!   the policy threshold, bounded by a maximum size and a cooldown.
//! * [`ManualResizeHandler`] applies an explicit size unconditionally and asks
//!   the caller to retry on failure.
//!
//! Cluster reads and writes, usage lookups and the clock are injected through
//! the traits in [`collaborator`], so both entry points can run against the
//! in-memory client or test doubles.

pub mod autoscale;
pub mod cluster;
pub mod collaborator;
pub mod controller;
pub mod manual;
pub mod policy;
pub mod size;
pub mod usage;

mod error;

pub use autoscale::{AutoscaleOutcome, AutoscaleReconciler, SkipReason};
pub use cluster::ClusterVolumes;
pub use collaborator::{Clock, FixedClock, SystemClock, UsageSource, VolumeResizer, VolumeSizeReader};
pub use controller::{Controller, PassSummary};
pub use error::{ReconcileError, SizeError, StatsError, VolumeError};
pub use manual::{ManualResizeHandler, ManualResizeOutcome, ManualResizeRequest, ManualResizeResult};
pub use policy::{AutoscalePolicy, AutoscaleStatus, VolumeRef};
pub use size::StorageQuantity;
pub use usage::{StaticUsage, UsageSample, VolumeStatsSnapshot};
