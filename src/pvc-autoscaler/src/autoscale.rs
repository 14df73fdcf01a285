//! Usage-driven scale-up decision.
//!
//! ```text
//! disabled                         -> unchanged
//! missing pvcName/stepSize/maxSize -> unchanged (warn)
//! now - lastScaleTime < cooldown   -> unchanged
//! usage unknown                    -> unchanged (warn)
//! usage < threshold                -> unchanged
//! next = current + step
//! next > max                       -> unchanged
//! resize(next)                     -> new status
//! ```
//!
//! Each check runs before the collaborator call the next one needs, so a
//! disabled or cooling-down volume costs no cluster or metrics request.

use std::time::Duration;

use chrono::SubsecRound;
use tracing::{debug, info, warn};

use crate::collaborator::{Clock, SystemClock, UsageSource, VolumeResizer, VolumeSizeReader};
use crate::error::ReconcileError;
use crate::policy::{AutoscalePolicy, AutoscaleStatus};
use crate::size::StorageQuantity;

/// Why a reconcile left the status untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Disabled,
    MissingConfig,
    Cooldown { remaining: Duration },
    UsageUnknown,
    BelowThreshold { usage_percent: f64 },
    MaxSizeReached { next_size: StorageQuantity },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutoscaleOutcome {
    /// volume was resized; the status must be persisted
    Scaled(AutoscaleStatus),
    Unchanged(SkipReason),
}

impl AutoscaleOutcome {
    pub fn status(&self) -> Option<&AutoscaleStatus> {
        match self {
            Self::Scaled(status) => Some(status),
            Self::Unchanged(_) => None,
        }
    }

    pub fn is_scaled(&self) -> bool {
        matches!(self, Self::Scaled(_))
    }
}

pub struct AutoscaleReconciler<V, U, K = SystemClock> {
    volumes: V,
    usage: U,
    clock: K,
}

impl<V, U> AutoscaleReconciler<V, U, SystemClock> {
    pub fn new(volumes: V, usage: U) -> Self {
        Self {
            volumes,
            usage,
            clock: SystemClock,
        }
    }
}

impl<V, U, K> AutoscaleReconciler<V, U, K> {
    pub fn with_clock<K2>(self, clock: K2) -> AutoscaleReconciler<V, U, K2> {
        AutoscaleReconciler {
            volumes: self.volumes,
            usage: self.usage,
            clock,
        }
    }

    pub fn volumes(&self) -> &V {
        &self.volumes
    }

    pub fn usage(&self) -> &U {
        &self.usage
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}

impl<V, U, K> AutoscaleReconciler<V, U, K>
where
    V: VolumeSizeReader + VolumeResizer,
    U: UsageSource,
    K: Clock,
{
    /// Decide whether the volume under `policy` should grow, and grow it.
    ///
    /// Returns `Unchanged` for every non-fatal stop. Only a failed size read
    /// or resize is an error.
    pub async fn reconcile(
        &self,
        policy: &AutoscalePolicy,
        status: Option<&AutoscaleStatus>,
    ) -> Result<AutoscaleOutcome, ReconcileError> {
        if !policy.enabled {
            debug!(volume = ?policy.target, "autoscaling disabled");
            return Ok(AutoscaleOutcome::Unchanged(SkipReason::Disabled));
        }

        let (target, step_size, max_size) =
            match (&policy.target, policy.step_size, policy.max_size) {
                (Some(target), Some(step_size), Some(max_size)) => (target, step_size, max_size),
                _ => {
                    warn!(volume = ?policy.target, "missing pvcName, stepSize or maxSize");
                    return Ok(AutoscaleOutcome::Unchanged(SkipReason::MissingConfig));
                }
            };

        let now = self.clock.now();
        if let Some(last_scale_time) = status.and_then(|status| status.last_scale_time) {
            // a timestamp ahead of the clock counts as no time elapsed
            let elapsed = now
                .signed_duration_since(last_scale_time)
                .to_std()
                .unwrap_or_default();
            if elapsed < policy.cooldown {
                let remaining = policy.cooldown - elapsed;
                info!(
                    volume = %target,
                    remaining_secs = remaining.as_secs(),
                    "cooldown in effect"
                );
                return Ok(AutoscaleOutcome::Unchanged(SkipReason::Cooldown { remaining }));
            }
        }

        let usage_percent = match self.usage.fetch_usage(target).await {
            Some(usage) if usage.is_finite() => usage,
            _ => {
                warn!(volume = %target, "could not determine usage");
                return Ok(AutoscaleOutcome::Unchanged(SkipReason::UsageUnknown));
            }
        };
        info!(volume = %target, "usage is at {:.1}%", usage_percent);

        if usage_percent < policy.threshold_percent {
            debug!(
                volume = %target,
                threshold = policy.threshold_percent,
                "no action needed"
            );
            return Ok(AutoscaleOutcome::Unchanged(SkipReason::BelowThreshold {
                usage_percent,
            }));
        }

        let current_size = self
            .volumes
            .read_volume_size(target)
            .await
            .map_err(|source| ReconcileError::ReadSize {
                volume: target.clone(),
                source,
            })?;
        let next_size = current_size.add(step_size);

        if !next_size.less_or_equal(max_size) {
            info!(
                volume = %target,
                current = %current_size,
                next = %next_size,
                max = %max_size,
                "max size reached, no resize"
            );
            return Ok(AutoscaleOutcome::Unchanged(SkipReason::MaxSizeReached {
                next_size,
            }));
        }

        self.volumes
            .resize_volume(target, &next_size.to_string())
            .await
            .map_err(|source| ReconcileError::Resize {
                volume: target.clone(),
                size: next_size,
                source,
            })?;

        info!(volume = %target, from = %current_size, to = %next_size, "volume resized");

        Ok(AutoscaleOutcome::Scaled(AutoscaleStatus {
            last_scale_time: Some(now.trunc_subsecs(0)),
            current_size: Some(next_size),
            reason: format!("Resized after reaching {usage_percent:.1}% usage"),
        }))
    }
}
