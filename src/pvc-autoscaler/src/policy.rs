use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use pvc_config::{BareUnitPolicy, OperatorConfig};
use pvc_types::scaling::autoscaler::{PvcAutoscalerSpec, PvcAutoscalerStatus};
use pvc_types::ItemMeta;

use crate::error::{ReconcileError, SizeError};
use crate::size::StorageQuantity;

/// wire format of `lastScaleTime`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A persistent volume claim, addressed by namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeRef {
    pub namespace: String,
    pub name: String,
}

impl VolumeRef {
    pub fn new<S: Into<String>>(namespace: S, name: S) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn as_item(&self) -> ItemMeta {
        ItemMeta::new(self.name.as_str(), self.namespace.as_str())
    }
}

impl fmt::Display for VolumeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Scaling policy for one volume, fixed for the duration of a reconcile.
///
/// `target`, `step_size` and `max_size` stay optional here: a policy missing
/// any of them is a misconfiguration the reconciler reports, not a
/// conversion failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoscalePolicy {
    pub target: Option<VolumeRef>,
    pub step_size: Option<StorageQuantity>,
    pub max_size: Option<StorageQuantity>,
    pub threshold_percent: f64,
    pub cooldown: Duration,
    pub enabled: bool,
}

impl AutoscalePolicy {
    pub const DEFAULT_THRESHOLD_PERCENT: f64 = 75.0;
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

    pub fn new(target: VolumeRef, step_size: StorageQuantity, max_size: StorageQuantity) -> Self {
        Self {
            target: Some(target),
            step_size: Some(step_size),
            max_size: Some(max_size),
            threshold_percent: Self::DEFAULT_THRESHOLD_PERCENT,
            cooldown: Self::DEFAULT_COOLDOWN,
            enabled: true,
        }
    }

    pub fn with_threshold(mut self, threshold_percent: f64) -> Self {
        self.threshold_percent = threshold_percent;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Convert an autoscaler resource living in `namespace`.
    ///
    /// Absent fields take the operator defaults. Sizes that are present but
    /// malformed, and thresholds outside `[0, 100]`, are rejected.
    pub fn from_spec(
        namespace: &str,
        spec: &PvcAutoscalerSpec,
        config: &OperatorConfig,
    ) -> Result<Self, ReconcileError> {
        let threshold_percent = spec
            .threshold
            .unwrap_or(config.autoscale.threshold_percent);
        if !(0.0..=100.0).contains(&threshold_percent) {
            return Err(ReconcileError::InvalidPolicy(format!(
                "threshold must be between 0 and 100, got {threshold_percent}"
            )));
        }

        Ok(Self {
            target: non_empty(&spec.pvc_name).map(|name| VolumeRef::new(namespace, name)),
            step_size: optional_size(&spec.step_size, config.bare_units)?,
            max_size: optional_size(&spec.max_size, config.bare_units)?,
            threshold_percent,
            cooldown: Duration::from_secs(
                spec.cooldown.unwrap_or(config.autoscale.cooldown_seconds),
            ),
            enabled: spec.enabled.unwrap_or(true),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn optional_size(
    value: &Option<String>,
    bare_units: BareUnitPolicy,
) -> Result<Option<StorageQuantity>, SizeError> {
    non_empty(value)
        .map(|size| StorageQuantity::parse_with(size, bare_units))
        .transpose()
}

/// Outcome of the last scale-up, persisted between reconciles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoscaleStatus {
    pub last_scale_time: Option<DateTime<Utc>>,
    pub current_size: Option<StorageQuantity>,
    pub reason: String,
}

impl AutoscaleStatus {
    pub fn from_k8(status: &PvcAutoscalerStatus) -> Result<Self, ReconcileError> {
        let last_scale_time = match non_empty(&status.last_scale_time) {
            Some(text) => Some(parse_timestamp(text)?),
            None => None,
        };
        let current_size = optional_size(&status.current_size, BareUnitPolicy::Alias)?;

        Ok(Self {
            last_scale_time,
            current_size,
            reason: status.reason.clone().unwrap_or_default(),
        })
    }

    pub fn to_k8(&self) -> PvcAutoscalerStatus {
        PvcAutoscalerStatus {
            last_scale_time: self
                .last_scale_time
                .map(|time| time.format(TIMESTAMP_FORMAT).to_string()),
            current_size: self.current_size.map(|size| size.to_string()),
            reason: Some(self.reason.clone()).filter(|reason| !reason.is_empty()),
        }
    }
}

/// parse `YYYY-MM-DDTHH:MM:SSZ`, falling back to any RFC 3339 timestamp
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ReconcileError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|time| time.with_timezone(&Utc)))
        .map_err(|_| ReconcileError::InvalidTimestamp(text.to_owned()))
}
