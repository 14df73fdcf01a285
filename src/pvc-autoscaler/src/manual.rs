use std::time::Duration;

use tracing::{error, info};

use pvc_config::BareUnitPolicy;
use pvc_types::scaling::manual_resize::{PvcManualResizeSpec, PvcManualResizeStatus};

use crate::collaborator::VolumeResizer;
use crate::error::ReconcileError;
use crate::policy::VolumeRef;
use crate::size::StorageQuantity;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Explicit size for one volume, applied without any policy check.
///
/// `new_size_text` is what the claim is patched with. `new_size` only
/// validates it, so a bare unit like `20G` reaches the cluster as `20G`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualResizeRequest {
    pub target: VolumeRef,
    pub new_size: StorageQuantity,
    pub new_size_text: String,
}

impl ManualResizeRequest {
    pub fn new(target: VolumeRef, new_size: StorageQuantity) -> Self {
        Self {
            target,
            new_size,
            new_size_text: new_size.to_string(),
        }
    }

    pub fn from_spec(
        namespace: &str,
        spec: &PvcManualResizeSpec,
        bare_units: BareUnitPolicy,
    ) -> Result<Self, ReconcileError> {
        let name = spec
            .pvc_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ReconcileError::InvalidPolicy("missing pvcName".to_owned()))?;
        let new_size = spec
            .new_size
            .as_deref()
            .filter(|size| !size.is_empty())
            .ok_or_else(|| ReconcileError::InvalidPolicy("missing newSize".to_owned()))?;

        Ok(Self {
            target: VolumeRef::new(namespace, name),
            new_size: StorageQuantity::parse_with(new_size, bare_units)?,
            new_size_text: new_size.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualResizeResult {
    pub applied: bool,
    pub message: String,
}

impl ManualResizeResult {
    pub fn applied(size: &str) -> Self {
        Self {
            applied: true,
            message: format!("resized to {size}"),
        }
    }

    pub fn failed<E: ToString>(err: E) -> Self {
        Self {
            applied: false,
            message: err.to_string(),
        }
    }

    pub fn to_k8(&self) -> PvcManualResizeStatus {
        PvcManualResizeStatus {
            applied: self.applied,
            message: self.message.clone(),
        }
    }
}

/// Result of one attempt, together with the delay after which a failed
/// attempt should run again. The caller records `result` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualResizeOutcome {
    pub result: ManualResizeResult,
    pub retry_after: Option<Duration>,
}

pub struct ManualResizeHandler<V> {
    volumes: V,
    retry_delay: Duration,
}

impl<V> ManualResizeHandler<V> {
    pub fn new(volumes: V) -> Self {
        Self {
            volumes,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn volumes(&self) -> &V {
        &self.volumes
    }
}

impl<V> ManualResizeHandler<V>
where
    V: VolumeResizer,
{
    pub async fn handle(&self, request: &ManualResizeRequest) -> ManualResizeOutcome {
        info!(
            volume = %request.target,
            size = %request.new_size_text,
            "manual resize requested"
        );

        match self
            .volumes
            .resize_volume(&request.target, &request.new_size_text)
            .await
        {
            Ok(()) => ManualResizeOutcome {
                result: ManualResizeResult::applied(&request.new_size_text),
                retry_after: None,
            },
            Err(err) => {
                error!(
                    volume = %request.target,
                    retry_secs = self.retry_delay.as_secs(),
                    "manual resize failed: {}",
                    err
                );
                ManualResizeOutcome {
                    result: ManualResizeResult::failed(err),
                    retry_after: Some(self.retry_delay),
                }
            }
        }
    }
}
