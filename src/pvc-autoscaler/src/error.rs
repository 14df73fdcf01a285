use thiserror::Error;

use crate::policy::VolumeRef;
use crate::size::StorageQuantity;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("unsupported size format: '{0}'")]
    InvalidSizeFormat(String),
    #[error("bare unit in '{0}' is not allowed, use Mi, Gi or Ti")]
    BareUnitRejected(String),
}

/// Failure to read a kubelet metrics scrape.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("unreadable volume stats: {0}")]
    Parse(#[from] std::io::Error),
}

/// Failure of a cluster read or write for one volume.
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("volume {0} not found")]
    NotFound(VolumeRef),
    #[error("volume {0} has no storage request")]
    MissingStorageRequest(VolumeRef),
    #[error(transparent)]
    Size(#[from] SizeError),
    #[error("cluster request failed: {0}")]
    Client(#[source] BoxError),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Size(#[from] SizeError),
    #[error("reading size of {volume} failed: {source}")]
    ReadSize {
        volume: VolumeRef,
        #[source]
        source: VolumeError,
    },
    #[error("resizing {volume} to {size} failed: {source}")]
    Resize {
        volume: VolumeRef,
        size: StorageQuantity,
        #[source]
        source: VolumeError,
    },
    #[error("invalid lastScaleTime '{0}'")]
    InvalidTimestamp(String),
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}
