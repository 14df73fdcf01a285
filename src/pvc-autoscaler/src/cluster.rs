//! Volume reads and resizes through a [`MetadataClient`].

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, trace};

use pvc_config::BareUnitPolicy;
use pvc_metadata_client::{MetadataClient, MetadataClientError, SharedClient};
use pvc_types::core::pvc::{PersistentVolumeClaimSpec, STORAGE};

use crate::collaborator::{VolumeResizer, VolumeSizeReader};
use crate::error::VolumeError;
use crate::policy::VolumeRef;
use crate::size::StorageQuantity;

pub struct ClusterVolumes<C> {
    client: SharedClient<C>,
    bare_units: BareUnitPolicy,
}

impl<C> Clone for ClusterVolumes<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            bare_units: self.bare_units,
        }
    }
}

impl<C> ClusterVolumes<C> {
    pub fn new(client: SharedClient<C>) -> Self {
        Self {
            client,
            bare_units: BareUnitPolicy::default(),
        }
    }

    /// how bare `M`/`G`/`T` units in claim requests are read
    pub fn with_bare_units(mut self, bare_units: BareUnitPolicy) -> Self {
        self.bare_units = bare_units;
        self
    }

    pub fn client(&self) -> &SharedClient<C> {
        &self.client
    }
}

fn client_error<E>(target: &VolumeRef, err: E) -> VolumeError
where
    E: MetadataClientError,
{
    if err.not_founded() {
        VolumeError::NotFound(target.clone())
    } else {
        VolumeError::Client(Box::new(err))
    }
}

#[async_trait]
impl<C> VolumeSizeReader for ClusterVolumes<C>
where
    C: MetadataClient,
{
    async fn read_volume_size(&self, target: &VolumeRef) -> Result<StorageQuantity, VolumeError> {
        let pvc = self
            .client
            .retrieve_item::<PersistentVolumeClaimSpec, _>(&target.as_item())
            .await
            .map_err(|err| client_error(target, err))?;

        let requested = pvc
            .spec
            .requested_storage()
            .ok_or_else(|| VolumeError::MissingStorageRequest(target.clone()))?;
        trace!(volume = %target, requested, "read storage request");

        Ok(StorageQuantity::parse_with(requested, self.bare_units)?)
    }
}

#[async_trait]
impl<C> VolumeResizer for ClusterVolumes<C>
where
    C: MetadataClient,
{
    async fn resize_volume(&self, target: &VolumeRef, size: &str) -> Result<(), VolumeError> {
        let patch = json!({
            "spec": {
                "resources": {
                    "requests": {
                        STORAGE: size
                    }
                }
            }
        });
        debug!(volume = %target, size, "patching storage request");

        self.client
            .patch_spec::<PersistentVolumeClaimSpec, _>(&target.as_item(), &patch)
            .await
            .map_err(|err| client_error(target, err))?;

        Ok(())
    }
}
