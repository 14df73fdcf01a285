use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::DefaultHeader;
use crate::Spec;
use crate::Status;

/// key of the storage entry in resource requests and capacity
pub const STORAGE: &str = "storage";

const PVC_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "PersistentVolumeClaim",
        plural: "persistentvolumeclaims",
        singular: "persistentvolumeclaim",
    },
};

impl Spec for PersistentVolumeClaimSpec {
    type Status = PersistentVolumeClaimStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &PVC_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeClaimSpec {
    pub access_modes: Vec<String>,
    pub resources: ResourceRequirements,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
}

impl PersistentVolumeClaimSpec {
    /// requested storage, as written in the claim (e.g. `10Gi`)
    pub fn requested_storage(&self) -> Option<&str> {
        self.resources.requests.get(STORAGE).map(|s| s.as_str())
    }

    pub fn with_requested_storage<S: Into<String>>(mut self, size: S) -> Self {
        self.resources.requests.insert(STORAGE.to_owned(), size.into());
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceRequirements {
    pub requests: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentVolumeClaimStatus {
    pub phase: Option<String>,
    pub capacity: BTreeMap<String, String>,
}

impl Status for PersistentVolumeClaimStatus {}
