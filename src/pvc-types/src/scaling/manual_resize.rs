use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::DefaultHeader;
use crate::Spec;
use crate::Status;
use crate::GROUP;
use crate::V1;

const MANUAL_RESIZE_API: Crd = Crd {
    group: GROUP,
    version: V1,
    names: CrdNames {
        kind: "PvcManualResize",
        plural: "pvcmanualresizes",
        singular: "pvcmanualresize",
    },
};

impl Spec for PvcManualResizeSpec {
    type Status = PvcManualResizeStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &MANUAL_RESIZE_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PvcManualResizeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_size: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PvcManualResizeStatus {
    pub applied: bool,
    pub message: String,
}

impl Status for PvcManualResizeStatus {}
