use serde::Deserialize;
use serde::Serialize;

use crate::Crd;
use crate::CrdNames;
use crate::DefaultHeader;
use crate::Spec;
use crate::Status;
use crate::GROUP;
use crate::V1;

const AUTOSCALER_API: Crd = Crd {
    group: GROUP,
    version: V1,
    names: CrdNames {
        kind: "PvcAutoscaler",
        plural: "pvcautoscalers",
        singular: "pvcautoscaler",
    },
};

impl Spec for PvcAutoscalerSpec {
    type Status = PvcAutoscalerStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &AUTOSCALER_API
    }
}

/// Autoscaling policy for a single claim in the same namespace.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PvcAutoscalerSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<String>,
    /// usage percent that triggers a step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// seconds between two scale events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PvcAutoscalerStatus {
    /// `YYYY-MM-DDTHH:MM:SSZ`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scale_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Status for PvcAutoscalerStatus {}

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::PvcAutoscalerSpec;
    use super::PvcAutoscalerStatus;
    use crate::K8Obj;
    use crate::Spec;

    #[test]
    fn test_api_version() {
        assert_eq!(PvcAutoscalerSpec::api_version(), "scaling.volumania.io/v1");
        assert_eq!(PvcAutoscalerSpec::kind(), "PvcAutoscaler");
    }

    #[test]
    fn test_decode_partial_spec() {
        let value = json!({
            "metadata": { "name": "db-data", "namespace": "db" },
            "spec": { "pvcName": "data-db-0", "stepSize": "5Gi", "maxSize": "50Gi" }
        });

        let obj: K8Obj<PvcAutoscalerSpec> = serde_json::from_value(value).expect("decode");
        assert_eq!(obj.kind, "PvcAutoscaler");
        assert_eq!(obj.spec.pvc_name.as_deref(), Some("data-db-0"));
        assert_eq!(obj.spec.threshold, None);
        assert_eq!(obj.spec.enabled, None);
        assert_eq!(obj.status, PvcAutoscalerStatus::default());
    }

    #[test]
    fn test_status_omits_absent_fields() {
        let status = PvcAutoscalerStatus {
            current_size: Some("2Gi".to_owned()),
            ..Default::default()
        };
        let value = serde_json::to_value(&status).expect("encode");
        assert_eq!(value, json!({ "currentSize": "2Gi" }));
    }
}
