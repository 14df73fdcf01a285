use std::fmt::Display;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::future::ready;
use serde_json::Value;

use fluvio_future::test_async;

use pvc_autoscaler::{Controller, FixedClock, PassSummary, StaticUsage, VolumeRef};
use pvc_config::OperatorConfig;
use pvc_metadata_client::{InMemoryClient, InMemoryError, MetadataClient, NameSpace};
use pvc_types::core::pvc::PersistentVolumeClaimSpec;
use pvc_types::scaling::autoscaler::{PvcAutoscalerSpec, PvcAutoscalerStatus};
use pvc_types::scaling::manual_resize::{PvcManualResizeSpec, PvcManualResizeStatus};
use pvc_types::{InputK8Obj, InputObjectMeta, ItemMeta, K8List, K8Meta, K8Obj, Spec, UpdateK8ObjStatus};

const NS: &str = "db";

async fn create_pvc(client: &InMemoryClient, name: &str, size: &str) {
    let spec = PersistentVolumeClaimSpec {
        access_modes: vec!["ReadWriteOnce".to_owned()],
        ..Default::default()
    }
    .with_requested_storage(size);
    client
        .create_item(InputK8Obj::new(spec, InputObjectMeta::named(name, NS)))
        .await
        .expect("pvc should be created");
}

async fn create_autoscaler(client: &InMemoryClient, name: &str, spec: PvcAutoscalerSpec) {
    client
        .create_item(InputK8Obj::new(spec, InputObjectMeta::named(name, NS)))
        .await
        .expect("autoscaler should be created");
}

async fn requested_storage(client: &InMemoryClient, name: &str) -> String {
    let pvc = client
        .retrieve_item::<PersistentVolumeClaimSpec, _>(&ItemMeta::new(name, NS))
        .await
        .expect("pvc");
    pvc.spec.requested_storage().unwrap_or_default().to_owned()
}

async fn autoscaler_status(client: &InMemoryClient, name: &str) -> PvcAutoscalerStatus {
    client
        .retrieve_item::<PvcAutoscalerSpec, _>(&ItemMeta::new(name, NS))
        .await
        .expect("autoscaler")
        .status
}

fn data_scaler() -> PvcAutoscalerSpec {
    PvcAutoscalerSpec {
        pvc_name: Some("data".to_owned()),
        step_size: Some("512Mi".to_owned()),
        max_size: Some("2Gi".to_owned()),
        threshold: Some(80.0),
        ..Default::default()
    }
}

fn config() -> OperatorConfig {
    OperatorConfig {
        namespace: Some(NS.to_owned()),
        ..Default::default()
    }
}

fn start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
}

#[test_async]
async fn test_autoscale_until_max() -> Result<(), anyhow::Error> {
    let client = Arc::new(InMemoryClient::new());
    create_pvc(&client, "data", "1Gi").await;
    create_autoscaler(&client, "data-scaler", data_scaler()).await;

    let usage = StaticUsage::new();
    usage.set(VolumeRef::new(NS, "data"), 85.0);
    let controller =
        Controller::new(client.clone(), usage, config()).with_clock(FixedClock::new(start()));

    let summary = controller.reconcile_autoscalers().await?;
    assert_eq!(
        summary,
        PassSummary {
            scaled: 1,
            ..Default::default()
        }
    );
    assert_eq!(requested_storage(&client, "data").await, "1536Mi");
    assert_eq!(
        autoscaler_status(&client, "data-scaler").await,
        PvcAutoscalerStatus {
            last_scale_time: Some("2025-06-01T10:00:00Z".to_owned()),
            current_size: Some("1536Mi".to_owned()),
            reason: Some("Resized after reaching 85.0% usage".to_owned()),
        }
    );

    // still within the default 300s cooldown
    controller.clock().advance(chrono::Duration::seconds(120));
    let summary = controller.reconcile_autoscalers().await?;
    assert_eq!(summary.unchanged, 1);
    assert_eq!(requested_storage(&client, "data").await, "1536Mi");

    controller.clock().advance(chrono::Duration::seconds(180));
    let summary = controller.reconcile_autoscalers().await?;
    assert_eq!(summary.scaled, 1);
    assert_eq!(requested_storage(&client, "data").await, "2Gi");
    assert_eq!(
        autoscaler_status(&client, "data-scaler").await.last_scale_time.as_deref(),
        Some("2025-06-01T10:05:00Z")
    );

    // next step would exceed maxSize
    controller.clock().advance(chrono::Duration::seconds(600));
    let summary = controller.reconcile_autoscalers().await?;
    assert_eq!(summary.unchanged, 1);
    assert_eq!(requested_storage(&client, "data").await, "2Gi");
    Ok(())
}

#[test_async]
async fn test_pass_counts_each_resource() -> Result<(), anyhow::Error> {
    let client = Arc::new(InMemoryClient::new());
    create_pvc(&client, "data", "1Gi").await;
    create_pvc(&client, "quiet", "1Gi").await;
    create_autoscaler(&client, "a-data", data_scaler()).await;
    create_autoscaler(
        &client,
        "b-quiet",
        PvcAutoscalerSpec {
            pvc_name: Some("quiet".to_owned()),
            ..data_scaler()
        },
    )
    .await;
    create_autoscaler(
        &client,
        "c-fractional",
        PvcAutoscalerSpec {
            step_size: Some("1.5Gi".to_owned()),
            ..data_scaler()
        },
    )
    .await;
    create_autoscaler(
        &client,
        "d-gone",
        PvcAutoscalerSpec {
            pvc_name: Some("gone".to_owned()),
            ..data_scaler()
        },
    )
    .await;
    create_autoscaler(
        &client,
        "e-unnamed",
        PvcAutoscalerSpec {
            pvc_name: None,
            ..data_scaler()
        },
    )
    .await;
    client
        .create_item(InputK8Obj::new(
            data_scaler(),
            InputObjectMeta::named("elsewhere", "logging"),
        ))
        .await?;

    let usage = StaticUsage::new();
    usage.set(VolumeRef::new(NS, "data"), 90.0);
    usage.set(VolumeRef::new(NS, "quiet"), 10.0);
    usage.set(VolumeRef::new(NS, "gone"), 99.0);
    let controller = Controller::new(client.clone(), usage, config());

    let summary = controller.reconcile_autoscalers().await?;
    assert_eq!(
        summary,
        PassSummary {
            scaled: 1,
            unchanged: 2,
            invalid: 1,
            failed: 1,
        }
    );
    assert_eq!(summary.total(), 5);
    assert_eq!(autoscaler_status(&client, "b-quiet").await, PvcAutoscalerStatus::default());
    Ok(())
}

async fn manual_resize(
    client: &InMemoryClient,
    name: &str,
    spec: PvcManualResizeSpec,
) -> K8Obj<PvcManualResizeSpec> {
    client
        .create_item(InputK8Obj::new(spec, InputObjectMeta::named(name, NS)))
        .await
        .expect("manual resize should be created")
}

async fn manual_status(client: &InMemoryClient, name: &str) -> PvcManualResizeStatus {
    client
        .retrieve_item::<PvcManualResizeSpec, _>(&ItemMeta::new(name, NS))
        .await
        .expect("manual resize")
        .status
}

#[test_async]
async fn test_manual_resize() -> Result<(), anyhow::Error> {
    let client = Arc::new(InMemoryClient::new());
    create_pvc(&client, "data", "1Gi").await;
    let controller = Controller::new(client.clone(), StaticUsage::new(), config());

    let grow = manual_resize(
        &client,
        "grow-data",
        PvcManualResizeSpec {
            pvc_name: Some("data".to_owned()),
            new_size: Some("10Gi".to_owned()),
        },
    )
    .await;
    assert_eq!(controller.handle_manual_resize(&grow).await?, None);
    assert_eq!(requested_storage(&client, "data").await, "10Gi");
    assert_eq!(
        manual_status(&client, "grow-data").await,
        PvcManualResizeStatus {
            applied: true,
            message: "resized to 10Gi".to_owned(),
        }
    );

    let missing = manual_resize(
        &client,
        "grow-missing",
        PvcManualResizeSpec {
            pvc_name: Some("missing".to_owned()),
            new_size: Some("5Gi".to_owned()),
        },
    )
    .await;
    assert_eq!(
        controller.handle_manual_resize(&missing).await?,
        Some(Duration::from_secs(60))
    );
    assert_eq!(
        manual_status(&client, "grow-missing").await,
        PvcManualResizeStatus {
            applied: false,
            message: "volume db/missing not found".to_owned(),
        }
    );

    let unnamed = manual_resize(
        &client,
        "grow-unnamed",
        PvcManualResizeSpec {
            pvc_name: None,
            new_size: Some("5Gi".to_owned()),
        },
    )
    .await;
    assert_eq!(controller.handle_manual_resize(&unnamed).await?, None);
    let status = manual_status(&client, "grow-unnamed").await;
    assert!(!status.applied);
    assert_eq!(status.message, "invalid policy: missing pvcName");
    Ok(())
}

#[test_async]
async fn test_manual_resize_keeps_requested_text() -> Result<(), anyhow::Error> {
    let client = Arc::new(InMemoryClient::new());
    create_pvc(&client, "data", "1Gi").await;
    let controller = Controller::new(client.clone(), StaticUsage::new(), config());

    for (name, size) in [("grow-mebibytes", "2048Mi"), ("grow-bare", "20G")] {
        let resize = manual_resize(
            &client,
            name,
            PvcManualResizeSpec {
                pvc_name: Some("data".to_owned()),
                new_size: Some(size.to_owned()),
            },
        )
        .await;
        assert_eq!(controller.handle_manual_resize(&resize).await?, None);
        assert_eq!(requested_storage(&client, "data").await, size);
        assert_eq!(
            manual_status(&client, name).await.message,
            format!("resized to {size}")
        );
    }
    Ok(())
}

/// Serves everything from memory but refuses status writes.
struct StatusRejectingClient {
    inner: InMemoryClient,
}

#[async_trait]
impl MetadataClient for StatusRejectingClient {
    type MetadataClientError = InMemoryError;

    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync,
    {
        self.inner.retrieve_item(metadata).await
    }

    async fn retrieve_items<S, N>(&self, namespace: N) -> Result<K8List<S>, Self::MetadataClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync,
    {
        self.inner.retrieve_items(namespace).await
    }

    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        self.inner.create_item(value).await
    }

    async fn update_status<S>(
        &self,
        _value: &UpdateK8ObjStatus<S>,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
    {
        Err(IoError::new(ErrorKind::ConnectionReset, "status write rejected").into())
    }

    async fn patch_spec<S, M>(
        &self,
        metadata: &M,
        patch: &Value,
    ) -> Result<K8Obj<S>, Self::MetadataClientError>
    where
        S: Spec,
        M: K8Meta + Display + Send + Sync,
    {
        self.inner.patch_spec(metadata, patch).await
    }
}

#[test_async]
async fn test_status_write_fails_after_resize() -> Result<(), anyhow::Error> {
    let client = Arc::new(StatusRejectingClient {
        inner: InMemoryClient::new(),
    });
    create_pvc(&client.inner, "data", "1Gi").await;
    create_autoscaler(&client.inner, "data-scaler", data_scaler()).await;

    let usage = StaticUsage::new();
    usage.set(VolumeRef::new(NS, "data"), 85.0);
    let controller =
        Controller::new(client.clone(), usage, config()).with_clock(FixedClock::new(start()));

    let autoscaler = client
        .inner
        .retrieve_item::<PvcAutoscalerSpec, _>(&ItemMeta::new("data-scaler", NS))
        .await?;
    let err = controller
        .reconcile_autoscaler(&autoscaler)
        .await
        .expect_err("status write");
    assert!(err.to_string().contains("status write rejected"));
    assert_eq!(requested_storage(&client.inner, "data").await, "1536Mi");
    assert_eq!(
        autoscaler_status(&client.inner, "data-scaler").await,
        PvcAutoscalerStatus::default()
    );

    // no lastScaleTime was stored, so the next pass grows again at once
    let summary = controller.reconcile_autoscalers().await?;
    assert_eq!(summary.failed, 1);
    assert_eq!(requested_storage(&client.inner, "data").await, "2Gi");
    Ok(())
}

#[test_async]
async fn test_run_until_shutdown() -> Result<(), anyhow::Error> {
    let client = Arc::new(InMemoryClient::new());
    create_pvc(&client, "data", "1Gi").await;
    create_autoscaler(&client, "data-scaler", data_scaler()).await;

    let usage = StaticUsage::new();
    usage.set(VolumeRef::new(NS, "data"), 95.0);
    let controller = Controller::new(client.clone(), usage, config());

    controller.run_until(ready(())).await;

    assert_eq!(requested_storage(&client, "data").await, "1536Mi");
    Ok(())
}
