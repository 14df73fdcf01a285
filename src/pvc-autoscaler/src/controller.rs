//! Binds the engine to `PvcAutoscaler` and `PvcManualResize` resources.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::future::{select, Either};
use futures_util::pin_mut;
use tracing::{debug, error, info, warn};

use fluvio_future::timer::sleep;

use pvc_config::OperatorConfig;
use pvc_metadata_client::{MetadataClient, NameSpace, SharedClient};
use pvc_types::scaling::autoscaler::PvcAutoscalerSpec;
use pvc_types::scaling::manual_resize::PvcManualResizeSpec;
use pvc_types::K8Obj;

use crate::autoscale::{AutoscaleOutcome, AutoscaleReconciler};
use crate::cluster::ClusterVolumes;
use crate::collaborator::{Clock, SystemClock, UsageSource};
use crate::error::ReconcileError;
use crate::manual::{ManualResizeHandler, ManualResizeOutcome, ManualResizeRequest, ManualResizeResult};
use crate::policy::{AutoscalePolicy, AutoscaleStatus};

/// Counts for one pass over all autoscalers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub scaled: usize,
    pub unchanged: usize,
    /// resources that could not be converted into a policy
    pub invalid: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn total(&self) -> usize {
        self.scaled + self.unchanged + self.invalid + self.failed
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scaled: {}, unchanged: {}, invalid: {}, failed: {}",
            self.scaled, self.unchanged, self.invalid, self.failed
        )
    }
}

fn is_invalid(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ReconcileError>(),
        Some(ReconcileError::Size(_))
            | Some(ReconcileError::InvalidTimestamp(_))
            | Some(ReconcileError::InvalidPolicy(_))
    )
}

pub struct Controller<C, U, K = SystemClock> {
    client: SharedClient<C>,
    config: OperatorConfig,
    autoscaler: AutoscaleReconciler<ClusterVolumes<C>, U, K>,
    manual: ManualResizeHandler<ClusterVolumes<C>>,
}

impl<C, U> Controller<C, U, SystemClock> {
    pub fn new(client: SharedClient<C>, usage: U, config: OperatorConfig) -> Self {
        let volumes = ClusterVolumes::new(client.clone()).with_bare_units(config.bare_units);
        Self {
            autoscaler: AutoscaleReconciler::new(volumes.clone(), usage),
            manual: ManualResizeHandler::new(volumes).with_retry_delay(config.retry_delay()),
            client,
            config,
        }
    }
}

impl<C, U, K> Controller<C, U, K> {
    pub fn with_clock<K2>(self, clock: K2) -> Controller<C, U, K2> {
        Controller {
            client: self.client,
            config: self.config,
            autoscaler: self.autoscaler.with_clock(clock),
            manual: self.manual,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn usage(&self) -> &U {
        self.autoscaler.usage()
    }

    pub fn clock(&self) -> &K {
        self.autoscaler.clock()
    }
}

impl<C, U, K> Controller<C, U, K>
where
    C: MetadataClient,
    U: UsageSource,
    K: Clock,
{
    /// Reconcile every autoscaler in the watched namespace once.
    ///
    /// Only a failed listing aborts the pass. Faults on single resources are
    /// logged and counted.
    pub async fn reconcile_autoscalers(&self) -> anyhow::Result<PassSummary> {
        let namespace = NameSpace::from(self.config.namespace.clone());
        let autoscalers = self
            .client
            .retrieve_items::<PvcAutoscalerSpec, _>(namespace)
            .await?;

        let mut summary = PassSummary::default();
        for autoscaler in &autoscalers.items {
            match self.reconcile_autoscaler(autoscaler).await {
                Ok(AutoscaleOutcome::Scaled(_)) => summary.scaled += 1,
                Ok(AutoscaleOutcome::Unchanged(reason)) => {
                    debug!(resource = %autoscaler.metadata, ?reason, "unchanged");
                    summary.unchanged += 1;
                }
                Err(err) if is_invalid(&err) => {
                    warn!(resource = %autoscaler.metadata, "skipping invalid autoscaler: {}", err);
                    summary.invalid += 1;
                }
                Err(err) => {
                    error!(resource = %autoscaler.metadata, "autoscale failed: {:#}", err);
                    summary.failed += 1;
                }
            }
        }

        info!(%summary, "autoscale pass done");
        Ok(summary)
    }

    /// Reconcile one autoscaler and persist its status if it scaled.
    pub async fn reconcile_autoscaler(
        &self,
        autoscaler: &K8Obj<PvcAutoscalerSpec>,
    ) -> anyhow::Result<AutoscaleOutcome> {
        let namespace = autoscaler.metadata.namespace.as_str();
        let policy = AutoscalePolicy::from_spec(namespace, &autoscaler.spec, &self.config)?;
        let status = AutoscaleStatus::from_k8(&autoscaler.status)?;

        let outcome = self.autoscaler.reconcile(&policy, Some(&status)).await?;
        if let AutoscaleOutcome::Scaled(status) = &outcome {
            let update = autoscaler.as_status_update(status.to_k8());
            if let Err(err) = self.client.update_status(&update).await {
                // the claim already grew; without lastScaleTime the next pass skips cooldown
                error!(
                    resource = %autoscaler.metadata,
                    size = ?update.status.current_size,
                    "volume resized but status not recorded: {}",
                    err
                );
                return Err(err.into());
            }
        }
        Ok(outcome)
    }

    /// Apply a manual resize request and record the result on the resource.
    ///
    /// Returns the delay after which the caller should try again, if any.
    pub async fn handle_manual_resize(
        &self,
        resize: &K8Obj<PvcManualResizeSpec>,
    ) -> anyhow::Result<Option<Duration>> {
        let namespace = resize.metadata.namespace.as_str();
        let request =
            ManualResizeRequest::from_spec(namespace, &resize.spec, self.config.bare_units);
        let outcome = match request {
            Ok(request) => self.manual.handle(&request).await,
            Err(err) => {
                warn!(resource = %resize.metadata, "invalid manual resize: {}", err);
                ManualResizeOutcome {
                    result: ManualResizeResult::failed(err),
                    retry_after: None,
                }
            }
        };

        self.client
            .update_status(&resize.as_status_update(outcome.result.to_k8()))
            .await?;
        Ok(outcome.retry_after)
    }

    /// Run an autoscale pass every configured interval until `shutdown`
    /// completes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let interval = self.config.interval();
        info!(interval_secs = interval.as_secs(), "starting autoscale loop");

        pin_mut!(shutdown);
        loop {
            if let Err(err) = self.reconcile_autoscalers().await {
                error!("autoscale pass failed: {:#}", err);
            }

            let tick = sleep(interval);
            pin_mut!(tick);
            if let Either::Left(_) = select(shutdown.as_mut(), tick).await {
                info!("autoscale loop stopped");
                return;
            }
        }
    }
}
