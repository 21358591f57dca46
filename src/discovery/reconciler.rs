// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! DiscoveryConfig reconciler - keeps watches in line with the declared environments.

use super::orchestrator::{DiscoveryOrchestrator, SyncReport};
use crate::constants::{DISCOVERY_FINALIZER, OPERATOR_NAME};
use crate::error::{DiscoveryError, Result};
use crate::types::discovery::{Condition, DiscoveryConfig, DiscoveryConfigStatus, EnvironmentStatus};
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::{controller::Action, finalizer, watcher::Config as WatcherConfig, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Resync interval once every declared tuple is watched
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);
/// Retry interval while some environments still fail
const RETRY_INTERVAL: Duration = Duration::from_secs(60);

pub struct DiscoveryReconciler {
    client: Client,
    orchestrator: Arc<DiscoveryOrchestrator>,
}

impl DiscoveryReconciler {
    pub fn new(client: Client, orchestrator: Arc<DiscoveryOrchestrator>) -> Self {
        Self { client, orchestrator }
    }

    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let configs: Api<DiscoveryConfig> = Api::all(self.client.clone());
        let context = Arc::new(self);

        Controller::new(configs, WatcherConfig::default())
            .graceful_shutdown_on(async move { cancel.cancelled().await })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled discovery config: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(config: Arc<DiscoveryConfig>, ctx: Arc<DiscoveryReconciler>) -> Result<Action> {
    let namespace = config.namespace().unwrap_or_default();
    let api: Api<DiscoveryConfig> = Api::namespaced(ctx.client.clone(), &namespace);

    debug!("Reconciling discovery config: {}", config.key());
    finalizer(&api, DISCOVERY_FINALIZER, config, |event| async {
        match event {
            finalizer::Event::Apply(config) => apply(config, ctx.clone()).await,
            finalizer::Event::Cleanup(config) => cleanup(config, ctx.clone()).await,
        }
    })
    .await
    .map_err(DiscoveryError::from)
}

/// Start missing watches and publish the outcome on the status
pub async fn apply(config: Arc<DiscoveryConfig>, ctx: Arc<DiscoveryReconciler>) -> Result<Action> {
    let report = ctx.orchestrator.sync(&config).await;
    let status = build_status(&config, &report, &ctx.orchestrator, Time(Utc::now()));
    write_status(&ctx.client, &config, &status).await?;

    if report.is_complete() {
        Ok(Action::requeue(RESYNC_INTERVAL))
    } else {
        warn!("Discovery config {} is partially ready, retrying", config.key());
        Ok(Action::requeue(RETRY_INTERVAL))
    }
}

/// Stop every watch of a deleted config
pub async fn cleanup(config: Arc<DiscoveryConfig>, ctx: Arc<DiscoveryReconciler>) -> Result<Action> {
    let stopped = ctx.orchestrator.teardown(&config.key());
    info!("Discovery config {} deleted, stopped {} watches", config.key(), stopped);
    Ok(Action::await_change())
}

#[instrument(skip(client, config, status), fields(config = %config.key()))]
async fn write_status(client: &Client, config: &DiscoveryConfig, status: &DiscoveryConfigStatus) -> Result<()> {
    let api: Api<DiscoveryConfig> = Api::namespaced(client.clone(), &config.namespace().unwrap_or_default());
    let patch = serde_json::json!({ "status": status });
    let params = PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };

    api.patch_status(&config.name_any(), &params, &Patch::Merge(&patch))
        .await?;
    debug!("Updated status");
    Ok(())
}

/// Status for a sync pass. The Ready condition keeps its transition time while
/// its status is unchanged.
pub fn build_status(
    config: &DiscoveryConfig,
    report: &SyncReport,
    orchestrator: &DiscoveryOrchestrator,
    now: Time,
) -> DiscoveryConfigStatus {
    let config_key = config.key();

    let environments: Vec<EnvironmentStatus> = report
        .environments
        .iter()
        .map(|outcome| {
            let error = (!outcome.errors.is_empty()).then(|| outcome.errors.join("; "));
            EnvironmentStatus {
                name: outcome.name.clone(),
                connected: outcome.active > 0,
                last_sync_time: Some(now.clone()),
                discovered_resources: orchestrator.discovered(&config_key, &outcome.name),
                message: Some(format!("Watching {} of {} resource streams", outcome.active, outcome.declared)),
                error,
            }
        })
        .collect();

    let watched = report.watched_environments();
    let (status, reason, message) = if report.is_complete() {
        ("True", "WatchesStarted", format!("Watching {} environments", watched))
    } else {
        let failed: Vec<&str> = report
            .environments
            .iter()
            .filter(|e| !e.is_complete())
            .map(|e| e.name.as_str())
            .collect();
        (
            "False",
            "PartiallyReady",
            format!(
                "Watching {} of {} environments, failing: {}",
                watched,
                report.environments.len(),
                failed.join(", ")
            ),
        )
    };

    let previous = config
        .status
        .as_ref()
        .and_then(|s| s.conditions.iter().find(|c| c.condition_type == "Ready"));
    let last_transition_time = match previous {
        Some(c) if c.status == status => c.last_transition_time.clone(),
        _ => Some(now.clone()),
    };

    DiscoveryConfigStatus {
        environments,
        conditions: vec![Condition {
            condition_type: "Ready".to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            message: Some(message),
            last_transition_time,
            observed_generation: config.metadata.generation,
        }],
        last_sync_time: Some(now),
        watched_environments: watched as u32,
        observed_generation: config.metadata.generation,
    }
}

fn error_policy(_config: Arc<DiscoveryConfig>, error: &DiscoveryError, _ctx: Arc<DiscoveryReconciler>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
