// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agentregistry_discovery::catalog::CatalogStore;
use agentregistry_discovery::cluster::ClusterClientProvider;
use agentregistry_discovery::config::Config;
use agentregistry_discovery::discovery::{DiscoveryOrchestrator, DiscoveryReconciler};
use agentregistry_discovery::kubernetes::wait_for_catalog_crds;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting agent registry discovery operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: catalog_namespace={}, client_cache_ttl={:?}, source_deletion_policy={:?}",
        config.catalog_namespace, config.client_cache_ttl, config.source_deletion_policy
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for catalog CRDs to become available...");
    wait_for_catalog_crds(&client).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, stopping watches");
            shutdown.cancel();
        }
    });

    let provider = Arc::new(ClusterClientProvider::new(client.clone(), config.client_cache_ttl));
    let store = CatalogStore::new(
        client.clone(),
        &config.catalog_namespace,
        config.source_deletion_policy,
    );
    let orchestrator = DiscoveryOrchestrator::new(
        provider.client_fn(),
        store,
        cancel.child_token(),
        config.prune_undeclared_watches,
    );

    info!("Starting discovery reconciler...");
    DiscoveryReconciler::new(client, Arc::new(orchestrator))
        .run(cancel.clone())
        .await?;

    // Every watch is a child of the root token
    cancel.cancel();
    warn!("Discovery reconciler stopped");
    Ok(())
}
