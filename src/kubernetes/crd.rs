// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const GROUP: &str = "agentregistry.dev";
const VERSION: &str = "v1alpha1";

/// Kinds the operator reads or writes in its own API group
const REQUIRED_KINDS: [&str; 4] = ["DiscoveryConfig", "MCPServerCatalog", "AgentCatalog", "ModelCatalog"];

/// Wait for the DiscoveryConfig and catalog CRDs to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_catalog_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match missing_kinds(client).await {
            Ok(missing) if missing.is_empty() => {
                info!("Catalog CRDs ({}/{}) are available", GROUP, VERSION);
                return Ok(());
            }
            Ok(missing) => {
                info!(
                    "CRDs {} not yet available, waiting {} seconds...",
                    missing.join(", "),
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for catalog CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Required kinds the API server does not serve yet
async fn missing_kinds(client: &Client) -> Result<Vec<&'static str>> {
    let discovery = Discovery::new(client.clone()).filter(&[GROUP]).run().await?;

    let served: Vec<String> = discovery
        .groups()
        .filter(|group| group.name() == GROUP)
        .flat_map(|group| group.recommended_resources())
        .filter(|(ar, _)| ar.version == VERSION)
        .map(|(ar, _)| ar.kind)
        .collect();

    Ok(REQUIRED_KINDS
        .into_iter()
        .filter(|kind| !served.iter().any(|s| s == kind))
        .collect())
}
