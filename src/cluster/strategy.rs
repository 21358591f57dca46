// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Classification of an environment into exactly one credential strategy.

use crate::error::{DiscoveryError, Result};
use crate::types::discovery::{non_empty, ClusterConfig, Environment};
use sha2::{Digest, Sha256};

/// Location of a GKE cluster resolved through workload identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GkeCluster {
    pub project_id: String,
    pub location: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    /// The in-process client of the cluster we run in
    Local,
    /// Known endpoint and CA bundle
    Static { endpoint: String, ca_data: String },
    /// Endpoint, CA and token resolved through the GKE control plane
    Gke(GkeCluster),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CloudProvider {
    Gcp,
    Unsupported(String),
}

fn cloud_provider(env: &Environment) -> Option<CloudProvider> {
    non_empty(&env.provider).map(|p| match p.to_ascii_lowercase().as_str() {
        "gcp" | "gke" | "google" => CloudProvider::Gcp,
        other => CloudProvider::Unsupported(other.to_string()),
    })
}

/// Check if the environment points at the cluster this process runs in
pub fn is_local(env: &Environment) -> bool {
    let cluster = &env.cluster;
    if cluster.is_explicit_local() {
        return true;
    }

    if non_empty(&cluster.endpoint).is_none() && !cluster.use_workload_identity {
        return match cloud_provider(env) {
            None => true,
            Some(CloudProvider::Gcp) => non_empty(&cluster.project_id).is_none(),
            Some(CloudProvider::Unsupported(_)) => false,
        };
    }

    false
}

impl CredentialStrategy {
    /// Pick the strategy for an environment, first match wins:
    /// local, static endpoint + CA, provider workload identity, inferred provider.
    pub fn classify(env: &Environment) -> Result<Self> {
        if is_local(env) {
            return Ok(CredentialStrategy::Local);
        }

        let cluster = &env.cluster;
        if let (Some(endpoint), Some(ca_data)) =
            (non_empty(&cluster.endpoint), non_empty(&cluster.ca_data))
        {
            return Ok(CredentialStrategy::Static {
                endpoint: endpoint.to_string(),
                ca_data: ca_data.to_string(),
            });
        }

        if cluster.use_workload_identity {
            return match cloud_provider(env) {
                Some(CloudProvider::Gcp) => gke_strategy(env),
                Some(CloudProvider::Unsupported(provider)) => {
                    Err(DiscoveryError::ConfigurationError(format!(
                        "environment {}: workload identity is not supported for provider '{}'",
                        env.name, provider
                    )))
                }
                // A project id is the only provider hint we can act on today
                None if non_empty(&cluster.project_id).is_some() => gke_strategy(env),
                None => Err(DiscoveryError::ConfigurationError(format!(
                    "environment {}: unable to determine provider for workload identity; set provider or projectId",
                    env.name
                ))),
            };
        }

        Err(DiscoveryError::ConfigurationError(format!(
            "environment {}: no valid authentication method, need endpoint+caData or workload identity",
            env.name
        )))
    }
}

fn gke_strategy(env: &Environment) -> Result<CredentialStrategy> {
    let cluster = &env.cluster;
    let project_id = non_empty(&cluster.project_id).ok_or_else(|| {
        DiscoveryError::ConfigurationError(format!(
            "environment {}: projectId is required for GKE",
            env.name
        ))
    })?;
    let location = cluster.location().ok_or_else(|| {
        DiscoveryError::ConfigurationError(format!(
            "environment {}: cluster zone or region is required for GKE",
            env.name
        ))
    })?;

    Ok(CredentialStrategy::Gke(GkeCluster {
        project_id: project_id.to_string(),
        location: location.to_string(),
        name: cluster.name.clone(),
    }))
}

/// Short hash over every field that changes how a client authenticates
pub fn config_hash(cluster: &ClusterConfig) -> String {
    let data = format!(
        "{}:{}:{}:{}:{}:{}:{}",
        cluster.name,
        cluster.endpoint.as_deref().unwrap_or_default(),
        cluster.ca_data.as_deref().unwrap_or_default(),
        cluster.project_id.as_deref().unwrap_or_default(),
        cluster.zone.as_deref().unwrap_or_default(),
        cluster.region.as_deref().unwrap_or_default(),
        cluster.use_workload_identity,
    );

    let digest = Sha256::digest(data.as_bytes());
    hex::encode(&digest[..8])
}
