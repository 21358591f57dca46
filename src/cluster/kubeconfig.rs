// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Remote cluster client creation from synthesized kubeconfigs

use crate::error::{DiscoveryError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{debug, instrument};
use url::Url;

/// Add `https://` when the endpoint has no scheme and validate the result
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let url = Url::parse(&with_scheme).map_err(|e| {
        DiscoveryError::ConfigurationError(format!("Invalid cluster endpoint '{}': {}", endpoint, e))
    })?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// CA data must be base64 encoded, the PEM inside is checked when the client is built
pub fn validate_ca_data(ca_data: &str) -> Result<()> {
    let decoded = STANDARD
        .decode(ca_data.trim())
        .map_err(|e| DiscoveryError::ConfigurationError(format!("Invalid caData: {}", e)))?;

    if decoded.is_empty() {
        return Err(DiscoveryError::ConfigurationError("caData is empty".to_string()));
    }

    Ok(())
}

/// Build a single-context kubeconfig for a server, optional CA bundle and bearer token
pub fn build_kubeconfig(
    name: &str,
    server: &str,
    ca_data: Option<&str>,
    token: Option<&str>,
) -> Result<Kubeconfig> {
    let mut cluster = serde_json::json!({ "server": server });
    if let Some(ca) = ca_data {
        cluster["certificate-authority-data"] = serde_json::Value::String(ca.trim().to_string());
    }

    let mut user = serde_json::json!({});
    if let Some(token) = token {
        user["token"] = serde_json::Value::String(token.to_string());
    }

    let kubeconfig = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": name, "cluster": cluster }],
        "users": [{ "name": name, "user": user }],
        "contexts": [{ "name": name, "context": { "cluster": name, "user": name } }],
        "current-context": name,
    });

    serde_json::from_value(kubeconfig)
        .map_err(|e| DiscoveryError::KubeconfigError(format!("Failed to build kubeconfig: {}", e)))
}

/// Create a Kubernetes client from a kubeconfig
pub async fn create_client_from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Client> {
    let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| DiscoveryError::KubeconfigError(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| DiscoveryError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Create a client for a cluster with a known endpoint and CA bundle
#[instrument(skip(ca_data))]
pub async fn create_static_client(environment: &str, endpoint: &str, ca_data: &str) -> Result<Client> {
    let server = normalize_endpoint(endpoint)?;
    validate_ca_data(ca_data)?;

    debug!("Creating static client for {}", server);
    let kubeconfig = build_kubeconfig(environment, &server, Some(ca_data), None)?;
    create_client_from_kubeconfig(kubeconfig).await
}
