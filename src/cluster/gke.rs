// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! GKE endpoint and credential resolution through workload identity.
//!
//! Access tokens come from Google application default credentials: the
//! `GOOGLE_APPLICATION_CREDENTIALS` key file, the gcloud user credentials or the
//! GCE metadata server, in that order. Tokens live for an hour, the client cache
//! TTL must stay below that.

use super::kubeconfig::{build_kubeconfig, create_client_from_kubeconfig, normalize_endpoint, validate_ca_data};
use super::strategy::GkeCluster;
use crate::error::{DiscoveryError, Result};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde::Deserialize;
use tame_oauth::gcp::{TokenOrRequest, TokenProvider, TokenProviderWrapper};
use tracing::{debug, info, instrument};

const CONTAINER_API: &str = "https://container.googleapis.com";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// The part of the GKE `Cluster` resource needed to reach its API server
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub endpoint: String,
    pub master_auth: MasterAuth,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasterAuth {
    #[serde(default)]
    pub cluster_ca_certificate: String,
}

impl GkeCluster {
    /// Path of the cluster in the container API
    pub fn resource_path(&self) -> String {
        format!(
            "/v1/projects/{}/locations/{}/clusters/{}",
            self.project_id, self.location, self.name
        )
    }
}

fn cloud_error(context: &str, e: impl std::fmt::Display) -> DiscoveryError {
    DiscoveryError::CloudProviderError(format!("{}: {}", context, e))
}

/// Access token from the application default credentials of the workload
pub async fn default_access_token() -> Result<String> {
    let provider = TokenProviderWrapper::get_default_provider()
        .map_err(|e| cloud_error("Failed to load default credentials", e))?
        .ok_or_else(|| DiscoveryError::CloudProviderError("no Google default credentials found".to_string()))?;

    match provider
        .get_token(&[CLOUD_PLATFORM_SCOPE])
        .map_err(|e| cloud_error("Failed to prepare token request", e))?
    {
        TokenOrRequest::Token(token) => Ok(token.access_token),
        TokenOrRequest::Request { request, scope_hash, .. } => {
            debug!("Requesting access token from {}", request.uri());
            let response = send_token_request(request).await?;
            let token = provider
                .parse_token_response(scope_hash, response)
                .map_err(|e| cloud_error("Failed to get default credentials", e))?;
            Ok(token.access_token)
        }
    }
}

/// Split an absolute URI into the server to connect to and the request path
fn split_origin(uri: &http::Uri) -> Result<(String, http::Uri)> {
    let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
        return Err(DiscoveryError::CloudProviderError(format!(
            "token request has no absolute URI: {}",
            uri
        )));
    };
    let path = uri
        .path_and_query()
        .map_or("/", |p| p.as_str())
        .parse()
        .map_err(|e| cloud_error("Invalid token request path", e))?;

    Ok((format!("{}://{}", scheme, authority), path))
}

/// Execute a token request built by the credential provider
async fn send_token_request(request: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>> {
    let (mut parts, body) = request.into_parts();
    let (origin, path) = split_origin(&parts.uri)?;
    parts.uri = path;

    let client = create_client_from_kubeconfig(build_kubeconfig("oauth", &origin, None, None)?).await?;
    let response = client
        .send(http::Request::from_parts(parts, Body::from(body)))
        .await
        .map_err(|e| cloud_error("Failed to request access token", e))?;

    let (parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| cloud_error("Failed to read token response", e))?
        .to_bytes();
    Ok(http::Response::from_parts(parts, bytes.to_vec()))
}

/// Fetch cluster details from the container API
#[instrument(skip(api), fields(project = %cluster.project_id, location = %cluster.location, cluster = %cluster.name))]
pub async fn describe_cluster(api: &Client, cluster: &GkeCluster) -> Result<ClusterInfo> {
    let request = http::Request::get(cluster.resource_path())
        .body(Vec::new())
        .map_err(|e| cloud_error("Failed to build describe request", e))?;

    let info: ClusterInfo = api
        .request(request)
        .await
        .map_err(|e| cloud_error(&format!("Failed to get GKE cluster {}", cluster.name), e))?;

    if info.endpoint.is_empty() {
        return Err(DiscoveryError::CloudProviderError(format!(
            "GKE cluster {} has no endpoint",
            cluster.name
        )));
    }
    if info.master_auth.cluster_ca_certificate.is_empty() {
        return Err(DiscoveryError::CloudProviderError(format!(
            "GKE cluster {} has no CA certificate",
            cluster.name
        )));
    }

    Ok(info)
}

/// Create a bearer-token client for a GKE cluster
pub async fn create_gke_client(environment: &str, cluster: &GkeCluster) -> Result<Client> {
    let token = default_access_token().await?;

    let api = create_client_from_kubeconfig(build_kubeconfig("gke-api", CONTAINER_API, None, Some(&token))?).await?;
    let info = describe_cluster(&api, cluster).await?;

    let server = normalize_endpoint(&info.endpoint)?;
    validate_ca_data(&info.master_auth.cluster_ca_certificate)?;

    info!(
        "Resolved GKE cluster {} for environment {} at {}",
        cluster.name, environment, server
    );
    let kubeconfig = build_kubeconfig(
        environment,
        &server,
        Some(&info.master_auth.cluster_ca_certificate),
        Some(&token),
    )?;
    create_client_from_kubeconfig(kubeconfig).await
}
