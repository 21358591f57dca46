// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube_runtime::finalizer;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid environment configuration: {0}")]
    ConfigurationError(String),

    #[error("Failed to build cluster client: {0}")]
    KubeconfigError(String),

    #[error("Cloud provider error: {0}")]
    CloudProviderError(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Finalizer error: {0}")]
    FinalizerError(String),
}

impl DiscoveryError {
    /// Optimistic concurrency failure (409) reported by the API server.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DiscoveryError::KubeError(kube::Error::Api(e)) if e.code == 409)
    }

    /// Errors worth retrying without a configuration change.
    pub fn is_transient(&self) -> bool {
        match self {
            DiscoveryError::KubeError(kube::Error::Api(e)) => {
                // 404, 400 (invalid), 422 and AlreadyExists only change when the input does
                let retryable = matches!(e.code, 409 | 429 | 500..=599) && e.reason != "AlreadyExists";
                retryable || e.reason == "Timeout"
            }
            DiscoveryError::KubeError(_) => true,
            DiscoveryError::CloudProviderError(_) | DiscoveryError::KubeconfigError(_) => true,
            DiscoveryError::ConfigurationError(_)
            | DiscoveryError::UnsupportedResourceType(_)
            | DiscoveryError::FinalizerError(_) => false,
        }
    }
}

impl From<finalizer::Error<DiscoveryError>> for DiscoveryError {
    fn from(err: finalizer::Error<DiscoveryError>) -> Self {
        match err {
            finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e,
            finalizer::Error::AddFinalizer(e) | finalizer::Error::RemoveFinalizer(e) => {
                DiscoveryError::KubeError(e)
            }
            finalizer::Error::UnnamedObject => {
                DiscoveryError::FinalizerError("object has no name".into())
            }
            finalizer::Error::InvalidFinalizer => {
                DiscoveryError::FinalizerError("invalid finalizer".into())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
