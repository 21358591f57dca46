// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cached, per-environment Kubernetes clients

use super::strategy::{config_hash, CredentialStrategy};
use super::{gke, kubeconfig, ClientFn};
use crate::error::{DiscoveryError, Result};
use crate::types::discovery::Environment;
use futures::FutureExt;
use kube::Client;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Builds a client for a remote credential strategy
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        env: &Environment,
        strategy: &CredentialStrategy,
    ) -> impl Future<Output = Result<Client>> + Send;
}

/// Connects through static credentials or cloud workload identity
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudConnector;

impl Connector for CloudConnector {
    async fn connect(&self, env: &Environment, strategy: &CredentialStrategy) -> Result<Client> {
        match strategy {
            CredentialStrategy::Local => Err(DiscoveryError::ConfigurationError(format!(
                "environment {} uses the local cluster and needs no connection",
                env.name
            ))),
            CredentialStrategy::Static { endpoint, ca_data } => {
                kubeconfig::create_static_client(&env.name, endpoint, ca_data).await
            }
            CredentialStrategy::Gke(cluster) => gke::create_gke_client(&env.name, cluster).await,
        }
    }
}

struct CachedClient {
    client: Client,
    config_hash: String,
    created_at: Instant,
}

/// Hands out clients for environments, reusing them while their credential
/// configuration is unchanged and younger than the TTL.
pub struct ClusterClientProvider<C = CloudConnector> {
    local_client: Client,
    connector: C,
    cache_ttl: Duration,
    cache: RwLock<HashMap<String, CachedClient>>,
}

impl ClusterClientProvider<CloudConnector> {
    pub fn new(local_client: Client, cache_ttl: Duration) -> Self {
        Self::with_connector(local_client, CloudConnector, cache_ttl)
    }
}

impl<C: Connector> ClusterClientProvider<C> {
    pub fn with_connector(local_client: Client, connector: C, cache_ttl: Duration) -> Self {
        Self {
            local_client,
            connector,
            cache_ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a client for the cluster behind an environment
    #[instrument(skip(self, env), fields(environment = %env.name, cluster = %env.cluster.name))]
    pub async fn get_client(&self, env: &Environment) -> Result<Client> {
        let strategy = CredentialStrategy::classify(env)?;
        if strategy == CredentialStrategy::Local {
            debug!("Using local cluster client");
            return Ok(self.local_client.clone());
        }

        let hash = config_hash(&env.cluster);
        if let Some(client) = self.cached(&env.name, &hash).await {
            debug!("Using cached client");
            return Ok(client);
        }

        // Stale or missing, build outside the lock
        self.invalidate_client(&env.name).await;
        let client = self.connector.connect(env, &strategy).await?;

        self.cache.write().await.insert(
            env.name.clone(),
            CachedClient {
                client: client.clone(),
                config_hash: hash,
                created_at: Instant::now(),
            },
        );
        info!("Created client for environment {}", env.name);

        Ok(client)
    }

    async fn cached(&self, name: &str, hash: &str) -> Option<Client> {
        let cache = self.cache.read().await;
        cache
            .get(name)
            .filter(|c| c.config_hash == hash && c.created_at.elapsed() < self.cache_ttl)
            .map(|c| c.client.clone())
    }

    /// Drop the cached client of an environment, if any
    pub async fn invalidate_client(&self, name: &str) {
        if self.cache.write().await.remove(name).is_some() {
            debug!("Invalidated cached client for environment {}", name);
        }
    }

    /// Number of remote clients currently cached
    pub async fn cached_clients(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Expose the provider as an injectable `Environment -> Client` function
    pub fn client_fn(self: Arc<Self>) -> ClientFn {
        Arc::new(move |env: Environment| {
            let provider = self.clone();
            async move { provider.get_client(&env).await }.boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;
    use crate::types::discovery::ClusterConfig;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct CountingConnector {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingConnector {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Connector for CountingConnector {
        async fn connect(&self, env: &Environment, _strategy: &CredentialStrategy) -> Result<Client> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DiscoveryError::CloudProviderError(format!("{} unreachable", env.name)));
            }
            Ok(MockService::new().into_client())
        }
    }

    fn remote_env(name: &str, endpoint: &str) -> Environment {
        Environment {
            name: name.to_string(),
            cluster: ClusterConfig {
                name: format!("{}-cluster", name),
                endpoint: Some(endpoint.to_string()),
                ca_data: Some("Y2EtZGF0YQ==".to_string()),
                ..Default::default()
            },
            provider: None,
            discovery_enabled: true,
            namespaces: vec![],
            resource_types: vec![],
            labels: BTreeMap::new(),
        }
    }

    fn local_env() -> Environment {
        let mut env = remote_env("dev", "");
        env.cluster = ClusterConfig {
            name: "local".to_string(),
            ..Default::default()
        };
        env
    }

    fn provider(connector: CountingConnector, ttl: Duration) -> ClusterClientProvider<CountingConnector> {
        ClusterClientProvider::with_connector(local_client(), connector, ttl)
    }

    /// Only the local client answers `/version`
    fn local_client() -> Client {
        let version = serde_json::json!({
            "major": "1", "minor": "30", "gitVersion": "v1.30.0-local", "gitCommit": "",
            "gitTreeState": "clean", "buildDate": "", "goVersion": "", "compiler": "gc", "platform": "linux/amd64"
        });
        MockService::new()
            .on_get("/version", 200, &version.to_string())
            .into_client()
    }

    #[tokio::test]
    async fn test_local_environment_bypasses_cache() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::from_secs(60));

        provider.get_client(&local_env()).await.unwrap();
        provider.get_client(&local_env()).await.unwrap();

        assert_eq!(connector.calls(), 0);
        assert_eq!(provider.cached_clients().await, 0);
    }

    #[tokio::test]
    async fn test_local_environment_ignores_cached_remote_client() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::from_secs(60));

        let remote = provider.get_client(&remote_env("dev", "https://10.0.0.1")).await.unwrap();
        assert!(remote.apiserver_version().await.is_err());
        assert_eq!(provider.cached_clients().await, 1);

        let local = provider.get_client(&local_env()).await.unwrap();
        assert_eq!(local.apiserver_version().await.unwrap().git_version, "v1.30.0-local");
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_credential_resolution() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::from_secs(60));
        let env = remote_env("prod", "https://10.0.0.1");

        provider.get_client(&env).await.unwrap();
        provider.get_client(&env).await.unwrap();

        assert_eq!(connector.calls(), 1);
        assert_eq!(provider.cached_clients().await, 1);
    }

    #[tokio::test]
    async fn test_credential_change_rebuilds_client() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::from_secs(60));

        provider.get_client(&remote_env("prod", "https://10.0.0.1")).await.unwrap();
        provider.get_client(&remote_env("prod", "https://10.0.0.2")).await.unwrap();

        assert_eq!(connector.calls(), 2);
        assert_eq!(provider.cached_clients().await, 1);
    }

    #[tokio::test]
    async fn test_expired_client_is_rebuilt() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::ZERO);
        let env = remote_env("prod", "https://10.0.0.1");

        provider.get_client(&env).await.unwrap();
        provider.get_client(&env).await.unwrap();

        assert_eq!(connector.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_client() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::from_secs(60));
        let env = remote_env("prod", "https://10.0.0.1");

        provider.get_client(&env).await.unwrap();
        provider.invalidate_client("prod").await;
        assert_eq!(provider.cached_clients().await, 0);

        provider.get_client(&env).await.unwrap();
        assert_eq!(connector.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let connector = CountingConnector {
            fail: true,
            ..Default::default()
        };
        let provider = provider(connector.clone(), Duration::from_secs(60));
        let env = remote_env("prod", "https://10.0.0.1");

        assert!(provider.get_client(&env).await.is_err());
        assert!(provider.get_client(&env).await.is_err());

        assert_eq!(connector.calls(), 2);
        assert_eq!(provider.cached_clients().await, 0);
    }

    #[tokio::test]
    async fn test_configuration_error_never_connects() {
        let connector = CountingConnector::default();
        let provider = provider(connector.clone(), Duration::from_secs(60));
        let mut env = remote_env("prod", "https://10.0.0.1");
        env.cluster.ca_data = None;

        let Err(err) = provider.get_client(&env).await else {
            panic!("client built without credentials");
        };
        assert!(matches!(err, DiscoveryError::ConfigurationError(_)));
        assert_eq!(connector.calls(), 0);
    }

    #[tokio::test]
    async fn test_client_fn_uses_provider_cache() {
        let connector = CountingConnector::default();
        let client_fn = Arc::new(provider(connector.clone(), Duration::from_secs(60))).client_fn();

        client_fn(remote_env("prod", "https://10.0.0.1")).await.unwrap();
        client_fn(remote_env("prod", "https://10.0.0.1")).await.unwrap();

        assert_eq!(connector.calls(), 1);
    }
}
