// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns declared environments into live watches.

use super::index::DiscoveredIndex;
use super::registry::{WatchKey, WatchRegistry};
use super::watch::{run_watch, WatchContext, WatchExit};
use crate::catalog::CatalogStore;
use crate::cluster::ClientFn;
use crate::constants::ALL_NAMESPACES;
use crate::types::discovery::{DiscoveredResourceCounts, DiscoveryConfig, Environment};
use crate::types::source::{Agent, McpServer, ModelConfig, ResourceType};
use futures::future::join_all;
use kube::Client;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Result of syncing one environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentOutcome {
    pub name: String,
    /// Tuples declared for the environment
    pub declared: usize,
    /// Watches started during this pass
    pub started: usize,
    /// Live watches after this pass
    pub active: usize,
    pub errors: Vec<String>,
}

impl EnvironmentOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.active >= self.declared
    }
}

/// Result of one reconcile pass over a DiscoveryConfig
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub environments: Vec<EnvironmentOutcome>,
    /// Watches stopped because their tuple is no longer declared
    pub pruned: usize,
}

impl SyncReport {
    /// Every declared tuple has a live watch
    pub fn is_complete(&self) -> bool {
        self.environments.iter().all(EnvironmentOutcome::is_complete)
    }

    pub fn started(&self) -> usize {
        self.environments.iter().map(|e| e.started).sum()
    }

    /// Environments with at least one live watch
    pub fn watched_environments(&self) -> usize {
        self.environments.iter().filter(|e| e.active > 0).count()
    }
}

/// Watch keys for an environment: namespaces (or `*`) times resource types (or all).
/// Unknown resource types are reported and skipped.
pub fn watch_keys(config: &str, env: &Environment) -> (Vec<WatchKey>, Vec<String>) {
    let namespaces: Vec<&str> = if env.namespaces.is_empty() {
        vec![ALL_NAMESPACES]
    } else {
        env.namespaces.iter().map(String::as_str).collect()
    };

    let mut errors = Vec::new();
    let resource_types: BTreeSet<ResourceType> = if env.resource_types.is_empty() {
        ResourceType::ALL.into_iter().collect()
    } else {
        env.resource_types
            .iter()
            .filter_map(|t| match t.parse::<ResourceType>() {
                Ok(resource_type) => Some(resource_type),
                Err(e) => {
                    errors.push(e.to_string());
                    None
                }
            })
            .collect()
    };

    let keys = namespaces
        .iter()
        .flat_map(|namespace| {
            resource_types.iter().map(move |resource_type| WatchKey {
                config: config.to_string(),
                environment: env.name.clone(),
                namespace: namespace.to_string(),
                resource_type: *resource_type,
            })
        })
        .collect();

    (keys, errors)
}

/// Owns the watch registry and starts watches with clients from a [`ClientFn`]
pub struct DiscoveryOrchestrator {
    client_fn: ClientFn,
    store: CatalogStore,
    registry: Arc<WatchRegistry>,
    index: Arc<DiscoveredIndex>,
    prune_undeclared: bool,
}

impl DiscoveryOrchestrator {
    pub fn new(client_fn: ClientFn, store: CatalogStore, cancel: CancellationToken, prune_undeclared: bool) -> Self {
        Self {
            client_fn,
            store,
            registry: Arc::new(WatchRegistry::new(cancel)),
            index: Arc::new(DiscoveredIndex::new()),
            prune_undeclared,
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn index(&self) -> &DiscoveredIndex {
        &self.index
    }

    /// Ensure a watch exists for every tuple the config declares.
    /// Failing environments are reported, never fatal.
    #[instrument(skip(self, config), fields(config = %config.key()))]
    pub async fn sync(&self, config: &DiscoveryConfig) -> SyncReport {
        let config_key = config.key();

        let environments = join_all(
            config
                .enabled_environments()
                .map(|env| self.sync_environment(&config_key, env)),
        )
        .await;

        let mut report = SyncReport {
            environments: environments.iter().map(|(outcome, _)| outcome.clone()).collect(),
            pruned: 0,
        };

        if self.prune_undeclared {
            let declared: BTreeSet<WatchKey> = environments.into_iter().flat_map(|(_, keys)| keys).collect();
            report.pruned = self.registry.prune(&config_key, &declared);

            let declared_environments: BTreeSet<&str> =
                report.environments.iter().map(|e| e.name.as_str()).collect();
            let stale: BTreeSet<String> = self
                .registry
                .active(&config_key)
                .into_iter()
                .map(|k| k.environment)
                .chain(config.spec.environments.iter().map(|e| e.name.clone()))
                .filter(|e| !declared_environments.contains(e.as_str()))
                .collect();
            for environment in stale {
                self.index.clear_environment(&config_key, &environment);
            }
        }

        info!(
            "Synced {} environments: {} watches started, {} pruned",
            report.environments.len(),
            report.started(),
            report.pruned
        );
        report
    }

    async fn sync_environment(&self, config_key: &str, env: &Environment) -> (EnvironmentOutcome, Vec<WatchKey>) {
        let (keys, mut errors) = watch_keys(config_key, env);
        let missing: Vec<&WatchKey> = keys.iter().filter(|k| !self.registry.contains(k)).collect();

        let mut started = 0;
        if !missing.is_empty() {
            match (self.client_fn)(env.clone()).await {
                Ok(client) => {
                    for key in missing {
                        if self.start_watch(key.clone(), env, client.clone()) {
                            started += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping environment {}: {}", env.name, e);
                    errors.push(e.to_string());
                }
            }
        }

        let active = keys.iter().filter(|k| self.registry.contains(k)).count();
        let outcome = EnvironmentOutcome {
            name: env.name.clone(),
            declared: keys.len(),
            started,
            active,
            errors,
        };
        (outcome, keys)
    }

    fn start_watch(&self, key: WatchKey, env: &Environment, client: Client) -> bool {
        let ctx = WatchContext {
            key: key.clone(),
            environment: env.clone(),
            store: self.store.clone(),
            index: self.index.clone(),
        };

        let registry = self.registry.clone();
        self.registry.ensure(key, move |cancel| {
            tokio::spawn(async move {
                let exit = match ctx.key.resource_type {
                    ResourceType::McpServer => run_watch::<McpServer>(client, ctx.clone(), cancel.clone()).await,
                    ResourceType::Agent => run_watch::<Agent>(client, ctx.clone(), cancel.clone()).await,
                    ResourceType::ModelConfig => run_watch::<ModelConfig>(client, ctx.clone(), cancel.clone()).await,
                };
                // the next sync starts a fresh watch for this tuple
                if exit == WatchExit::StreamEnded {
                    registry.release(&ctx.key, &cancel);
                }
            });
        })
    }

    /// Stop every watch of a config. Safe to call repeatedly.
    pub fn teardown(&self, config_key: &str) -> usize {
        let stopped = self.registry.teardown_all(config_key);
        self.index.clear(config_key);
        if stopped > 0 {
            info!("Stopped {} watches for {}", stopped, config_key);
        }
        stopped
    }

    pub fn discovered(&self, config_key: &str, environment: &str) -> DiscoveredResourceCounts {
        self.index.counts(config_key, environment)
    }
}
