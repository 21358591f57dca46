// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registry of live watches, one per (config, environment, namespace, type) tuple

use crate::types::source::ResourceType;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Identity of a single watch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchKey {
    /// `namespace/name` of the owning DiscoveryConfig
    pub config: String,
    pub environment: String,
    /// Watched namespace or `*`
    pub namespace: String,
    pub resource_type: ResourceType,
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.config, self.environment, self.namespace, self.resource_type
        )
    }
}

/// Cancellation tokens of every live watch, children of one root token
pub struct WatchRegistry {
    root: CancellationToken,
    watches: Mutex<BTreeMap<WatchKey, CancellationToken>>,
}

impl WatchRegistry {
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            watches: Mutex::new(BTreeMap::new()),
        }
    }

    fn watches(&self) -> std::sync::MutexGuard<'_, BTreeMap<WatchKey, CancellationToken>> {
        // a poisoned map is still consistent, every mutation is a single insert or remove
        self.watches.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, key: &WatchKey) -> bool {
        self.watches().contains_key(key)
    }

    /// Register `key` and run `start` with its token, unless it is already registered.
    /// Returns whether a watch was started.
    pub fn ensure(&self, key: WatchKey, start: impl FnOnce(CancellationToken)) -> bool {
        let mut watches = self.watches();
        if watches.contains_key(&key) {
            return false;
        }

        let token = self.root.child_token();
        start(token.clone());
        debug!("Registered watch {}", key);
        watches.insert(key, token);
        true
    }

    /// Cancel and forget every watch of a config. Returns how many were stopped.
    pub fn teardown_all(&self, config: &str) -> usize {
        self.remove_where(|key| key.config == config)
    }

    /// Cancel watches of a config whose key is no longer declared
    pub fn prune(&self, config: &str, declared: &BTreeSet<WatchKey>) -> usize {
        self.remove_where(|key| key.config == config && !declared.contains(key))
    }

    fn remove_where(&self, predicate: impl Fn(&WatchKey) -> bool) -> usize {
        let mut watches = self.watches();
        let keys: Vec<WatchKey> = watches.keys().filter(|k| predicate(k)).cloned().collect();

        for key in &keys {
            if let Some(token) = watches.remove(key) {
                token.cancel();
                info!("Stopped watch {}", key);
            }
        }

        keys.len()
    }

    /// Forget a watch whose task ended on its own so the next sync restarts it.
    /// A cancelled `token` means the watch was already torn down and its key may be reused.
    pub fn release(&self, key: &WatchKey, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        let released = self.watches().remove(key).is_some();
        if released {
            info!("Released ended watch {}", key);
        }
        released
    }

    /// Keys of the live watches of a config
    pub fn active(&self, config: &str) -> Vec<WatchKey> {
        self.watches()
            .keys()
            .filter(|k| k.config == config)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.watches().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
