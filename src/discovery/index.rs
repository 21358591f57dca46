// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Last seen source resources per config, environment and kind

use crate::types::discovery::DiscoveredResourceCounts;
use crate::types::source::ResourceType;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

type IndexKey = (String, String, ResourceType);

/// Identities (`namespace/name`) of the resources the watches currently see
#[derive(Default)]
pub struct DiscoveredIndex {
    resources: Mutex<BTreeMap<IndexKey, BTreeSet<String>>>,
}

impl DiscoveredIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn resources(&self) -> std::sync::MutexGuard<'_, BTreeMap<IndexKey, BTreeSet<String>>> {
        self.resources.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, config: &str, environment: &str, resource_type: ResourceType, namespace: &str, name: &str) {
        self.resources()
            .entry((config.to_string(), environment.to_string(), resource_type))
            .or_default()
            .insert(format!("{}/{}", namespace, name));
    }

    pub fn forget(&self, config: &str, environment: &str, resource_type: ResourceType, namespace: &str, name: &str) {
        let key = (config.to_string(), environment.to_string(), resource_type);
        if let Some(set) = self.resources().get_mut(&key) {
            set.remove(&format!("{}/{}", namespace, name));
        }
    }

    /// Sorted identities seen for one environment and kind
    pub fn list(&self, config: &str, environment: &str, resource_type: ResourceType) -> Vec<String> {
        let key = (config.to_string(), environment.to_string(), resource_type);
        self.resources()
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn counts(&self, config: &str, environment: &str) -> DiscoveredResourceCounts {
        let resources = self.resources();
        let count = |resource_type| {
            resources
                .get(&(config.to_string(), environment.to_string(), resource_type))
                .map_or(0, |set| set.len() as u32)
        };

        DiscoveredResourceCounts {
            mcp_servers: count(ResourceType::McpServer),
            agents: count(ResourceType::Agent),
            models: count(ResourceType::ModelConfig),
        }
    }

    /// Drop everything known for a config
    pub fn clear(&self, config: &str) {
        self.resources().retain(|(c, _, _), _| c != config);
    }

    /// Drop everything known for one environment of a config
    pub fn clear_environment(&self, config: &str, environment: &str) {
        self.resources().retain(|(c, e, _), _| c != config || e != environment);
    }
}
