// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{cache, DEFAULT_NAMESPACE};
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What happens to a catalog entry when its source resource disappears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceDeletionPolicy {
    /// Log the deletion and keep the entry untouched
    #[default]
    Retain,
    /// Keep the entry but flag it as deleted and unpublished
    MarkDeleted,
    /// Remove the entry from the catalog
    Delete,
}

impl FromStr for SourceDeletionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "retain" => Ok(SourceDeletionPolicy::Retain),
            "mark-deleted" | "markdeleted" => Ok(SourceDeletionPolicy::MarkDeleted),
            "delete" => Ok(SourceDeletionPolicy::Delete),
            other => bail!("unknown source deletion policy '{}'", other),
        }
    }
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace catalog entries are written to
    pub catalog_namespace: String,
    pub client_cache_ttl: Duration,
    /// Tear down watches for tuples removed from a live DiscoveryConfig
    pub prune_undeclared_watches: bool,
    pub source_deletion_policy: SourceDeletionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            catalog_namespace: DEFAULT_NAMESPACE.to_string(),
            client_cache_ttl: Duration::from_secs(cache::DEFAULT_TTL_SECS),
            prune_undeclared_watches: false,
            source_deletion_policy: SourceDeletionPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let catalog_namespace = lookup("POD_NAMESPACE")
            .filter(|ns| !ns.is_empty())
            .unwrap_or(defaults.catalog_namespace);

        let client_cache_ttl = match lookup("CLIENT_CACHE_TTL_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("CLIENT_CACHE_TTL_SECS is not a number: {}", v))?,
            ),
            None => defaults.client_cache_ttl,
        };

        let prune_undeclared_watches = match lookup("PRUNE_UNDECLARED_WATCHES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("PRUNE_UNDECLARED_WATCHES is not a boolean: {}", v))?,
            None => defaults.prune_undeclared_watches,
        };

        let source_deletion_policy = match lookup("SOURCE_DELETION_POLICY") {
            Some(v) => v.parse().context("invalid SOURCE_DELETION_POLICY")?,
            None => defaults.source_deletion_policy,
        };

        Ok(Config {
            catalog_namespace,
            client_cache_ttl,
            prune_undeclared_watches,
            source_deletion_policy,
        })
    }
}
