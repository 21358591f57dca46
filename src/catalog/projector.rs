// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Mapping of discovered source resources to catalog entries

use crate::constants::{annotations, labels};
use crate::types::catalog::{
    AgentCatalog, AgentCatalogSpec, McpServerCatalog, McpServerCatalogSpec, ModelCatalog,
    ModelCatalogSpec, Package, SourceReference, Transport,
};
use crate::types::discovery::Environment;
use crate::types::source::{Agent, McpServer, ModelConfig, ResourceType};
use kube::api::ObjectMeta;
use kube::core::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Kubernetes object names are limited to 63 characters for labels and DNS
const MAX_NAME_LENGTH: usize = 63;

const DEFAULT_VERSION: &str = "latest";

/// Canonical catalog object name for a source resource
pub fn catalog_name(namespace: &str, name: &str) -> String {
    let slug: String = format!("{}-{}", namespace, name)
        .replace(['/', '_'], "-")
        .to_lowercase()
        .chars()
        .take(MAX_NAME_LENGTH)
        .collect();

    slug.trim_end_matches('-').to_string()
}

/// `app.kubernetes.io/version`, then `kmcp.dev/version`, else "latest"
pub fn extract_version(source_labels: &BTreeMap<String, String>) -> String {
    labels::VERSION
        .iter()
        .rev()
        .find_map(|key| source_labels.get(*key).filter(|v| !v.is_empty()))
        .cloned()
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

/// Environment labels overlaid with the discovery bookkeeping labels
pub fn catalog_labels(
    env: &Environment,
    resource_type: ResourceType,
    namespace: &str,
    name: &str,
) -> BTreeMap<String, String> {
    let mut result = env.labels.clone();
    result.extend([
        (labels::DISCOVERED.to_string(), "true".to_string()),
        (labels::SOURCE_KIND.to_string(), resource_type.kind().to_string()),
        (labels::SOURCE_NAME.to_string(), name.to_string()),
        (labels::SOURCE_NAMESPACE.to_string(), namespace.to_string()),
        (labels::ENVIRONMENT.to_string(), env.name.clone()),
        (labels::CLUSTER.to_string(), env.cluster.name.clone()),
    ]);
    result
}

/// The catalog entry projected from one source resource
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
    Server(McpServerCatalog),
    Agent(AgentCatalog),
    Model(ModelCatalog),
}

impl CatalogEntry {
    pub fn name(&self) -> String {
        match self {
            CatalogEntry::Server(e) => e.name_any(),
            CatalogEntry::Agent(e) => e.name_any(),
            CatalogEntry::Model(e) => e.name_any(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            CatalogEntry::Server(_) => ResourceType::McpServer,
            CatalogEntry::Agent(_) => ResourceType::Agent,
            CatalogEntry::Model(_) => ResourceType::ModelConfig,
        }
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        match self {
            CatalogEntry::Server(e) => e.labels(),
            CatalogEntry::Agent(e) => e.labels(),
            CatalogEntry::Model(e) => e.labels(),
        }
    }
}

/// A source kind discovery can watch and project into the catalog
pub trait Discoverable:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const RESOURCE_TYPE: ResourceType;

    fn project(&self, env: &Environment) -> CatalogEntry;
}

/// Fields every projection shares
struct Projection {
    namespace: String,
    name: String,
    metadata: ObjectMeta,
    version: String,
    source_ref: SourceReference,
}

impl Projection {
    fn of<K: Discoverable>(source: &K, env: &Environment) -> Self {
        let namespace = source.namespace().unwrap_or_default();
        let name = source.name_any();

        Projection {
            metadata: ObjectMeta {
                name: Some(catalog_name(&namespace, &name)),
                labels: Some(catalog_labels(env, K::RESOURCE_TYPE, &namespace, &name)),
                ..Default::default()
            },
            version: extract_version(source.labels()),
            source_ref: SourceReference {
                kind: K::RESOURCE_TYPE.kind().to_string(),
                name: name.clone(),
                namespace: namespace.clone(),
            },
            namespace,
            name,
        }
    }

    fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

fn first_annotation(source: &impl ResourceExt, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| source.annotations().get(*key).filter(|v| !v.is_empty()))
        .cloned()
}

impl Discoverable for McpServer {
    const RESOURCE_TYPE: ResourceType = ResourceType::McpServer;

    fn project(&self, env: &Environment) -> CatalogEntry {
        let p = Projection::of(self, env);

        let title = first_annotation(self, &[annotations::TITLE, annotations::MCP_PROJECT_NAME])
            .unwrap_or_else(|| p.name.clone());
        let description =
            first_annotation(self, &[annotations::DESCRIPTION, annotations::MCP_DESCRIPTION])
                .unwrap_or_default();

        let transport_type = match self.spec.transport_type.as_deref() {
            Some("http") => "streamable-http",
            _ => "stdio",
        };
        let packages = self
            .spec
            .deployment
            .image
            .iter()
            .filter(|image| !image.is_empty())
            .map(|image| Package {
                registry_type: "oci".to_string(),
                identifier: image.clone(),
                transport: Transport {
                    transport_type: transport_type.to_string(),
                },
            })
            .collect();

        let mut entry = McpServerCatalog::new(
            "",
            McpServerCatalogSpec {
                name: p.qualified_name(),
                version: p.version.clone(),
                title,
                description,
                source_ref: Some(p.source_ref.clone()),
                packages,
            },
        );
        entry.metadata = p.metadata;
        CatalogEntry::Server(entry)
    }
}

impl Discoverable for Agent {
    const RESOURCE_TYPE: ResourceType = ResourceType::Agent;

    fn project(&self, env: &Environment) -> CatalogEntry {
        let p = Projection::of(self, env);

        let title = first_annotation(self, &[annotations::TITLE]).unwrap_or_else(|| p.name.clone());
        let description = first_annotation(self, &[annotations::DESCRIPTION])
            .or_else(|| self.spec.description.clone())
            .unwrap_or_default();

        let mut entry = AgentCatalog::new(
            "",
            AgentCatalogSpec {
                name: p.qualified_name(),
                version: p.version.clone(),
                title,
                description,
                image: self.image().unwrap_or_default().to_string(),
                source_ref: Some(p.source_ref.clone()),
            },
        );
        entry.metadata = p.metadata;
        CatalogEntry::Agent(entry)
    }
}

impl Discoverable for ModelConfig {
    const RESOURCE_TYPE: ResourceType = ResourceType::ModelConfig;

    fn project(&self, env: &Environment) -> CatalogEntry {
        let p = Projection::of(self, env);

        let title = first_annotation(self, &[annotations::TITLE]).unwrap_or_else(|| p.name.clone());
        let description = first_annotation(self, &[annotations::DESCRIPTION]).unwrap_or_default();

        let mut entry = ModelCatalog::new(
            "",
            ModelCatalogSpec {
                name: p.qualified_name(),
                version: p.version.clone(),
                title,
                description,
                provider: self.spec.provider.clone(),
                model: self.spec.model.clone(),
                source_ref: Some(p.source_ref.clone()),
            },
        );
        entry.metadata = p.metadata;
        CatalogEntry::Model(entry)
    }
}

/// Project a discovered resource into its catalog entry
pub fn project<K: Discoverable>(source: &K, env: &Environment) -> CatalogEntry {
    source.project(env)
}
