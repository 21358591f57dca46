// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create-or-update of catalog entries in the local cluster

use super::projector::{catalog_name, CatalogEntry};
use crate::config::SourceDeletionPolicy;
use crate::constants::OPERATOR_NAME;
use crate::error::Result;
use crate::types::catalog::{
    AgentCatalog, CatalogEntryStatus, ManagementType, McpServerCatalog, ModelCatalog,
};
use crate::types::source::ResourceType;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info, instrument, warn};

/// A catalog kind the store can write
pub trait CatalogObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn entry_status(&self) -> Option<&CatalogEntryStatus>;

    /// Copy spec and labels of `desired`, leaving other metadata and status alone
    fn overwrite_from(&mut self, desired: &Self);

    fn management_type(&self) -> Option<ManagementType> {
        self.entry_status().and_then(|s| s.management_type)
    }
}

macro_rules! impl_catalog_object {
    ($($kind:ty),*) => {
        $(
            impl CatalogObject for $kind {
                fn entry_status(&self) -> Option<&CatalogEntryStatus> {
                    self.status.as_ref()
                }

                fn overwrite_from(&mut self, desired: &Self) {
                    self.spec = desired.spec.clone();
                    self.metadata.labels = desired.metadata.labels.clone();
                }
            }
        )*
    };
}

impl_catalog_object!(McpServerCatalog, AgentCatalog, ModelCatalog);

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

/// Catalog entries in the catalog namespace of the local cluster
#[derive(Clone)]
pub struct CatalogStore {
    client: Client,
    namespace: String,
    deletion_policy: SourceDeletionPolicy,
}

impl CatalogStore {
    pub fn new(client: Client, namespace: &str, deletion_policy: SourceDeletionPolicy) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            deletion_policy,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api<K: CatalogObject>(&self) -> Api<K> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Create the entry, or overwrite spec and labels of the existing one
    #[instrument(skip(self, entry), fields(entry = %entry.name(), kind = %entry.resource_type()))]
    pub async fn upsert(&self, entry: CatalogEntry) -> Result<()> {
        match entry {
            CatalogEntry::Server(desired) => self.upsert_object(desired).await,
            CatalogEntry::Agent(desired) => self.upsert_object(desired).await,
            CatalogEntry::Model(desired) => self.upsert_object(desired).await,
        }
    }

    async fn upsert_object<K: CatalogObject>(&self, desired: K) -> Result<()> {
        let api = self.api::<K>();
        match self.apply(&api, &desired).await {
            Err(e) if e.is_conflict() => {
                debug!("Conflict writing {}, re-reading and applying again", desired.name_any());
                self.apply(&api, &desired).await
            }
            other => other,
        }
    }

    async fn apply<K: CatalogObject>(&self, api: &Api<K>, desired: &K) -> Result<()> {
        let name = desired.name_any();

        match api.get_opt(&name).await? {
            None => {
                api.create(&post_params(), desired).await?;
                self.mark_external(api, &name).await?;
                info!("Created catalog entry {}/{}", self.namespace, name);
            }
            Some(mut existing) => {
                let untracked = existing.management_type().is_none();
                existing.overwrite_from(desired);
                api.replace(&name, &post_params(), &existing).await?;
                if untracked {
                    self.mark_external(api, &name).await?;
                }
                debug!("Updated catalog entry {}/{}", self.namespace, name);
            }
        }

        Ok(())
    }

    async fn mark_external<K: CatalogObject>(&self, api: &Api<K>, name: &str) -> Result<()> {
        let patch = serde_json::json!({
            "status": {
                "managementType": ManagementType::External,
                "published": true,
                "publishedAt": Time(Utc::now()),
                "status": "active",
                "ready": true,
            }
        });
        api.patch_status(name, &patch_params(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    /// Apply the source deletion policy after a source resource disappeared
    #[instrument(skip(self))]
    pub async fn source_removed(&self, resource_type: ResourceType, namespace: &str, name: &str) -> Result<()> {
        let entry_name = catalog_name(namespace, name);
        match (self.deletion_policy, resource_type) {
            (SourceDeletionPolicy::Retain, _) => {
                info!(
                    "Source {} {}/{} removed, keeping catalog entry {}",
                    resource_type, namespace, name, entry_name
                );
                Ok(())
            }
            (policy, ResourceType::McpServer) => self.remove::<McpServerCatalog>(policy, &entry_name).await,
            (policy, ResourceType::Agent) => self.remove::<AgentCatalog>(policy, &entry_name).await,
            (policy, ResourceType::ModelConfig) => self.remove::<ModelCatalog>(policy, &entry_name).await,
        }
    }

    async fn remove<K: CatalogObject>(&self, policy: SourceDeletionPolicy, name: &str) -> Result<()> {
        let api = self.api::<K>();

        let Some(existing) = api.get_opt(name).await? else {
            debug!("Catalog entry {} already gone", name);
            return Ok(());
        };
        if existing.management_type() == Some(ManagementType::Managed) {
            warn!("Catalog entry {} is managed, ignoring removal of its source", name);
            return Ok(());
        }

        match policy {
            SourceDeletionPolicy::Retain => Ok(()),
            SourceDeletionPolicy::MarkDeleted => {
                let patch = serde_json::json!({
                    "status": { "status": "deleted", "published": false, "ready": false }
                });
                match api.patch_status(name, &patch_params(), &Patch::Merge(&patch)).await {
                    Ok(_) => {
                        info!("Marked catalog entry {} as deleted", name);
                        Ok(())
                    }
                    Err(e) if is_not_found(&e) => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            SourceDeletionPolicy::Delete => match api.delete(name, &DeleteParams::default()).await {
                Ok(_) => {
                    info!("Deleted catalog entry {}", name);
                    Ok(())
                }
                Err(e) if is_not_found(&e) => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }
}
