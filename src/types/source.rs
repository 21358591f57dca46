// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource kinds discovered in remote clusters. Only the fields the catalog
//! projection reads are modelled; everything else is ignored on deserialization.

use crate::error::DiscoveryError;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "kagent.dev", version = "v1alpha1", kind = "MCPServer", root = "McpServer")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSpec {
    #[serde(default)]
    pub deployment: McpServerDeployment,
    /// "stdio" or "http"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct McpServerDeployment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "kagent.dev", version = "v1alpha2", kind = "Agent")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// "Declarative" or "BYO"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byo: Option<ByoAgentSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ByoAgentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<McpServerDeployment>,
}

impl Agent {
    /// Container image of a bring-your-own agent, if any
    pub fn image(&self) -> Option<&str> {
        self.spec
            .byo
            .as_ref()
            .and_then(|b| b.deployment.as_ref())
            .and_then(|d| d.image.as_deref())
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "kagent.dev", version = "v1alpha2", kind = "ModelConfig")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfigSpec {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
}

/// The kinds of resource discovery can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    McpServer,
    Agent,
    ModelConfig,
}

impl ResourceType {
    /// Watched when an environment does not list resource types
    pub const ALL: [ResourceType; 3] = [
        ResourceType::McpServer,
        ResourceType::Agent,
        ResourceType::ModelConfig,
    ];

    /// Kubernetes kind of the source resource
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceType::McpServer => "MCPServer",
            ResourceType::Agent => "Agent",
            ResourceType::ModelConfig => "ModelConfig",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl FromStr for ResourceType {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mcpserver" | "server" => Ok(ResourceType::McpServer),
            "agent" => Ok(ResourceType::Agent),
            "modelconfig" | "model" => Ok(ResourceType::ModelConfig),
            _ => Err(DiscoveryError::UnsupportedResourceType(s.to_string())),
        }
    }
}
