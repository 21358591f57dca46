// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prints the CustomResourceDefinitions owned by the operator as YAML.

use agentregistry_discovery::types::catalog::{AgentCatalog, McpServerCatalog, ModelCatalog};
use agentregistry_discovery::types::discovery::DiscoveryConfig;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        DiscoveryConfig::crd(),
        McpServerCatalog::crd(),
        AgentCatalog::crd(),
        ModelCatalog::crd(),
    ];

    let documents = crds
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    print!("{}", documents.join("---\n"));
    Ok(())
}
