// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Authenticated clients for the clusters behind discovery environments.

pub mod gke;
pub mod kubeconfig;
pub mod provider;
pub mod strategy;

use crate::error::Result;
use crate::types::discovery::Environment;
use futures::future::BoxFuture;
use kube::Client;
use std::sync::Arc;

pub use provider::{CloudConnector, ClusterClientProvider, Connector};
pub use strategy::CredentialStrategy;

/// Injectable `Environment -> Client` function used by the orchestrator
pub type ClientFn = Arc<dyn Fn(Environment) -> BoxFuture<'static, Result<Client>> + Send + Sync>;
