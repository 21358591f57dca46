// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-environment watch lifecycle and routing of watch events to the catalog.

pub mod index;
pub mod orchestrator;
pub mod reconciler;
pub mod registry;
pub mod watch;

pub use index::DiscoveredIndex;
pub use orchestrator::{DiscoveryOrchestrator, EnvironmentOutcome, SyncReport};
pub use reconciler::DiscoveryReconciler;
pub use registry::{WatchKey, WatchRegistry};
