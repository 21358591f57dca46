// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Projection of discovered resources into catalog entries.

pub mod projector;
pub mod store;

pub use projector::{catalog_name, project, CatalogEntry, Discoverable};
pub use store::CatalogStore;
