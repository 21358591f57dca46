// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types: the discovery configuration, the discovered source kinds
//! and the catalog entries produced from them.

pub mod catalog;
pub mod discovery;
pub mod source;
