// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch loop for one (environment, namespace, kind) tuple

use super::index::DiscoveredIndex;
use super::registry::WatchKey;
use crate::catalog::{CatalogStore, Discoverable};
use crate::constants::{retry, ALL_NAMESPACES};
use crate::error::Result;
use crate::types::discovery::Environment;
use crate::types::source::ResourceType;
use futures::{Future, StreamExt};
use kube::{Api, Client, ResourceExt};
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything a watch task needs besides its client
#[derive(Clone)]
pub struct WatchContext {
    pub key: WatchKey,
    pub environment: Environment,
    pub store: CatalogStore,
    pub index: Arc<DiscoveredIndex>,
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts.
/// Transient failures wait `backoff * attempt` before the next try.
pub async fn retry_with_backoff<F, Fut>(
    description: &str,
    max_attempts: u32,
    backoff: Duration,
    mut operation: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts && e.is_transient() => {
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying",
                    description, attempt, max_attempts, e
                );
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn with_retry<F, Fut>(description: &str, operation: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    retry_with_backoff(
        description,
        retry::MAX_ATTEMPTS,
        Duration::from_millis(retry::BACKOFF_MILLIS),
        operation,
    )
    .await
}

/// Why a watch task returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    Cancelled,
    /// The watcher stream ended, the tuple needs a new watch
    StreamEnded,
}

/// Identities listed since the last `Init`. Sources missing from a completed
/// relist were deleted while the watch was down.
#[derive(Debug, Default)]
pub struct ListState {
    relisting: Option<BTreeSet<String>>,
}

/// Watch one kind in one namespace (or all) until cancelled
pub async fn run_watch<K: Discoverable>(client: Client, ctx: WatchContext, cancel: CancellationToken) -> WatchExit {
    let api: Api<K> = if ctx.key.namespace == ALL_NAMESPACES {
        Api::all(client)
    } else {
        Api::namespaced(client, &ctx.key.namespace)
    };

    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();
    let mut state = ListState::default();

    info!("Started watch {}", ctx.key);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Watch {} cancelled", ctx.key);
                return WatchExit::Cancelled;
            }
            event = stream.next() => match event {
                Some(Ok(event)) => handle_event(&ctx, &mut state, event).await,
                Some(Err(e)) => warn!("Watch {} error: {}", ctx.key, e),
                None => {
                    warn!("Watch {} stream ended", ctx.key);
                    return WatchExit::StreamEnded;
                }
            }
        }
    }
}

/// Project applied resources and apply the deletion policy to removed ones.
/// Failures are logged, the watch keeps running.
pub async fn handle_event<K: Discoverable>(ctx: &WatchContext, state: &mut ListState, event: watcher::Event<K>) {
    let key = &ctx.key;
    match event {
        watcher::Event::Init => {
            debug!("Watch {} listing", key);
            state.relisting = Some(BTreeSet::new());
        }
        watcher::Event::InitApply(source) => {
            if let Some(seen) = state.relisting.as_mut() {
                seen.insert(format!("{}/{}", source.namespace().unwrap_or_default(), source.name_any()));
            }
            source_applied(ctx, source).await;
        }
        watcher::Event::Apply(source) => source_applied(ctx, source).await,
        watcher::Event::Delete(source) => {
            source_deleted(ctx, K::RESOURCE_TYPE, &source.namespace().unwrap_or_default(), &source.name_any()).await;
        }
        watcher::Event::InitDone => {
            debug!("Watch {} initial list complete", key);
            let Some(seen) = state.relisting.take() else {
                return;
            };

            let prefix = format!("{}/", key.namespace);
            let vanished: Vec<String> = ctx
                .index
                .list(&key.config, &key.environment, K::RESOURCE_TYPE)
                .into_iter()
                .filter(|id| key.namespace == ALL_NAMESPACES || id.starts_with(&prefix))
                .filter(|id| !seen.contains(id))
                .collect();
            if !vanished.is_empty() {
                info!("Watch {} relisted, {} sources disappeared", key, vanished.len());
            }
            for id in vanished {
                if let Some((namespace, name)) = id.split_once('/') {
                    source_deleted(ctx, K::RESOURCE_TYPE, namespace, name).await;
                }
            }
        }
    }
}

async fn source_applied<K: Discoverable>(ctx: &WatchContext, source: K) {
    let key = &ctx.key;
    let namespace = source.namespace().unwrap_or_default();
    let name = source.name_any();
    ctx.index
        .record(&key.config, &key.environment, K::RESOURCE_TYPE, &namespace, &name);

    let description = format!("Upsert of {} {}/{}", K::RESOURCE_TYPE, namespace, name);
    let result = with_retry(&description, || ctx.store.upsert(source.project(&ctx.environment))).await;
    if let Err(e) = result {
        error!("{} from environment {} failed: {}", description, key.environment, e);
    }
}

async fn source_deleted(ctx: &WatchContext, resource_type: ResourceType, namespace: &str, name: &str) {
    let key = &ctx.key;
    ctx.index
        .forget(&key.config, &key.environment, resource_type, namespace, name);

    let description = format!("Removal of {} {}/{}", resource_type, namespace, name);
    let result = with_retry(&description, || ctx.store.source_removed(resource_type, namespace, name)).await;
    if let Err(e) = result {
        error!("{} from environment {} failed: {}", description, key.environment, e);
    }
}
