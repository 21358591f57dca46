// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses.

use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

type ResponseFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response<Body>, tower::BoxError>> + Send>>;

fn json_response(status: u16, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.into_bytes()))
        .unwrap()
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(("GET".to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Exact matches only, discovery paths are prefixes of each other
        responses.get(&(method.to_string(), path.to_string())).cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            match response {
                Some((status, body)) => Ok(json_response(status, body)),
                None => Ok(json_response(404, not_found_json("path", &path))),
            }
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", &format!("{} \"{}\" not found", resource, name))
}

fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Parsed request path: `/api/v1/...` or `/apis/{group}/{version}/...`
struct Target {
    /// `/apis/{group}/{version}`
    prefix: String,
    plural: String,
    namespace: Option<String>,
    name: Option<String>,
    subresource: Option<String>,
}

impl Target {
    fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let root = match segments.first() {
            Some(&"api") => 2,
            Some(&"apis") => 3,
            _ => return None,
        };
        if segments.len() <= root {
            return None;
        }

        let prefix = format!("/{}", segments[..root].join("/"));
        let rest = &segments[root..];
        let (namespace, rest) = if rest[0] == "namespaces" && rest.len() >= 3 {
            (Some(rest[1].to_string()), &rest[2..])
        } else {
            (None, rest)
        };

        Some(Target {
            prefix,
            plural: rest[0].to_string(),
            namespace,
            name: rest.get(1).map(|s| s.to_string()),
            subresource: rest.get(2).map(|s| s.to_string()),
        })
    }

    fn collection(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/namespaces/{}/{}", self.prefix, ns, self.plural),
            None => format!("{}/{}", self.prefix, self.plural),
        }
    }

    /// Collections a list on this target covers, cluster-wide lists span every namespace
    fn covers(&self, collection: &str) -> bool {
        if self.namespace.is_some() {
            return collection == self.collection();
        }
        collection == self.collection()
            || (collection.starts_with(&format!("{}/namespaces/", self.prefix))
                && collection.ends_with(&format!("/{}", self.plural)))
    }
}

#[derive(Default)]
struct FakeState {
    /// collection path -> name -> object
    objects: BTreeMap<String, BTreeMap<String, Value>>,
    resource_version: u64,
    forced_conflicts: usize,
    requests: Vec<(String, String)>,
}

impl FakeState {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// An in-memory API server for a handful of verbs on namespaced objects.
///
/// Supports get, list, create, replace (with resourceVersion checks), merge patches
/// on objects and their status, and delete. Watches always fail with a 500 error
/// event so watchers back off after their initial list.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Client {
        Client::new(self.clone(), "https://kubernetes.default.svc")
    }

    /// Seed an object into a collection, e.g. `/apis/kagent.dev/v1alpha1/namespaces/staging/mcpservers`
    pub fn insert(&self, collection: &str, mut object: Value) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        object["metadata"]["resourceVersion"] = Value::String(version);
        let name = object["metadata"]["name"].as_str().unwrap_or_default().to_string();
        state
            .objects
            .entry(collection.to_string())
            .or_default()
            .insert(name, object);
    }

    pub fn get(&self, collection: &str, name: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state.objects.get(collection).and_then(|c| c.get(name)).cloned()
    }

    pub fn list(&self, collection: &str) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next replace calls fail with 409 Conflict
    pub fn force_conflicts(&self, count: usize) {
        self.state.lock().unwrap().forced_conflicts = count;
    }

    /// Number of requests seen with the given method
    pub fn request_count(&self, method: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.requests.iter().filter(|(m, _)| m == method).count()
    }

    /// Poll until `check` holds, panics after five seconds
    pub async fn wait_for(&self, mut check: impl FnMut(&FakeApiServer) -> bool) {
        for _ in 0..100 {
            if check(self) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not met in time");
    }

    fn handle(&self, method: &str, path: &str, query: &str, body: &[u8]) -> (u16, String) {
        let mut state = self.state.lock().unwrap();
        state.requests.push((method.to_string(), path.to_string()));

        let Some(target) = Target::parse(path) else {
            return (404, not_found_json("path", path));
        };
        let collection = target.collection();

        match (method, target.name.as_deref()) {
            ("GET", None) if query.contains("watch=true") => {
                let event = serde_json::json!({
                    "type": "ERROR",
                    "object": serde_json::from_str::<Value>(&status_json(500, "InternalError", "watch not supported")).unwrap()
                });
                (200, format!("{}\n", event))
            }
            ("GET", None) => {
                let items: Vec<Value> = state
                    .objects
                    .iter()
                    .filter(|(c, _)| target.covers(c))
                    .flat_map(|(_, objects)| objects.values().cloned())
                    .collect();
                let list = serde_json::json!({
                    "apiVersion": "v1",
                    "kind": "List",
                    "metadata": { "resourceVersion": state.resource_version.to_string() },
                    "items": items
                });
                (200, list.to_string())
            }
            ("GET", Some(name)) => match state.objects.get(&collection).and_then(|c| c.get(name)) {
                Some(object) => (200, object.to_string()),
                None => (404, not_found_json(&target.plural, name)),
            },
            ("POST", None) => {
                let Ok(mut object) = serde_json::from_slice::<Value>(body) else {
                    return (400, status_json(400, "BadRequest", "invalid body"));
                };
                let name = object["metadata"]["name"].as_str().unwrap_or_default().to_string();
                if state.objects.get(&collection).is_some_and(|c| c.contains_key(&name)) {
                    let message = format!("{} \"{}\" already exists", target.plural, name);
                    return (409, status_json(409, "AlreadyExists", &message));
                }
                let version = state.next_version();
                object["metadata"]["resourceVersion"] = Value::String(version);
                object["metadata"]["uid"] = Value::String(format!("uid-{}", name));
                object["metadata"]["creationTimestamp"] = Value::String("2026-01-01T00:00:00Z".to_string());
                state
                    .objects
                    .entry(collection)
                    .or_default()
                    .insert(name, object.clone());
                (201, object.to_string())
            }
            ("PUT", Some(name)) => {
                let Ok(mut object) = serde_json::from_slice::<Value>(body) else {
                    return (400, status_json(400, "BadRequest", "invalid body"));
                };
                if state.forced_conflicts > 0 {
                    state.forced_conflicts -= 1;
                    return (409, status_json(409, "Conflict", "the object has been modified"));
                }
                let Some(stored) = state.objects.get(&collection).and_then(|c| c.get(name)).cloned() else {
                    return (404, not_found_json(&target.plural, name));
                };
                if object["metadata"]["resourceVersion"] != stored["metadata"]["resourceVersion"] {
                    return (409, status_json(409, "Conflict", "the object has been modified"));
                }
                // status is only writable through the subresource
                match stored.get("status") {
                    Some(status) => object["status"] = status.clone(),
                    None => {
                        if let Some(map) = object.as_object_mut() {
                            map.remove("status");
                        }
                    }
                }
                let version = state.next_version();
                object["metadata"]["resourceVersion"] = Value::String(version);
                state
                    .objects
                    .entry(collection)
                    .or_default()
                    .insert(name.to_string(), object.clone());
                (200, object.to_string())
            }
            ("PATCH", Some(name)) => {
                let Ok(patch) = serde_json::from_slice::<Value>(body) else {
                    return (400, status_json(400, "BadRequest", "invalid body"));
                };
                let Some(mut object) = state.objects.get(&collection).and_then(|c| c.get(name)).cloned() else {
                    return (404, not_found_json(&target.plural, name));
                };
                let patch = match target.subresource.as_deref() {
                    Some("status") => serde_json::json!({ "status": patch.get("status").cloned().unwrap_or(Value::Null) }),
                    _ => patch,
                };
                merge(&mut object, &patch);
                let version = state.next_version();
                object["metadata"]["resourceVersion"] = Value::String(version);
                state
                    .objects
                    .entry(collection)
                    .or_default()
                    .insert(name.to_string(), object.clone());
                (200, object.to_string())
            }
            ("DELETE", Some(name)) => {
                match state.objects.get_mut(&collection).and_then(|c| c.remove(name)) {
                    Some(object) => (200, object.to_string()),
                    None => (404, not_found_json(&target.plural, name)),
                }
            }
            _ => (405, status_json(405, "MethodNotAllowed", "unsupported request")),
        }
    }
}

/// JSON merge patch (RFC 7386)
fn merge(target: &mut Value, patch: &Value) {
    let Some(patch_map) = patch.as_object() else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    if let Some(target_map) = target.as_object_mut() {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let server = self.clone();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();

        Box::pin(async move {
            let body = req.into_body().collect().await?.to_bytes();
            let (status, body) = server.handle(&method, &path, &query, &body);
            Ok(json_response(status, body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_patch() {
        let mut object = serde_json::json!({
            "metadata": { "name": "a" },
            "status": { "published": false, "deployment": { "ready": true } }
        });
        merge(
            &mut object,
            &serde_json::json!({ "status": { "published": true, "deployment": null, "status": "active" } }),
        );

        assert_eq!(
            object,
            serde_json::json!({
                "metadata": { "name": "a" },
                "status": { "published": true, "status": "active" }
            })
        );
    }

    #[test]
    fn test_target_parse() {
        let target = Target::parse("/apis/agentregistry.dev/v1alpha1/namespaces/agentregistry/mcpservercatalogs/x/status").unwrap();
        assert_eq!(target.collection(), "/apis/agentregistry.dev/v1alpha1/namespaces/agentregistry/mcpservercatalogs");
        assert_eq!(target.name.as_deref(), Some("x"));
        assert_eq!(target.subresource.as_deref(), Some("status"));

        let all = Target::parse("/apis/kagent.dev/v1alpha1/mcpservers").unwrap();
        assert!(all.covers("/apis/kagent.dev/v1alpha1/namespaces/staging/mcpservers"));
        assert!(!all.covers("/apis/kagent.dev/v1alpha1/namespaces/staging/agents"));
    }
}
