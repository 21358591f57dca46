// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys stamped on discovered catalog entries
pub mod labels {
    /// Marks an entry as produced by discovery, always "true"
    pub const DISCOVERED: &str = "agentregistry.dev/discovered";
    pub const SOURCE_KIND: &str = "agentregistry.dev/source-kind";
    pub const SOURCE_NAME: &str = "agentregistry.dev/source-name";
    pub const SOURCE_NAMESPACE: &str = "agentregistry.dev/source-namespace";
    pub const ENVIRONMENT: &str = "agentregistry.dev/environment";
    pub const CLUSTER: &str = "agentregistry.dev/cluster";
    /// Version labels, later entries take precedence
    pub const VERSION: [&str; 2] = ["kmcp.dev/version", "app.kubernetes.io/version"];
}

/// Annotation keys read from discovered source resources
pub mod annotations {
    pub const TITLE: &str = "agentregistry.dev/title";
    pub const DESCRIPTION: &str = "agentregistry.dev/description";
    pub const MCP_PROJECT_NAME: &str = "kmcp.dev/project-name";
    pub const MCP_DESCRIPTION: &str = "kmcp.dev/description";
}

/// The operator name used as field manager
pub const OPERATOR_NAME: &str = "agentregistry-discovery";

/// Finalizer guarding watch teardown when a DiscoveryConfig is deleted
pub const DISCOVERY_FINALIZER: &str = "agentregistry.dev/discovery-cleanup";

/// Catalog namespace used when POD_NAMESPACE is not set
pub const DEFAULT_NAMESPACE: &str = "agentregistry";

/// Namespace component of a watch key covering every namespace
pub const ALL_NAMESPACES: &str = "*";

/// Cluster names that always resolve to the local cluster
pub const LOCAL_CLUSTER_NAME: &str = "local";

/// Client cache configuration
pub mod cache {
    /// Default time-to-live of a cached remote cluster client
    pub const DEFAULT_TTL_SECS: u64 = 30 * 60;
}

/// Retry configuration for catalog writes triggered by watch events
pub mod retry {
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BACKOFF_MILLIS: u64 = 500;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
