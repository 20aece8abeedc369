//! Cluster access: connection, discovery and resource resolution.
//!
//! All calls are blocking; the connection owns the async runtime the kube
//! client runs on.

pub mod client;
pub mod discovery;
pub mod manifest;
pub mod resolver;

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Deployment, ConfigMap).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace, Node).
	ClusterWide,
}
