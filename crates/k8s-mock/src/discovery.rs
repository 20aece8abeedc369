//! Mock Kubernetes API discovery types.

use std::collections::BTreeMap;

/// Discovery mode for the mock server.
#[derive(Clone, Copy, Default)]
pub enum DiscoveryMode {
	/// Support aggregated discovery (APIGroupDiscoveryList).
	#[default]
	Aggregated,
	/// Return 406 for aggregated discovery, forcing fallback to legacy endpoints.
	Legacy,
}

/// Pre-configured discovery responses.
pub struct MockDiscovery {
	pub core_resources: Vec<MockApiResource>,
	/// Keyed by group version (`apps/v1`).
	pub group_resources: BTreeMap<String, Vec<MockApiResource>>,
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			core_resources: vec![
				MockApiResource::namespaced("configmaps", "ConfigMap"),
				MockApiResource::namespaced("endpoints", "Endpoints"),
				MockApiResource::namespaced("events", "Event"),
				MockApiResource::namespaced("persistentvolumeclaims", "PersistentVolumeClaim"),
				MockApiResource::namespaced("pods", "Pod"),
				MockApiResource::namespaced("secrets", "Secret"),
				MockApiResource::namespaced("services", "Service"),
				MockApiResource::cluster_scoped("namespaces", "Namespace"),
				MockApiResource::cluster_scoped("nodes", "Node"),
				MockApiResource::cluster_scoped("persistentvolumes", "PersistentVolume"),
			],
			group_resources: BTreeMap::from([
				(
					"apps/v1".to_string(),
					vec![
						MockApiResource::namespaced("controllerrevisions", "ControllerRevision"),
						MockApiResource::namespaced("daemonsets", "DaemonSet"),
						MockApiResource::namespaced("deployments", "Deployment"),
						MockApiResource::namespaced("replicasets", "ReplicaSet"),
						MockApiResource::namespaced("statefulsets", "StatefulSet"),
					],
				),
				(
					"batch/v1".to_string(),
					vec![
						MockApiResource::namespaced("cronjobs", "CronJob"),
						MockApiResource::namespaced("jobs", "Job"),
					],
				),
				(
					"networking.k8s.io/v1".to_string(),
					vec![MockApiResource::namespaced("ingresses", "Ingress")],
				),
			]),
		}
	}
}

/// A mock API resource definition.
pub struct MockApiResource {
	pub name: String,
	pub kind: String,
	pub namespaced: bool,
	pub verbs: Vec<String>,
}

impl MockApiResource {
	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self::new(name, kind, true)
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self::new(name, kind, false)
	}

	fn new(name: &str, kind: &str, namespaced: bool) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced,
			verbs: vec!["get".into(), "list".into(), "watch".into()],
		}
	}
}

impl MockDiscovery {
	/// Find the (group version, resource) serving a manifest's apiVersion/kind.
	pub fn find(&self, api_version: &str, kind: &str) -> Option<&MockApiResource> {
		let resources = if api_version.contains('/') {
			self.group_resources.get(api_version)?
		} else {
			&self.core_resources
		};
		resources.iter().find(|r| r.kind == kind)
	}
}
