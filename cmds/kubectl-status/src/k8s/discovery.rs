//! Kubernetes API resource discovery and caching.
//!
//! Discovery runs once per connection. The cache answers two questions:
//! which resource serves a manifest's apiVersion/kind, and which resource a
//! user-typed name (`deploy`, `pods`, `Deployment`, `ingresses.networking.k8s.io`)
//! refers to.

use kube::{
	core::GroupVersionKind,
	discovery::{ApiResource, Scope},
	Client, Discovery,
};
use thiserror::Error;
use tracing::instrument;

use super::ResourceScope;

/// Errors that can occur during API resource discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("full API discovery failed")]
	FullDiscovery(#[source] Box<kube::Error>),
}

/// Create a GroupVersionKind from an apiVersion string and kind.
pub fn gvk_from_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
	let (group, version) = match api_version.split_once('/') {
		Some((g, v)) => (g, v),
		None => ("", api_version),
	};
	GroupVersionKind::gvk(group, version, kind)
}

/// Discovered API resource with scope.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
	/// The kube ApiResource for making API calls.
	pub api_resource: ApiResource,
	/// Whether this resource is namespaced or cluster-wide.
	pub scope: ResourceScope,
}

impl DiscoveredResource {
	pub fn namespaced(&self) -> bool {
		self.scope == ResourceScope::Namespaced
	}

	/// `plural.group`, the way kubectl prints resource types.
	pub fn qualified_name(&self) -> String {
		let ar = &self.api_resource;
		if ar.group.is_empty() {
			ar.plural.clone()
		} else {
			format!("{}.{}", ar.plural, ar.group)
		}
	}

	fn matches_name(&self, name: &str) -> bool {
		let ar = &self.api_resource;
		ar.plural == name || ar.kind.eq_ignore_ascii_case(name)
	}

	fn matches_group(&self, group: &str) -> bool {
		let ar = &self.api_resource;
		ar.group == group || format!("{}.{}", ar.version, ar.group) == group
	}
}

/// Cached API resource discovery results.
///
/// Entries are ordered core group first, then by group name, with each
/// group's preferred version ahead of the others, so name lookups resolve
/// the way kubectl does (`events` is the core Event, not events.k8s.io).
#[derive(Debug, Clone, Default)]
pub struct ApiResourceCache {
	resources: Vec<DiscoveredResource>,
}

impl ApiResourceCache {
	/// Build the cache by querying the cluster's discovery API.
	///
	/// Uses the Aggregated Discovery API (K8s 1.26+) which requires only 2
	/// API calls, falling back to full discovery on older servers.
	#[instrument(skip_all)]
	pub async fn build(client: &Client) -> Result<Self, DiscoveryError> {
		match Discovery::new(client.clone()).run_aggregated().await {
			Ok(discovery) => {
				tracing::debug!("using aggregated discovery");
				Ok(Self::from_discovery(discovery))
			}
			Err(e) => {
				tracing::debug!(error = %e, "aggregated discovery not available");
				let discovery = Discovery::new(client.clone())
					.run()
					.await
					.map_err(|e| DiscoveryError::FullDiscovery(Box::new(e)))?;
				Ok(Self::from_discovery(discovery))
			}
		}
	}

	/// Build cache from a completed Discovery.
	fn from_discovery(discovery: Discovery) -> Self {
		let mut groups: Vec<_> = discovery.groups().collect();
		groups.sort_by(|a, b| a.name().cmp(b.name()));

		let mut resources = Vec::new();
		for group in groups {
			for ver in group.versions() {
				for (ar, caps) in group.versioned_resources(ver) {
					let scope = match caps.scope {
						Scope::Namespaced => ResourceScope::Namespaced,
						Scope::Cluster => ResourceScope::ClusterWide,
					};
					resources.push(DiscoveredResource {
						api_resource: ar,
						scope,
					});
				}
			}
		}

		Self { resources }
	}

	/// Build a cache from known resources, in lookup priority order.
	pub fn from_resources(resources: Vec<DiscoveredResource>) -> Self {
		Self { resources }
	}

	/// Look up a resource by its GroupVersionKind.
	pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&DiscoveredResource> {
		self.resources.iter().find(|r| {
			let ar = &r.api_resource;
			ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind
		})
	}

	/// Resolve a resource name as typed by a user: plural, singular, kind or
	/// short name, optionally qualified with `.group` or `.version.group`.
	pub fn resolve(&self, name: &str) -> Option<&DiscoveredResource> {
		let (resource, group) = match name.split_once('.') {
			Some((resource, group)) => (resource, Some(group)),
			None => (name, None),
		};
		let resource = k8s::kinds::expand_short_name(resource);

		self.resources
			.iter()
			.filter(|r| group.is_none_or(|g| r.matches_group(g)))
			.find(|r| r.matches_name(&resource))
	}

	/// Iterate over all cached resources.
	pub fn iter(&self) -> impl Iterator<Item = &DiscoveredResource> {
		self.resources.iter()
	}
}
