//! Turning query scopes and rule lookups into object trees.

use k8s::{kinds, ResourceRequest, Selector};
use kube::api::ListParams;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{
	client::ClusterConnection,
	discovery::{gvk_from_api_version, ApiResourceCache, DiscoveredResource},
	manifest::read_manifests,
};
use crate::{
	error::{FetchError, ResolutionError},
	query::QueryScope,
	tree,
};

/// Objects recovered by a resolution, plus the requested objects that could
/// not be fetched.
#[derive(Debug, Default)]
pub struct Resolved {
	pub objects: Vec<Value>,
	pub errors: Vec<FetchError>,
}

/// Where fetched objects are looked up.
struct Placement<'s> {
	/// Namespace for named gets of namespaced resources.
	get: &'s str,
	/// Namespace for lists, `None` for all namespaces.
	list: Option<&'s str>,
}

pub struct Resolver<'a> {
	cluster: &'a ClusterConnection,
}

impl<'a> Resolver<'a> {
	pub fn new(cluster: &'a ClusterConnection) -> Self {
		Self { cluster }
	}

	pub fn cluster(&self) -> &'a ClusterConnection {
		self.cluster
	}

	/// Resolve a user query, continuing past objects that cannot be fetched.
	#[instrument(skip_all, fields(args = ?scope.args, files = scope.filenames.len()))]
	pub fn resolve(&self, scope: &QueryScope) -> Result<Resolved, ResolutionError> {
		let cache = self.cluster.discovery()?;
		let namespace = scope
			.namespace
			.as_deref()
			.unwrap_or_else(|| self.cluster.default_namespace());

		if !scope.filenames.is_empty() {
			if !scope.args.is_empty() {
				return Err(ResolutionError::ArgsWithFilenames);
			}
			return self.resolve_files(scope, cache, namespace);
		}

		let requests = k8s::parse_type_or_name_args(&scope.args)?;
		let mut params = ListParams::default();
		if let Some(labels) = &scope.label_selector {
			labels
				.parse::<Selector>()
				.map_err(ResolutionError::LabelSelector)?;
			params = params.labels(labels);
		}
		if let Some(fields) = &scope.field_selector {
			Selector::parse_fields(fields).map_err(ResolutionError::FieldSelector)?;
			params = params.fields(fields);
		}

		if requests.iter().any(|r| r.name.is_some()) {
			if scope.label_selector.is_some() || scope.field_selector.is_some() {
				return Err(ResolutionError::NamesWithSelector);
			}
			if scope.all_namespaces {
				return Err(ResolutionError::NamesAcrossAllNamespaces);
			}
		}

		let placement = Placement {
			get: namespace,
			list: (!scope.all_namespaces).then_some(namespace),
		};
		self.fetch_requests(cache, &requests, &placement, &params)
	}

	/// Lookup used while rendering: no user selectors, and any failure yields
	/// an empty result. An empty namespace lists across all namespaces.
	pub fn resolve_ad_hoc<S: AsRef<str>>(&self, namespace: &str, args: &[S]) -> Vec<Value> {
		let result = self.cluster.discovery().map_err(ResolutionError::from).and_then(|cache| {
			let requests = k8s::parse_type_or_name_args(args)?;
			let placement = Placement {
				get: if namespace.is_empty() {
					self.cluster.default_namespace()
				} else {
					namespace
				},
				list: (!namespace.is_empty()).then_some(namespace),
			};
			self.fetch_requests(cache, &requests, &placement, &ListParams::default())
		});

		match result {
			Ok(resolved) => {
				for error in &resolved.errors {
					debug!(error = %error, "ad hoc lookup skipped an object");
				}
				resolved.objects
			}
			Err(error) => {
				debug!(error = %error, namespace, "ad hoc lookup failed");
				Vec::new()
			}
		}
	}

	/// List objects of one resource type (`namespace: None` for all
	/// namespaces).
	pub fn list(
		&self,
		resource: &str,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<Value>, ResolutionError> {
		let cache = self.cluster.discovery()?;
		let resource = cache
			.resolve(resource)
			.ok_or_else(|| ResolutionError::UnknownResourceType(resource.to_string()))?;
		let mut resolved = Resolved::default();
		self.list_into(resource, namespace, params, &mut resolved)?;
		for error in resolved.errors {
			debug!(error = %error, "list skipped an object");
		}
		Ok(resolved.objects)
	}

	fn resolve_files(
		&self,
		scope: &QueryScope,
		cache: &ApiResourceCache,
		namespace: &str,
	) -> Result<Resolved, ResolutionError> {
		let mut resolved = Resolved::default();
		for path in &scope.filenames {
			for (index, manifest) in read_manifests(path)?.into_iter().enumerate() {
				let api_version = tree::str_at(&manifest, "/apiVersion").unwrap_or_default();
				let kind = tree::kind(&manifest);
				let name = tree::name(&manifest);
				if api_version.is_empty() || kind.is_empty() || name.is_empty() {
					return Err(ResolutionError::IncompleteManifest {
						path: path.display().to_string(),
						index,
					});
				}

				let resource = cache
					.lookup(&gvk_from_api_version(api_version, kind))
					.ok_or_else(|| ResolutionError::UnknownKind {
						api_version: api_version.to_string(),
						kind: kind.to_string(),
					})?;

				let object_namespace = match tree::namespace(&manifest) {
					Some(found) if scope.enforce_namespace && found != namespace => {
						return Err(ResolutionError::NamespaceMismatch {
							expected: namespace.to_string(),
							found: found.to_string(),
						});
					}
					Some(found) => found,
					None => namespace,
				};

				match self.fetch_named(resource, object_namespace, name) {
					Ok(tree) => resolved.objects.push(tree),
					Err(error) => resolved.errors.push(error),
				}
			}
		}
		Ok(resolved)
	}

	fn fetch_requests(
		&self,
		cache: &ApiResourceCache,
		requests: &[ResourceRequest],
		placement: &Placement<'_>,
		params: &ListParams,
	) -> Result<Resolved, ResolutionError> {
		let mut resolved = Resolved::default();
		for request in requests {
			for resource in expand_resource(cache, &request.resource)? {
				match &request.name {
					Some(name) => match self.fetch_named(resource, placement.get, name) {
						Ok(tree) => resolved.objects.push(tree),
						Err(error) => resolved.errors.push(error),
					},
					None => self.list_into(resource, placement.list, params, &mut resolved)?,
				}
			}
		}
		Ok(resolved)
	}

	/// Get one object by name; `namespace` is ignored for cluster-wide
	/// resources.
	pub fn get(&self, resource: &str, namespace: &str, name: &str) -> Result<Value, FetchError> {
		let cache = self.cluster.discovery().map_err(|e| FetchError::Unresolved {
			resource: resource.to_string(),
			source: Box::new(e.into()),
		})?;
		let discovered = cache.resolve(resource).ok_or_else(|| FetchError::Unresolved {
			resource: resource.to_string(),
			source: Box::new(ResolutionError::UnknownResourceType(resource.to_string())),
		})?;
		self.fetch_named(discovered, namespace, name)
	}

	fn fetch_named(
		&self,
		resource: &DiscoveredResource,
		namespace: &str,
		name: &str,
	) -> Result<Value, FetchError> {
		let qualified = || resource.qualified_name();
		match self.cluster.get(resource, Some(namespace), name) {
			Ok(Some(object)) => {
				tree::from_dynamic(object, &resource.api_resource).map_err(|source| {
					FetchError::Conversion {
						resource: qualified(),
						name: name.to_string(),
						source,
					}
				})
			}
			Ok(None) => Err(FetchError::NotFound {
				resource: qualified(),
				name: name.to_string(),
			}),
			Err(e) => Err(FetchError::Get {
				resource: qualified(),
				name: name.to_string(),
				source: Box::new(e),
			}),
		}
	}

	fn list_into(
		&self,
		resource: &DiscoveredResource,
		namespace: Option<&str>,
		params: &ListParams,
		resolved: &mut Resolved,
	) -> Result<(), ResolutionError> {
		let items = self
			.cluster
			.list(resource, namespace, params)
			.map_err(|e| ResolutionError::List {
				resource: resource.qualified_name(),
				source: Box::new(e),
			})?;
		for item in items {
			let name = item.metadata.name.clone().unwrap_or_default();
			match tree::from_dynamic(item, &resource.api_resource) {
				Ok(tree) => resolved.objects.push(tree),
				Err(source) => resolved.errors.push(FetchError::Conversion {
					resource: resource.qualified_name(),
					name,
					source,
				}),
			}
		}
		Ok(())
	}
}

/// The resources a user-typed type stands for: one resource, or every
/// served member of a category.
fn expand_resource<'c>(
	cache: &'c ApiResourceCache,
	resource: &str,
) -> Result<Vec<&'c DiscoveredResource>, ResolutionError> {
	if let Some(members) = kinds::expand_category(resource) {
		return Ok(members.iter().filter_map(|m| cache.resolve(m)).collect());
	}
	cache
		.resolve(resource)
		.map(|r| vec![r])
		.ok_or_else(|| ResolutionError::UnknownResourceType(resource.to_string()))
}
