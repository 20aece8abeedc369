//! Kubernetes cluster connection management.

use std::{future::Future, path::Path, sync::OnceLock, time::Duration};

use kube::{
	api::{Api, DynamicObject, ListParams},
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::instrument;

use super::{
	discovery::{ApiResourceCache, DiscoveredResource, DiscoveryError},
	ResourceScope,
};

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("starting the client runtime")]
	Runtime(#[source] std::io::Error),

	#[error("reading kubeconfig")]
	Kubeconfig(#[from] KubeconfigError),

	#[error("no kubeconfig found and not running inside a cluster")]
	Infer(#[source] kube::config::InferConfigError),

	#[error("creating the cluster client")]
	Client(#[from] kube::Error),
}

/// Errors of raw (non-resource) API requests.
#[derive(Debug, Error)]
pub enum RequestError {
	#[error("building request for {0}")]
	Build(String, #[source] http::Error),

	#[error("requesting {0}")]
	Kube(String, #[source] Box<kube::Error>),
}

/// A connection to a Kubernetes cluster.
///
/// Owns a single-threaded runtime; every cluster call blocks on it, so the
/// rest of the crate stays synchronous.
pub struct ClusterConnection {
	runtime: Runtime,
	client: Client,
	discovery: OnceLock<ApiResourceCache>,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("default_namespace", &self.client.default_namespace())
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using the kubeconfig at `kubeconfig` (or the default
	/// locations, falling back to the in-cluster service account) and the
	/// given context (or the current one).
	#[instrument(skip_all)]
	pub fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self, ConnectionError> {
		let runtime = new_runtime()?;
		let config = runtime.block_on(async {
			match kubeconfig {
				Some(path) => {
					let kubeconfig = Kubeconfig::read_from(path)?;
					custom_config(kubeconfig, context).await
				}
				None if context.is_some() => custom_config(Kubeconfig::read()?, context).await,
				None => Config::infer().await.map_err(ConnectionError::Infer),
			}
		})?;
		Self::with_config(runtime, config)
	}

	/// Connect using an in-memory kubeconfig.
	#[instrument(skip_all)]
	pub fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		let runtime = new_runtime()?;
		let config = runtime.block_on(custom_config(kubeconfig, context))?;
		Self::with_config(runtime, config)
	}

	fn with_config(runtime: Runtime, mut config: Config) -> Result<Self, ConnectionError> {
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		// The client spawns its service on the current runtime.
		let client = runtime.block_on(async { Client::try_from(config) })?;
		Ok(Self {
			runtime,
			client,
			discovery: OnceLock::new(),
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Get the default namespace from the current context.
	pub fn default_namespace(&self) -> &str {
		self.client.default_namespace()
	}

	/// Run a future to completion on the connection's runtime.
	pub fn block_on<F: Future>(&self, future: F) -> F::Output {
		self.runtime.block_on(future)
	}

	/// API resources served by the cluster, discovered on first use.
	pub fn discovery(&self) -> Result<&ApiResourceCache, DiscoveryError> {
		if let Some(cache) = self.discovery.get() {
			return Ok(cache);
		}
		let cache = self.block_on(ApiResourceCache::build(&self.client))?;
		Ok(self.discovery.get_or_init(|| cache))
	}

	/// Get one object, `None` if it does not exist.
	pub fn get(
		&self,
		resource: &DiscoveredResource,
		namespace: Option<&str>,
		name: &str,
	) -> Result<Option<DynamicObject>, kube::Error> {
		self.block_on(self.api(resource, namespace).get_opt(name))
	}

	/// List objects; `namespace` is ignored for cluster-wide resources and
	/// `None` lists across all namespaces.
	pub fn list(
		&self,
		resource: &DiscoveredResource,
		namespace: Option<&str>,
		params: &ListParams,
	) -> Result<Vec<DynamicObject>, kube::Error> {
		self.block_on(self.api(resource, namespace).list(params))
			.map(|list| list.items)
	}

	/// GET an arbitrary API path and decode the JSON body.
	pub fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
		let request = http::Request::get(path)
			.body(Vec::new())
			.map_err(|e| RequestError::Build(path.to_string(), e))?;
		self.block_on(self.client.request::<T>(request))
			.map_err(|e| RequestError::Kube(path.to_string(), Box::new(e)))
	}

	fn api(&self, resource: &DiscoveredResource, namespace: Option<&str>) -> Api<DynamicObject> {
		let client = self.client.clone();
		let ar = &resource.api_resource;
		match (resource.scope, namespace) {
			(ResourceScope::Namespaced, Some(ns)) => Api::namespaced_with(client, ns, ar),
			_ => Api::all_with(client, ar),
		}
	}
}

fn new_runtime() -> Result<Runtime, ConnectionError> {
	tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.map_err(ConnectionError::Runtime)
}

async fn custom_config(
	kubeconfig: Kubeconfig,
	context: Option<&str>,
) -> Result<Config, ConnectionError> {
	let options = KubeConfigOptions {
		context: context.map(str::to_string),
		..Default::default()
	};
	Ok(Config::from_custom_kubeconfig(kubeconfig, &options).await?)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	#[test]
	fn test_connect_unknown_context_errors() {
		let result = ClusterConnection::from_kubeconfig(Kubeconfig::default(), Some("nonexistent"));
		assert_matches!(result, Err(ConnectionError::Kubeconfig(_)));
	}
}
