//! HTTP-based mock Kubernetes server using wiremock.
//!
//! A real HTTP server that actual kubeconfig-based connections can talk to.
//! Objects are served read-only; list requests honour `labelSelector` and
//! `fieldSelector`.

use std::{collections::BTreeMap, sync::Arc};

use bon::Builder;
use k8s::Selector;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use tracing::{debug, trace};
use wiremock::{
	matchers::{header_regex, method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::discovery::{DiscoveryMode, MockApiResource, MockDiscovery};

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	#[builder(default)]
	discovery_mode: DiscoveryMode,
	/// Resources to serve as raw manifests. The server derives API paths from
	/// apiVersion/kind using the discovery data.
	#[builder(default)]
	resources: Vec<serde_json::Value>,
	/// Bodies served verbatim for exact paths (node proxy endpoints and the
	/// like), taking precedence over resource lookups.
	#[builder(default)]
	raw: BTreeMap<String, serde_json::Value>,
	/// Paths that answer every GET with an internal server error.
	#[builder(default)]
	failing: Vec<String>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
}

/// An object as stored by the mock, addressed the way the API addresses it.
#[derive(Debug, Clone)]
struct StoredResource {
	/// `/api/v1` or `/apis/<group>/<version>`.
	base: String,
	plural: String,
	namespace: Option<String>,
	name: String,
	manifest: serde_json::Value,
}

/// A parsed request path.
#[derive(Debug, PartialEq, Eq)]
struct ApiPath<'a> {
	base: String,
	namespace: Option<&'a str>,
	plural: &'a str,
	name: Option<&'a str>,
	subresource: bool,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		let discovery = MockDiscovery::default();

		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut resources: Vec<StoredResource> = self
			.resources
			.into_iter()
			.filter_map(|manifest| store_manifest(manifest, &discovery))
			.inspect(|r| trace!(base = %r.base, plural = %r.plural, name = %r.name, "Registered resource"))
			.collect();

		if !resources
			.iter()
			.any(|r| r.plural == "namespaces" && r.name == "default")
		{
			let default_ns = serde_json::json!({
				"apiVersion": "v1",
				"kind": "Namespace",
				"metadata": {
					"name": "default"
				}
			});
			resources.extend(store_manifest(default_ns, &discovery));
		}

		mount_version(&server).await;
		mount_failures(&server, &self.failing).await;
		mount_raw(&server, self.raw).await;
		mount_discovery(&server, &discovery, self.discovery_mode).await;
		mount_resources(&server, Arc::new(resources)).await;

		RunningHttpMockK8sServer { server }
	}
}

fn store_manifest(manifest: serde_json::Value, discovery: &MockDiscovery) -> Option<StoredResource> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let name = manifest.pointer("/metadata/name")?.as_str()?.to_string();
	let resource = discovery.find(api_version, kind)?;

	let base = if api_version.contains('/') {
		format!("/apis/{api_version}")
	} else {
		format!("/api/{api_version}")
	};
	let namespace = resource.namespaced.then(|| {
		manifest
			.pointer("/metadata/namespace")
			.and_then(|n| n.as_str())
			.unwrap_or("default")
			.to_string()
	});

	Some(StoredResource {
		base,
		plural: resource.name.clone(),
		namespace,
		name,
		manifest,
	})
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Paths of every request received so far, in arrival order.
	pub async fn received_paths(&self) -> Vec<String> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.map(|r| r.url.path().to_string())
			.collect()
	}

	/// Decoded `fieldSelector` of every request to `path`, in arrival order.
	pub async fn field_selectors(&self, path: &str) -> Vec<String> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.filter(|r| r.url.path() == path)
			.filter_map(|r| {
				r.url
					.query_pairs()
					.find(|(key, _)| key == "fieldSelector")
					.map(|(_, value)| value.into_owned())
			})
			.collect()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-08-13T00:00:00Z",
			"goVersion": "go1.22.5",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_failures(server: &MockServer, failing: &[String]) {
	for failing_path in failing {
		Mock::given(method("GET"))
			.and(path(failing_path.as_str()))
			.respond_with(ResponseTemplate::new(500).set_body_json(status_body(
				500,
				"InternalError",
				"injected failure",
			)))
			.with_priority(1)
			.mount(server)
			.await;
	}
}

async fn mount_raw(server: &MockServer, raw: BTreeMap<String, serde_json::Value>) {
	for (raw_path, body) in raw {
		Mock::given(method("GET"))
			.and(path(raw_path.as_str()))
			.respond_with(ResponseTemplate::new(200).set_body_json(body))
			.with_priority(2)
			.mount(server)
			.await;
	}
}

fn aggregated_resource(
	r: &MockApiResource,
	group: &str,
	version: &str,
) -> serde_json::Value {
	serde_json::json!({
		"resource": r.name,
		"responseKind": {
			"group": group,
			"version": version,
			"kind": r.kind
		},
		"scope": if r.namespaced { "Namespaced" } else { "Cluster" },
		"verbs": r.verbs,
	})
}

fn legacy_resource(r: &MockApiResource) -> serde_json::Value {
	serde_json::json!({
		"name": r.name,
		"singularName": r.kind.to_lowercase(),
		"namespaced": r.namespaced,
		"kind": r.kind,
		"verbs": r.verbs,
	})
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery, mode: DiscoveryMode) {
	let core_aggregated_resources: Vec<_> = discovery
		.core_resources
		.iter()
		.map(|r| aggregated_resource(r, "", "v1"))
		.collect();

	let aggregated_core_body = serde_json::json!({
		"kind": "APIGroupDiscoveryList",
		"apiVersion": "apidiscovery.k8s.io/v2",
		"items": [{
			"metadata": {
				"name": ""
			},
			"versions": [{
				"version": "v1",
				"resources": core_aggregated_resources,
				"freshness": "Current"
			}]
		}]
	});

	let aggregated_groups: Vec<_> = discovery
		.group_resources
		.iter()
		.map(|(gv, rs)| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			let resources: Vec<_> = rs
				.iter()
				.map(|r| aggregated_resource(r, group, version))
				.collect();

			serde_json::json!({
				"metadata": {
					"name": group
				},
				"versions": [{
					"version": version,
					"resources": resources,
					"freshness": "Current"
				}]
			})
		})
		.collect();

	let aggregated_apis_body = serde_json::json!({
		"kind": "APIGroupDiscoveryList",
		"apiVersion": "apidiscovery.k8s.io/v2",
		"items": aggregated_groups
	});

	// The Content-Type must announce the aggregated format or clients parse
	// the body as a legacy APIVersions document.
	const AGGREGATED_DISCOVERY_CONTENT_TYPE: &str =
		"application/json;g=apidiscovery.k8s.io;v=v2;as=APIGroupDiscoveryList";

	for (discovery_path, body) in [("/api", aggregated_core_body), ("/apis", aggregated_apis_body)] {
		let response = match mode {
			// set_body_json would overwrite the Content-Type
			DiscoveryMode::Aggregated => ResponseTemplate::new(200).set_body_raw(
				body.to_string().into_bytes(),
				AGGREGATED_DISCOVERY_CONTENT_TYPE,
			),
			DiscoveryMode::Legacy => ResponseTemplate::new(406),
		};
		Mock::given(method("GET"))
			.and(path(discovery_path))
			.and(header_regex("accept", "apidiscovery"))
			.respond_with(response)
			.mount(server)
			.await;
	}

	// Legacy discovery endpoints (fallback)
	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"kind": "APIVersions",
			"versions": ["v1"],
			"serverAddressByClientCIDRs": []
		})))
		.mount(server)
		.await;

	let groups: Vec<_> = discovery
		.group_resources
		.keys()
		.map(|gv| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			serde_json::json!({
				"name": group,
				"versions": [{"groupVersion": gv, "version": version}],
				"preferredVersion": {"groupVersion": gv, "version": version}
			})
		})
		.collect();

	Mock::given(method("GET"))
		.and(path("/apis"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"kind": "APIGroupList",
			"apiVersion": "v1",
			"groups": groups
		})))
		.mount(server)
		.await;

	let core_resources: Vec<_> = discovery.core_resources.iter().map(legacy_resource).collect();

	Mock::given(method("GET"))
		.and(path("/api/v1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"kind": "APIResourceList",
			"apiVersion": "v1",
			"groupVersion": "v1",
			"resources": core_resources
		})))
		.mount(server)
		.await;

	for (gv, rs) in &discovery.group_resources {
		let resources: Vec<_> = rs.iter().map(legacy_resource).collect();

		Mock::given(method("GET"))
			.and(path(format!("/apis/{}", gv)))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"kind": "APIResourceList",
				"apiVersion": "v1",
				"groupVersion": gv,
				"resources": resources
			})))
			.mount(server)
			.await;
	}
}

async fn mount_resources(server: &MockServer, resources: Arc<Vec<StoredResource>>) {
	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| respond_get(req, &resources))
		.mount(server)
		.await;
}

fn respond_get(req: &Request, resources: &[StoredResource]) -> ResponseTemplate {
	let Some(api_path) = parse_api_path(req.url.path()) else {
		return not_found();
	};
	if api_path.subresource {
		return not_found();
	}

	let in_collection = |r: &&StoredResource| {
		r.base == api_path.base
			&& r.plural == api_path.plural
			&& (api_path.namespace.is_none() || r.namespace.as_deref() == api_path.namespace)
	};

	if let Some(name) = api_path.name {
		return match resources.iter().filter(in_collection).find(|r| r.name == name) {
			Some(r) => ResponseTemplate::new(200).set_body_json(r.manifest.clone()),
			None => not_found(),
		};
	}

	let mut label_selector = Selector::default();
	let mut field_selector = Selector::default();
	for (key, value) in req.url.query_pairs() {
		let parsed = match key.as_ref() {
			"labelSelector" => value.parse::<Selector>().map(|s| label_selector = s),
			"fieldSelector" => Selector::parse_fields(&value).map(|s| field_selector = s),
			_ => Ok(()),
		};
		if let Err(e) = parsed {
			return ResponseTemplate::new(400).set_body_json(status_body(
				400,
				"BadRequest",
				&e.to_string(),
			));
		}
	}

	let items: Vec<_> = resources
		.iter()
		.filter(in_collection)
		.filter(|r| label_selector.matches_labels(&r.manifest))
		.filter(|r| field_selector.matches_fields(&r.manifest))
		.map(|r| r.manifest.clone())
		.collect();

	ResponseTemplate::new(200).set_body_json(serde_json::json!({
		"kind": "List",
		"apiVersion": "v1",
		"metadata": {"resourceVersion": "1"},
		"items": items
	}))
}

fn not_found() -> ResponseTemplate {
	ResponseTemplate::new(404).set_body_json(status_body(404, "NotFound", "not found"))
}

fn status_body(code: u16, reason: &str, message: &str) -> serde_json::Value {
	serde_json::json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}

/// Parse a Kubernetes API path.
///
/// Examples:
/// - `/api/v1/namespaces/default/pods/web` -> core pods `web` in `default`
/// - `/apis/apps/v1/deployments` -> all deployments across namespaces
/// - `/api/v1/namespaces/kube-system` -> the namespace object itself
fn parse_api_path(request_path: &str) -> Option<ApiPath<'_>> {
	let segments: Vec<&str> = request_path.trim_matches('/').split('/').collect();
	let (base, rest) = match segments.as_slice() {
		["api", version, rest @ ..] => (format!("/api/{version}"), rest),
		["apis", group, version, rest @ ..] => (format!("/apis/{group}/{version}"), rest),
		_ => return None,
	};

	let (namespace, rest) = match rest {
		["namespaces", ns, rest @ ..] if !rest.is_empty() => (Some(*ns), rest),
		_ => (None, rest),
	};

	let (plural, rest) = rest.split_first()?;
	let (name, rest) = match rest.split_first() {
		Some((name, rest)) => (Some(*name), rest),
		None => (None, rest),
	};

	Some(ApiPath {
		base,
		namespace,
		plural: *plural,
		name,
		subresource: !rest.is_empty(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_namespaced_object() {
		assert_eq!(
			parse_api_path("/apis/apps/v1/namespaces/default/deployments/web"),
			Some(ApiPath {
				base: "/apis/apps/v1".to_string(),
				namespace: Some("default"),
				plural: "deployments",
				name: Some("web"),
				subresource: false,
			})
		);
	}

	#[test]
	fn test_parse_cluster_wide_list() {
		assert_eq!(
			parse_api_path("/api/v1/pods"),
			Some(ApiPath {
				base: "/api/v1".to_string(),
				namespace: None,
				plural: "pods",
				name: None,
				subresource: false,
			})
		);
	}

	#[test]
	fn test_parse_namespace_object() {
		assert_eq!(
			parse_api_path("/api/v1/namespaces/kube-system"),
			Some(ApiPath {
				base: "/api/v1".to_string(),
				namespace: None,
				plural: "namespaces",
				name: Some("kube-system"),
				subresource: false,
			})
		);
	}

	#[test]
	fn test_parse_subresource() {
		let parsed = parse_api_path("/api/v1/nodes/n1/proxy/stats/summary").unwrap();
		assert_eq!(parsed.name, Some("n1"));
		assert!(parsed.subresource);
	}
}
