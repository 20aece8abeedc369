use serde_json::Value;
use tracing::debug;

use super::AugmentError;
use crate::{
	error::FetchError,
	k8s::{client::ClusterConnection, resolver::Resolver},
	tree,
};

/// `ingressServices`: the Services behind the ingress backends. Missing
/// Services are skipped.
pub fn ingress_services(
	source: &Value,
	cluster: &ClusterConnection,
	tree: &mut Value,
) -> Result<(), AugmentError> {
	let namespace = tree::namespace(source).unwrap_or_default();
	let resolver = Resolver::new(cluster);
	let mut services = Vec::new();
	for name in backend_services(source) {
		match resolver.get("services", namespace, &name) {
			Ok(service) => services.push(service),
			Err(FetchError::NotFound { .. }) => debug!(service = %name, "backend service missing"),
			Err(e) => return Err(e.into()),
		}
	}
	tree::inject(tree, "ingressServices", Value::Array(services));
	Ok(())
}

/// Service names referenced by the default backend and every path, first
/// occurrence first. Understands both `networking.k8s.io/v1` and the legacy
/// `serviceName` layout.
fn backend_services(ingress: &Value) -> Vec<String> {
	let spec = &ingress["spec"];
	let defaults = [&spec["defaultBackend"], &spec["backend"]];
	let paths = spec["rules"]
		.as_array()
		.into_iter()
		.flatten()
		.filter_map(|rule| rule.pointer("/http/paths").and_then(Value::as_array))
		.flatten()
		.map(|path| &path["backend"]);

	let mut names: Vec<String> = Vec::new();
	for backend in defaults.into_iter().chain(paths) {
		let name = backend
			.pointer("/service/name")
			.or_else(|| backend.get("serviceName"))
			.and_then(Value::as_str);
		if let Some(name) = name.filter(|n| !n.is_empty()) {
			if !names.iter().any(|n| n == name) {
				names.push(name.to_string());
			}
		}
	}
	names
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_backend_services_v1() {
		let ingress = json!({
			"spec": {
				"defaultBackend": {"service": {"name": "fallback", "port": {"number": 80}}},
				"rules": [
					{"http": {"paths": [
						{"path": "/", "backend": {"service": {"name": "web"}}},
						{"path": "/api", "backend": {"service": {"name": "api"}}}
					]}},
					{"host": "b.example", "http": {"paths": [
						{"path": "/", "backend": {"service": {"name": "web"}}}
					]}}
				]
			}
		});
		assert_eq!(backend_services(&ingress), ["fallback", "web", "api"]);
	}

	#[test]
	fn test_backend_services_legacy() {
		let ingress = json!({
			"spec": {
				"backend": {"serviceName": "old", "servicePort": 80},
				"rules": [{"http": {"paths": [{"backend": {"serviceName": "web"}}]}}]
			}
		});
		assert_eq!(backend_services(&ingress), ["old", "web"]);
	}

	#[test]
	fn test_backend_services_without_backends() {
		assert!(backend_services(&json!({"spec": {}})).is_empty());
	}
}
