//! Resolution of query scopes against the mock API server.

mod common;

use std::io::Write as _;

use assert_matches::assert_matches;
use common::MockCluster;
use indoc::indoc;
use k8s_mock::HttpMockK8sServer;
use kubectl_status::{
	error::{FetchError, ResolutionError},
	k8s::resolver::Resolver,
	tree, QueryScope,
};
use serde_json::{json, Value};

fn config_map(namespace: &str, name: &str, labels: Value) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "ConfigMap",
		"metadata": {"name": name, "namespace": namespace, "labels": labels},
		"data": {"key": "value"}
	})
}

fn cluster() -> MockCluster {
	MockCluster::start(
		HttpMockK8sServer::builder()
			.resources(vec![
				config_map("default", "web", json!({"app": "web"})),
				config_map("default", "db", json!({"app": "db"})),
				config_map("shop", "cart", json!({"app": "web"})),
			])
			.build(),
	)
}

fn names(objects: &[Value]) -> Vec<&str> {
	objects.iter().map(tree::name).collect()
}

#[test]
fn test_resolve_type_in_default_namespace() {
	let mock = cluster();
	let connection = mock.connect();
	let scope = QueryScope::builder().args(vec!["cm".into()]).build();

	let resolved = Resolver::new(&connection).resolve(&scope).unwrap();
	assert_eq!(names(&resolved.objects), ["web", "db"]);
	assert!(resolved.errors.is_empty());
	for object in &resolved.objects {
		assert_eq!(tree::kind(object), "ConfigMap");
	}
}

#[test]
fn test_resolve_label_selector_across_namespaces() {
	let mock = cluster();
	let connection = mock.connect();
	let scope = QueryScope::builder()
		.all_namespaces(true)
		.label_selector("app=web")
		.args(vec!["configmaps".into()])
		.build();

	let resolved = Resolver::new(&connection).resolve(&scope).unwrap();
	assert_eq!(names(&resolved.objects), ["web", "cart"]);
}

#[test]
fn test_resolve_names_keeps_going_past_missing_objects() {
	let mock = cluster();
	let connection = mock.connect();
	let scope = QueryScope::builder()
		.args(vec!["configmap/web".into(), "configmap/missing".into(), "cm/db".into()])
		.build();

	let resolved = Resolver::new(&connection).resolve(&scope).unwrap();
	assert_eq!(names(&resolved.objects), ["web", "db"]);
	assert_matches!(
		resolved.errors.as_slice(),
		[FetchError::NotFound { name, .. }] if name == "missing"
	);
}

#[test]
fn test_resolve_rejects_names_with_selector() {
	let mock = cluster();
	let connection = mock.connect();
	let scope = QueryScope::builder()
		.label_selector("app=web")
		.args(vec!["configmaps".into(), "web".into()])
		.build();

	let err = Resolver::new(&connection).resolve(&scope).unwrap_err();
	assert_matches!(err, ResolutionError::NamesWithSelector);
}

#[test]
fn test_resolve_unknown_type() {
	let mock = cluster();
	let connection = mock.connect();
	let scope = QueryScope::builder().args(vec!["widgets".into()]).build();

	let err = Resolver::new(&connection).resolve(&scope).unwrap_err();
	assert_matches!(err, ResolutionError::UnknownResourceType(name) if name == "widgets");
}

#[test]
fn test_resolve_files_refetches_objects() {
	let mock = cluster();
	let connection = mock.connect();
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(
		indoc! {"
			apiVersion: v1
			kind: ConfigMap
			metadata:
			  name: web
			---
			apiVersion: v1
			kind: ConfigMap
			metadata:
			  name: gone
		"}
		.as_bytes(),
	)
	.unwrap();
	let scope = QueryScope::builder()
		.filenames(vec![file.path().to_path_buf()])
		.build();

	let resolved = Resolver::new(&connection).resolve(&scope).unwrap();
	assert_eq!(names(&resolved.objects), ["web"]);
	// The cluster copy, not the file copy, is returned.
	assert_eq!(resolved.objects[0]["data"]["key"], "value");
	assert_matches!(resolved.errors.as_slice(), [FetchError::NotFound { .. }]);
}

#[test]
fn test_resolve_files_enforces_namespace() {
	let mock = cluster();
	let connection = mock.connect();
	let mut file = tempfile::NamedTempFile::new().unwrap();
	file.write_all(b"apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cart\n  namespace: shop\n")
		.unwrap();
	let scope = QueryScope::builder()
		.namespace("default")
		.enforce_namespace(true)
		.filenames(vec![file.path().to_path_buf()])
		.build();

	let err = Resolver::new(&connection).resolve(&scope).unwrap_err();
	assert_matches!(err, ResolutionError::NamespaceMismatch { found, .. } if found == "shop");
}

#[test]
fn test_ad_hoc_lookup_swallows_errors() {
	let mock = cluster();
	let connection = mock.connect();
	let resolver = Resolver::new(&connection);

	assert_eq!(names(&resolver.resolve_ad_hoc("shop", &["configmaps"])), ["cart"]);
	assert!(resolver.resolve_ad_hoc("shop", &["widgets"]).is_empty());
	assert!(resolver.resolve_ad_hoc("shop", &["configmaps", "missing"]).is_empty());
}
