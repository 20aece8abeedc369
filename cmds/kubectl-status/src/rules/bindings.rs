//! Data access available to rules, and the pure filtering behind it.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;

use crate::tree;

#[derive(Debug, Error)]
pub enum BindingError {
	#[error("{kind}/{name} has no owner references")]
	NoOwners { kind: String, name: String },

	#[error("inline renders nested deeper than {0}")]
	TooDeep(usize),
}

/// Cluster lookups and inline composition, as seen by rules. Lookups never
/// fail: anything that cannot be fetched is simply absent.
pub trait Bindings {
	fn fetch_by_scope(&self, namespace: &str, args: &[String]) -> Vec<Value>;

	fn fetch_by_label_set(
		&self,
		namespace: &str,
		kind: &str,
		labels: &BTreeMap<String, String>,
	) -> Vec<Value>;

	fn fetch_services_matching_pod(&self, pod: &Value) -> Vec<Value>;

	/// An `EventList` tree of the events about `tree`, oldest first.
	fn fetch_events(&self, tree: &Value) -> Value;

	/// Render the resolved objects through the full pipeline, oldest first,
	/// each prefixed with a newline.
	fn render_inline(&self, namespace: &str, args: &[String]) -> Result<String, BindingError>;
}

/// Bindings without a cluster: every lookup is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBindings;

impl Bindings for NoopBindings {
	fn fetch_by_scope(&self, _namespace: &str, _args: &[String]) -> Vec<Value> {
		Vec::new()
	}

	fn fetch_by_label_set(
		&self,
		_namespace: &str,
		_kind: &str,
		_labels: &BTreeMap<String, String>,
	) -> Vec<Value> {
		Vec::new()
	}

	fn fetch_services_matching_pod(&self, _pod: &Value) -> Vec<Value> {
		Vec::new()
	}

	fn fetch_events(&self, tree: &Value) -> Value {
		event_list(tree, Vec::new())
	}

	fn render_inline(&self, _namespace: &str, _args: &[String]) -> Result<String, BindingError> {
		Ok(String::new())
	}
}

/// Services whose selector is a subset of the pod's labels. ExternalName
/// services never match; a service with an empty selector matches every pod.
pub fn services_matching_pod(services: Vec<Value>, pod: &Value) -> Vec<Value> {
	let labels = k8s::string_map(pod.pointer("/metadata/labels"));
	services
		.into_iter()
		.filter(|svc| tree::str_at(svc, "/spec/type") != Some("ExternalName"))
		.filter(|svc| k8s::is_subset(&k8s::string_map(svc.pointer("/spec/selector")), &labels))
		.collect()
}

/// Field selector for the events about `tree`, so the API server does the
/// filtering. The uid is only added when the object has one.
pub fn involved_object_selector(tree: &Value) -> String {
	let mut fields = vec![
		format!("involvedObject.kind={}", tree::kind(tree)),
		format!("involvedObject.name={}", tree::name(tree)),
	];
	if let Some(namespace) = tree::namespace(tree) {
		fields.push(format!("involvedObject.namespace={namespace}"));
	}
	if let Some(uid) = tree::str_at(tree, "/metadata/uid").filter(|u| !u.is_empty()) {
		fields.push(format!("involvedObject.uid={uid}"));
	}
	fields.join(",")
}

/// Wrap the events involving `tree` into an `EventList`, oldest first.
/// An event matches on kind, name and namespace, and on uid when both
/// sides have one.
pub fn event_list(tree: &Value, events: Vec<Value>) -> Value {
	let kind = tree::kind(tree);
	let name = tree::name(tree);
	let namespace = tree::namespace(tree).unwrap_or_default();
	let uid = tree::str_at(tree, "/metadata/uid").filter(|u| !u.is_empty());

	let mut items: Vec<Value> = events
		.into_iter()
		.filter(|event| {
			let involved = |field: &str| tree::str_at(event, &format!("/involvedObject/{field}"));
			involved("kind") == Some(kind)
				&& involved("name") == Some(name)
				&& involved("namespace").unwrap_or_default() == namespace
				&& match (uid, involved("uid").filter(|u| !u.is_empty())) {
					(Some(a), Some(b)) => a == b,
					_ => true,
				}
		})
		.collect();
	items.sort_by_cached_key(|event| event_time(event).to_string());

	json!({
		"apiVersion": "v1",
		"kind": "EventList",
		"metadata": {},
		"items": items,
	})
}

fn event_time(event: &Value) -> &str {
	["/lastTimestamp", "/eventTime", "/firstTimestamp", "/metadata/creationTimestamp"]
		.into_iter()
		.find_map(|pointer| tree::str_at(event, pointer).filter(|t| !t.is_empty()))
		.unwrap_or_default()
}

/// Order objects by creation time, oldest first. Timestamps are RFC 3339 in
/// UTC, so they sort as text.
pub fn sort_by_creation(objects: &mut [Value]) {
	objects.sort_by(|a, b| tree::creation_timestamp(a).cmp(tree::creation_timestamp(b)));
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn service(name: &str, kind: &str, selector: Value) -> Value {
		json!({
			"apiVersion": "v1",
			"kind": "Service",
			"metadata": {"name": name, "namespace": "shop"},
			"spec": {"type": kind, "selector": selector}
		})
	}

	fn names(objects: &[Value]) -> Vec<&str> {
		objects.iter().map(tree::name).collect()
	}

	#[test]
	fn test_services_matching_pod() {
		let pod = json!({"kind": "Pod", "metadata": {"name": "p", "labels": {"app": "web", "tier": "front"}}});
		let services = vec![
			service("web", "ClusterIP", json!({"app": "web"})),
			service("other", "ClusterIP", json!({"app": "db"})),
			service("external", "ExternalName", json!({"app": "web"})),
			service("wide", "NodePort", json!({"app": "web", "tier": "front"})),
			service("too-narrow", "ClusterIP", json!({"app": "web", "tier": "back"})),
		];
		assert_eq!(names(&services_matching_pod(services, &pod)), ["web", "wide"]);
	}

	#[test]
	fn test_external_name_never_matches() {
		let pod = json!({"kind": "Pod", "metadata": {"name": "p"}});
		let services = vec![
			service("external", "ExternalName", json!({})),
			service("headless", "ClusterIP", json!({})),
		];
		assert_eq!(names(&services_matching_pod(services, &pod)), ["headless"]);
	}

	#[test]
	fn test_event_list_filters_and_orders() {
		let pod = json!({"kind": "Pod", "metadata": {"name": "web", "namespace": "shop", "uid": "u1"}});
		let event = |name: &str, involved: Value, at: &str| {
			json!({
				"kind": "Event",
				"metadata": {"name": name, "namespace": "shop"},
				"involvedObject": involved,
				"lastTimestamp": at
			})
		};
		let events = vec![
			event("late", json!({"kind": "Pod", "name": "web", "namespace": "shop", "uid": "u1"}), "2024-05-01T10:00:00Z"),
			event("early", json!({"kind": "Pod", "name": "web", "namespace": "shop"}), "2024-05-01T09:00:00Z"),
			event("old-pod", json!({"kind": "Pod", "name": "web", "namespace": "shop", "uid": "u0"}), "2024-05-01T08:00:00Z"),
			event("other", json!({"kind": "Pod", "name": "db", "namespace": "shop"}), "2024-05-01T08:00:00Z"),
		];
		let list = event_list(&pod, events);
		assert_eq!(list["kind"], "EventList");
		assert_eq!(names(list["items"].as_array().unwrap()), ["early", "late"]);
	}

	#[test]
	fn test_involved_object_selector() {
		let pod = json!({"kind": "Pod", "metadata": {"name": "web", "namespace": "shop", "uid": "u1"}});
		assert_eq!(
			involved_object_selector(&pod),
			"involvedObject.kind=Pod,involvedObject.name=web,involvedObject.namespace=shop,involvedObject.uid=u1"
		);
		let node = json!({"kind": "Node", "metadata": {"name": "n1"}});
		assert_eq!(involved_object_selector(&node), "involvedObject.kind=Node,involvedObject.name=n1");
	}

	#[test]
	fn test_sort_by_creation() {
		let mut objects = vec![
			json!({"metadata": {"name": "b", "creationTimestamp": "2024-02-01T00:00:00Z"}}),
			json!({"metadata": {"name": "a", "creationTimestamp": "2024-01-01T00:00:00Z"}}),
		];
		sort_by_creation(&mut objects);
		assert_eq!(names(&objects), ["a", "b"]);
	}
}
