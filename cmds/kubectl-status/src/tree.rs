//! Generic object trees.
//!
//! Every object is handled as a `serde_json::Value` mapping with the key
//! order of the source document (`serde_json` is built with
//! `preserve_order`). A valid tree always has a non-empty `kind` and
//! `metadata.name`. Typed `k8s-openapi` views are projected out only where
//! strong typing pays off.

use kube::{
	api::{ApiResource, DynamicObject},
	core::TypeMeta,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversionError {
	#[error("object is not a mapping")]
	NotAnObject,

	#[error("object has no kind")]
	MissingKind,

	#[error("{kind} object has no metadata.name")]
	MissingName { kind: String },

	#[error("expected a {expected} object, got {found}")]
	KindMismatch { expected: String, found: String },

	#[error("serializing object")]
	Serialize(#[source] serde_json::Error),

	#[error("decoding {kind} object")]
	Decode {
		kind: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Project any serializable object (typed, dynamic, or already a tree)
/// into a tree. Idempotent on trees.
pub fn to_tree<T: Serialize + ?Sized>(object: &T) -> Result<Value, ConversionError> {
	let tree = serde_json::to_value(object).map_err(ConversionError::Serialize)?;
	validate(&tree)?;
	Ok(tree)
}

/// Project a dynamic object, filling in `apiVersion`/`kind` from discovery
/// when the server omitted them (list items never carry them).
pub fn from_dynamic(
	mut object: DynamicObject,
	resource: &ApiResource,
) -> Result<Value, ConversionError> {
	if object.types.as_ref().is_none_or(|t| t.kind.is_empty()) {
		object.types = Some(TypeMeta {
			api_version: resource.api_version.clone(),
			kind: resource.kind.clone(),
		});
	}
	to_tree(&object)
}

/// Decode a tree into a typed object, refusing trees of another kind.
pub fn to_typed<K>(tree: &Value) -> Result<K, ConversionError>
where
	K: k8s_openapi::Resource + DeserializeOwned,
{
	let found = kind(tree);
	if found != K::KIND {
		return Err(ConversionError::KindMismatch {
			expected: K::KIND.to_string(),
			found: found.to_string(),
		});
	}
	serde_json::from_value(tree.clone()).map_err(|source| ConversionError::Decode {
		kind: K::KIND.to_string(),
		source,
	})
}

/// Check the tree invariants.
pub fn validate(tree: &Value) -> Result<(), ConversionError> {
	if !tree.is_object() {
		return Err(ConversionError::NotAnObject);
	}
	let kind = kind(tree);
	if kind.is_empty() {
		return Err(ConversionError::MissingKind);
	}
	if name(tree).is_empty() {
		return Err(ConversionError::MissingName {
			kind: kind.to_string(),
		});
	}
	Ok(())
}

pub fn kind(tree: &Value) -> &str {
	str_at(tree, "/kind").unwrap_or_default()
}

pub fn name(tree: &Value) -> &str {
	str_at(tree, "/metadata/name").unwrap_or_default()
}

pub fn namespace(tree: &Value) -> Option<&str> {
	str_at(tree, "/metadata/namespace").filter(|ns| !ns.is_empty())
}

pub fn creation_timestamp(tree: &Value) -> &str {
	str_at(tree, "/metadata/creationTimestamp").unwrap_or_default()
}

pub fn str_at<'a>(tree: &'a Value, pointer: &str) -> Option<&'a str> {
	tree.pointer(pointer).and_then(Value::as_str)
}

/// Add a top-level key. Existing keys are never overwritten; returns
/// whether the key was added.
pub fn inject(tree: &mut Value, key: &str, value: Value) -> bool {
	let Some(obj) = tree.as_object_mut() else {
		return false;
	};
	if obj.contains_key(key) {
		return false;
	}
	obj.insert(key.to_string(), value);
	true
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use k8s_openapi::api::{apps::v1::Deployment, core::v1::Pod};
	use kube::core::{GroupVersionKind, ObjectMeta};
	use serde_json::json;

	use super::*;

	fn pod_tree() -> Value {
		json!({
			"apiVersion": "v1",
			"kind": "Pod",
			"metadata": {"name": "web", "namespace": "default", "labels": {"app": "web"}},
			"spec": {"containers": [{"name": "web", "image": "nginx"}]},
			"x-extra": {"kept": true}
		})
	}

	#[test]
	fn test_to_tree_is_idempotent() {
		let tree = pod_tree();
		let once = to_tree(&tree).unwrap();
		let twice = to_tree(&once).unwrap();
		assert_eq!(once, tree);
		assert_eq!(twice, once);
	}

	#[test]
	fn test_to_tree_from_typed() {
		let pod: Pod = to_typed(&pod_tree()).unwrap();
		let tree = to_tree(&pod).unwrap();
		assert_eq!(kind(&tree), "Pod");
		assert_eq!(name(&tree), "web");
		assert_eq!(tree["metadata"]["labels"]["app"], "web");
	}

	#[test]
	fn test_from_dynamic_fills_type_meta() {
		let gvk = GroupVersionKind::gvk("apps", "v1", "Deployment");
		let ar = ApiResource::from_gvk(&gvk);
		let mut object = DynamicObject::new("api", &ar);
		object.types = None;
		object.metadata = ObjectMeta {
			name: Some("api".into()),
			namespace: Some("prod".into()),
			..ObjectMeta::default()
		};
		object.data = json!({"spec": {"replicas": 2}});

		let tree = from_dynamic(object, &ar).unwrap();
		assert_eq!(tree["apiVersion"], "apps/v1");
		assert_eq!(kind(&tree), "Deployment");
		assert_eq!(namespace(&tree), Some("prod"));
		assert_eq!(tree["spec"]["replicas"], 2);
	}

	#[test]
	fn test_validate() {
		assert_matches!(validate(&json!("x")), Err(ConversionError::NotAnObject));
		assert_matches!(
			validate(&json!({"metadata": {"name": "a"}})),
			Err(ConversionError::MissingKind)
		);
		assert_matches!(
			validate(&json!({"kind": "Pod", "metadata": {}})),
			Err(ConversionError::MissingName { kind }) if kind == "Pod"
		);
	}

	#[test]
	fn test_to_typed_kind_mismatch() {
		let result = to_typed::<Deployment>(&pod_tree());
		assert_matches!(
			result,
			Err(ConversionError::KindMismatch { expected, found })
				if expected == "Deployment" && found == "Pod"
		);
	}

	#[test]
	fn test_inject_only_adds() {
		let mut tree = pod_tree();
		assert!(inject(&mut tree, "podMetrics", json!({"containers": []})));
		assert!(!inject(&mut tree, "kind", json!("Other")));
		assert_eq!(kind(&tree), "Pod");
		assert_eq!(tree["podMetrics"], json!({"containers": []}));
	}
}
