//! Shared Kubernetes helpers: resource aliases, kubectl-style argument
//! parsing, and label/field selectors.

pub mod args;
pub mod kinds;
pub mod selector;

use std::collections::BTreeMap;

pub use args::{parse_type_or_name_args, ArgsError, ResourceRequest};
pub use selector::{is_subset, Selector, SelectorError};

/// Collect a JSON object of string values (labels, annotations, selectors)
/// into an ordered map. Non-string values are skipped.
pub fn string_map(value: Option<&serde_json::Value>) -> BTreeMap<String, String> {
	value
		.and_then(serde_json::Value::as_object)
		.map(|obj| {
			obj.iter()
				.filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
				.collect()
		})
		.unwrap_or_default()
}

/// Render a label map as an equality-based selector string (`a=b,c=d`).
pub fn labels_to_selector(labels: &BTreeMap<String, String>) -> String {
	labels
		.iter()
		.map(|(k, v)| format!("{k}={v}"))
		.collect::<Vec<_>>()
		.join(",")
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_string_map_skips_non_strings() {
		let value = json!({"app": "web", "replicas": 3, "tier": "frontend"});
		let map = string_map(Some(&value));
		assert_eq!(map.len(), 2);
		assert_eq!(map["app"], "web");
		assert_eq!(map["tier"], "frontend");
	}

	#[test]
	fn test_string_map_missing() {
		assert!(string_map(None).is_empty());
		assert!(string_map(Some(&json!("nope"))).is_empty());
	}

	#[test]
	fn test_labels_to_selector_sorted() {
		let labels = BTreeMap::from([
			("tier".to_string(), "frontend".to_string()),
			("app".to_string(), "web".to_string()),
		]);
		assert_eq!(labels_to_selector(&labels), "app=web,tier=frontend");
	}
}
