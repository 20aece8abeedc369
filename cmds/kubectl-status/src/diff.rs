//! Unified diffs between two revisions of an object.

use serde_json::{Map, Value};
use similar::TextDiff;
use thiserror::Error;
use tracing::instrument;

use crate::{k8s::resolver::Resolver, tree};

#[derive(Debug, Error)]
pub enum DiffError {
	#[error("{resource} \"{name}\" not found")]
	NotFound { resource: String, name: String },

	#[error("serializing {name} as YAML")]
	Yaml {
		name: String,
		#[source]
		source: serde_yaml::Error,
	},
}

/// Sorted-key YAML of the part of an object that describes its desired
/// state: `data` of a ControllerRevision, `spec` otherwise, or everything
/// except `metadata` and `status` when there is neither.
pub fn canonical_text(tree: &Value) -> Result<String, serde_yaml::Error> {
	let revision_data = tree
		.get("data")
		.filter(|_| tree::kind(tree) == "ControllerRevision");
	let content = match revision_data.or_else(|| tree.get("spec")) {
		Some(content) => sorted(content),
		None => {
			let mut rest = sorted(tree);
			if let Some(obj) = rest.as_object_mut() {
				obj.remove("metadata");
				obj.remove("status");
			}
			rest
		}
	};
	serde_yaml::to_string(&content)
}

fn sorted(value: &Value) -> Value {
	match value {
		Value::Object(obj) => {
			let mut entries: Vec<_> = obj.iter().collect();
			entries.sort_by(|a, b| a.0.cmp(b.0));
			Value::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k.clone(), sorted(v)))
					.collect::<Map<_, _>>(),
			)
		}
		Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
		other => other.clone(),
	}
}

/// Unified diff (three lines of context) from `from` to `to`. Empty when
/// both revisions serialize identically.
pub fn diff_trees(from: &Value, to: &Value) -> Result<String, DiffError> {
	let text = |tree: &Value| {
		canonical_text(tree).map_err(|source| DiffError::Yaml {
			name: tree::name(tree).to_string(),
			source,
		})
	};
	let (old, new) = (text(from)?, text(to)?);
	if old == new {
		return Ok(String::new());
	}
	Ok(TextDiff::from_lines(&old, &new)
		.unified_diff()
		.context_radius(3)
		.header(
			&format!("a/{}", tree::name(from)),
			&format!("b/{}", tree::name(to)),
		)
		.to_string())
}

/// Fetch two objects of one resource type and diff them.
#[instrument(skip(resolver))]
pub fn unified_diff(
	resolver: &Resolver<'_>,
	resource: &str,
	namespace: &str,
	from: &str,
	to: &str,
) -> Result<String, DiffError> {
	let fetch = |name: &str| {
		resolver
			.resolve_ad_hoc(namespace, &[resource, name])
			.into_iter()
			.next()
			.ok_or_else(|| DiffError::NotFound {
				resource: resource.to_string(),
				name: name.to_string(),
			})
	};
	diff_trees(&fetch(from)?, &fetch(to)?)
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use serde_json::json;

	use super::*;

	fn revision(name: &str, image: &str) -> Value {
		json!({
			"apiVersion": "apps/v1",
			"kind": "ControllerRevision",
			"metadata": {"name": name},
			"revision": 1,
			"data": {"spec": {"template": {"spec": {"containers": [{"name": "db", "image": image}]}}}}
		})
	}

	#[test]
	fn test_canonical_text_sorts_keys() {
		let tree = json!({"kind": "Deployment", "metadata": {"name": "a"}, "spec": {"b": 1, "a": {"d": 2, "c": 3}}});
		assert_eq!(
			canonical_text(&tree).unwrap(),
			indoc! {"
				a:
				  c: 3
				  d: 2
				b: 1
			"}
		);
	}

	#[test]
	fn test_canonical_text_without_spec() {
		let tree = json!({"kind": "ConfigMap", "metadata": {"name": "a"}, "data": {"k": "v"}, "status": {}});
		assert_eq!(
			canonical_text(&tree).unwrap(),
			indoc! {"
				data:
				  k: v
				kind: ConfigMap
			"}
		);
	}

	#[test]
	fn test_diff_revisions() {
		let diff = diff_trees(&revision("db-1", "pg:15"), &revision("db-2", "pg:16")).unwrap();
		assert!(diff.starts_with("--- a/db-1\n+++ b/db-2\n"), "{diff}");
		let changed = |tag: char, image: &str| {
			diff.lines()
				.any(|l| l.starts_with(tag) && l.ends_with(&format!("image: {image}")))
		};
		assert!(changed('-', "pg:15"), "{diff}");
		assert!(changed('+', "pg:16"), "{diff}");
	}

	#[test]
	fn test_identical_revisions_have_empty_diff() {
		let diff = diff_trees(&revision("db-1", "pg:15"), &revision("db-2", "pg:15")).unwrap();
		assert_eq!(diff, "");
	}
}
