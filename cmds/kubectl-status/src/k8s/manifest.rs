//! Reading resource manifests from files.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error("reading {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("parsing {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml::Error,
	},
}

/// Read every object of a YAML or JSON file. Multi-document files and `List`
/// objects are flattened; empty documents are skipped.
pub fn read_manifests(path: &Path) -> Result<Vec<serde_json::Value>, ManifestError> {
	let source = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	parse_manifests(&source).map_err(|source| ManifestError::Parse {
		path: path.to_path_buf(),
		source,
	})
}

pub fn parse_manifests(source: &str) -> Result<Vec<serde_json::Value>, serde_yaml::Error> {
	let mut objects = Vec::new();
	for document in serde_yaml::Deserializer::from_str(source) {
		let value = serde_json::Value::deserialize(document)?;
		flatten_into(value, &mut objects);
	}
	Ok(objects)
}

fn flatten_into(value: serde_json::Value, out: &mut Vec<serde_json::Value>) {
	match value {
		serde_json::Value::Null => {}
		serde_json::Value::Object(mut obj)
			if obj
				.get("kind")
				.and_then(|k| k.as_str())
				.is_some_and(|k| k.ends_with("List"))
				&& obj.get("items").is_some_and(serde_json::Value::is_array) =>
		{
			if let Some(serde_json::Value::Array(items)) = obj.remove("items") {
				for item in items {
					flatten_into(item, out);
				}
			}
		}
		other => out.push(other),
	}
}

#[cfg(test)]
mod tests {
	use indoc::indoc;

	use super::*;

	#[test]
	fn test_multi_document() {
		let objects = parse_manifests(indoc! {"
			apiVersion: v1
			kind: ConfigMap
			metadata:
			  name: a
			---
			apiVersion: v1
			kind: ConfigMap
			metadata:
			  name: b
		"})
		.unwrap();
		let names: Vec<_> = objects
			.iter()
			.map(|o| o["metadata"]["name"].as_str().unwrap())
			.collect();
		assert_eq!(names, ["a", "b"]);
	}

	#[test]
	fn test_list_is_flattened() {
		let objects = parse_manifests(
			r#"{"apiVersion": "v1", "kind": "List", "items": [
				{"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "a"}},
				{"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "b"}}
			]}"#,
		)
		.unwrap();
		assert_eq!(objects.len(), 2);
		assert_eq!(objects[1]["metadata"]["name"], "b");
	}

	#[test]
	fn test_key_order_preserved() {
		let objects = parse_manifests("kind: Pod\napiVersion: v1\nmetadata: {name: a}\n").unwrap();
		let keys: Vec<_> = objects[0].as_object().unwrap().keys().collect();
		assert_eq!(keys, ["kind", "apiVersion", "metadata"]);
	}

	#[test]
	fn test_invalid_yaml() {
		assert!(parse_manifests("kind: [unclosed").is_err());
	}
}
