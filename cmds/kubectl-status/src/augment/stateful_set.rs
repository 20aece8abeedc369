use kube::api::ListParams;
use serde_json::Value;

use super::AugmentError;
use crate::{
	diff,
	k8s::{client::ClusterConnection, resolver::Resolver},
	tree,
};

/// `revisionDiff`: what changed between the previous and the latest
/// ControllerRevision of the set.
pub fn revision_diff(
	source: &Value,
	cluster: &ClusterConnection,
	tree: &mut Value,
) -> Result<(), AugmentError> {
	let uid = tree::str_at(source, "/metadata/uid").unwrap_or_default();
	let namespace = tree::namespace(source).unwrap_or_default();
	let resolver = Resolver::new(cluster);
	let revisions = resolver
		.list("controllerrevisions", Some(namespace), &ListParams::default())
		.map_err(|source| AugmentError::Lookup {
			what: "controllerrevisions",
			source,
		})?;

	let mut owned: Vec<_> = revisions
		.iter()
		.filter(|r| is_owned_by(r, uid))
		.map(|r| (r.get("revision").and_then(Value::as_i64).unwrap_or_default(), tree::name(r)))
		.collect();
	owned.sort_unstable();
	let [.., (_, previous), (_, latest)] = owned.as_slice() else {
		return Ok(());
	};

	let text = diff::unified_diff(&resolver, "controllerrevisions", namespace, previous, latest)?;
	tree::inject(tree, "revisionDiff", Value::String(text));
	Ok(())
}

fn is_owned_by(object: &Value, uid: &str) -> bool {
	object
		.pointer("/metadata/ownerReferences")
		.and_then(Value::as_array)
		.is_some_and(|owners| owners.iter().any(|o| o["uid"] == uid))
}
