use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use serde_json::{json, Value};

use super::{stats, AugmentError};
use crate::{
	k8s::{client::ClusterConnection, resolver::Resolver},
	tree,
};

/// `podsOnNode`: every pod scheduled on the node, in all namespaces.
pub fn pods_on_node(
	source: &Value,
	cluster: &ClusterConnection,
	tree: &mut Value,
) -> Result<(), AugmentError> {
	let node = tree::name(source);
	let params = ListParams::default().fields(&format!("spec.nodeName={node}"));
	let pods = Resolver::new(cluster)
		.list("pods", None, &params)
		.map_err(|source| AugmentError::Lookup {
			what: "pods",
			source,
		})?;

	let summaries = pods
		.iter()
		.map(|pod| tree::to_typed::<Pod>(pod).map(|pod| pod_summary(&pod)))
		.collect::<Result<Vec<_>, _>>()?;
	tree::inject(tree, "podsOnNode", Value::Array(summaries));
	Ok(())
}

fn pod_summary(pod: &Pod) -> Value {
	let status = pod.status.clone().unwrap_or_default();
	let containers = pod.spec.as_ref().map_or(0, |s| s.containers.len());
	let statuses = status.container_statuses.unwrap_or_default();
	let ready = statuses.iter().filter(|s| s.ready).count();
	let restarts: i64 = statuses.iter().map(|s| i64::from(s.restart_count)).sum();
	json!({
		"namespace": pod.metadata.namespace.as_deref().unwrap_or_default(),
		"name": pod.metadata.name.as_deref().unwrap_or_default(),
		"phase": status.phase.unwrap_or_default(),
		"ready": format!("{ready}/{containers}"),
		"restarts": restarts,
	})
}

/// `nodeStats`: node-level usage from the kubelet summary.
pub fn node_stats(
	source: &Value,
	cluster: &ClusterConnection,
	tree: &mut Value,
) -> Result<(), AugmentError> {
	let node = tree::name(source);
	let summary = stats::fetch_summary(cluster, node).map_err(|source| AugmentError::Stats {
		node: node.to_string(),
		source,
	})?;

	let stats = &summary.node;
	let cpu = stats.cpu.as_ref().and_then(|c| c.usage_nano_cores);
	let memory = stats.memory.as_ref();
	let fs = stats.fs.as_ref();
	tree::inject(
		tree,
		"nodeStats",
		json!({
			"cpuUsageNanoCores": cpu,
			"memoryWorkingSetBytes": memory.and_then(|m| m.working_set_bytes),
			"memoryAvailableBytes": memory.and_then(|m| m.available_bytes),
			"fsUsedBytes": fs.and_then(|f| f.used_bytes),
			"fsCapacityBytes": fs.and_then(|f| f.capacity_bytes),
		}),
	);
	Ok(())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_pod_summary() {
		let pod: Pod = tree::to_typed(&json!({
			"apiVersion": "v1",
			"kind": "Pod",
			"metadata": {"name": "web", "namespace": "shop"},
			"spec": {"containers": [{"name": "a"}, {"name": "b"}]},
			"status": {
				"phase": "Running",
				"containerStatuses": [
					{"name": "a", "ready": true, "restartCount": 2, "image": "x", "imageID": ""},
					{"name": "b", "ready": false, "restartCount": 1, "image": "y", "imageID": ""}
				]
			}
		}))
		.unwrap();
		assert_eq!(
			pod_summary(&pod),
			json!({"namespace": "shop", "name": "web", "phase": "Running", "ready": "1/2", "restarts": 3})
		);
	}
}
