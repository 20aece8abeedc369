use serde_json::{json, Value};
use tracing::debug;

use super::{stats, AugmentError};
use crate::{k8s::client::ClusterConnection, tree};

/// `podMetrics`: per-container usage taken from the summary of the pod's
/// node. Unscheduled pods, and pods the kubelet does not report, are left
/// alone.
pub fn pod_metrics(
	source: &Value,
	cluster: &ClusterConnection,
	tree: &mut Value,
) -> Result<(), AugmentError> {
	let Some(node) = tree::str_at(source, "/spec/nodeName").filter(|n| !n.is_empty()) else {
		return Ok(());
	};
	let summary = stats::fetch_summary(cluster, node).map_err(|source| AugmentError::Stats {
		node: node.to_string(),
		source,
	})?;

	let namespace = tree::namespace(source).unwrap_or_default();
	let Some(pod) = summary.pod(namespace, tree::name(source)) else {
		debug!(node, "pod missing from usage summary");
		return Ok(());
	};
	let containers: Vec<_> = pod
		.containers
		.iter()
		.map(|c| {
			json!({
				"name": c.name,
				"cpuUsageNanoCores": c.cpu.as_ref().and_then(|c| c.usage_nano_cores),
				"memoryWorkingSetBytes": c.memory.as_ref().and_then(|m| m.working_set_bytes),
			})
		})
		.collect();
	tree::inject(tree, "podMetrics", json!({ "containers": containers }));
	Ok(())
}
