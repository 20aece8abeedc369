//! The kubelet usage summary (`/stats/summary`), reached through the API
//! server's node proxy.

use serde::Deserialize;

use crate::k8s::client::{ClusterConnection, RequestError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
	pub node: NodeStats,
	#[serde(default)]
	pub pods: Vec<PodStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
	pub node_name: String,
	pub cpu: Option<CpuStats>,
	pub memory: Option<MemoryStats>,
	pub fs: Option<FsStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStats {
	pub pod_ref: PodReference,
	#[serde(default)]
	pub containers: Vec<ContainerStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodReference {
	pub name: String,
	pub namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerStats {
	pub name: String,
	pub cpu: Option<CpuStats>,
	pub memory: Option<MemoryStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
	pub usage_nano_cores: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
	pub working_set_bytes: Option<u64>,
	pub available_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsStats {
	pub used_bytes: Option<u64>,
	pub capacity_bytes: Option<u64>,
}

pub fn summary_path(node: &str) -> String {
	format!("/api/v1/nodes/{node}/proxy/stats/summary")
}

pub fn fetch_summary(cluster: &ClusterConnection, node: &str) -> Result<Summary, RequestError> {
	cluster.get_raw(&summary_path(node))
}

impl Summary {
	pub fn pod(&self, namespace: &str, name: &str) -> Option<&PodStats> {
		self.pods
			.iter()
			.find(|p| p.pod_ref.namespace == namespace && p.pod_ref.name == name)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_decode_summary() {
		let summary: Summary = serde_json::from_value(json!({
			"node": {
				"nodeName": "node-1",
				"cpu": {"usageNanoCores": 250_000_000},
				"memory": {"workingSetBytes": 1024, "availableBytes": 4096},
				"systemContainers": []
			},
			"pods": [{
				"podRef": {"name": "web", "namespace": "default", "uid": "u1"},
				"containers": [{"name": "web", "cpu": {"usageNanoCores": 1000}}]
			}]
		}))
		.unwrap();
		assert_eq!(summary.node.node_name, "node-1");
		assert!(summary.node.fs.is_none());
		let pod = summary.pod("default", "web").unwrap();
		assert_eq!(pod.containers[0].cpu.as_ref().unwrap().usage_nano_cores, Some(1000));
		assert!(summary.pod("other", "web").is_none());
	}
}
