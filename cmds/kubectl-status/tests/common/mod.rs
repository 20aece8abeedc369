//! A mock API server plus a connection to it, for tests that drive the
//! blocking cluster client.

use k8s_mock::{HttpMockK8sServer, RunningHttpMockK8sServer};
use kubectl_status::{k8s::client::ClusterConnection, RenderOptions};
use tokio::runtime::Runtime;

pub const NOW: &str = "2024-05-01T12:00:00Z";

pub struct MockCluster {
	runtime: Runtime,
	server: RunningHttpMockK8sServer,
}

impl MockCluster {
	pub fn start(server: HttpMockK8sServer) -> Self {
		let runtime = Runtime::new().expect("runtime");
		let server = runtime.block_on(server.start());
		Self { runtime, server }
	}

	pub fn connect(&self) -> ClusterConnection {
		ClusterConnection::from_kubeconfig(self.server.kubeconfig(), None)
			.expect("connection should succeed")
	}

	pub fn received_paths(&self) -> Vec<String> {
		self.runtime.block_on(self.server.received_paths())
	}

	pub fn field_selectors(&self, path: &str) -> Vec<String> {
		self.runtime.block_on(self.server.field_selectors(path))
	}
}

pub fn options() -> RenderOptions {
	RenderOptions {
		color: false,
		now: NOW.parse().expect("timestamp"),
	}
}
