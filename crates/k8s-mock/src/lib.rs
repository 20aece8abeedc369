//! Mock Kubernetes API server for testing.
//!
//! Serves discovery plus read-only GET/LIST of a fixed set of manifests over
//! real HTTP, so tests can connect through an ordinary kubeconfig.

pub mod discovery;
pub mod http;

pub use discovery::{DiscoveryMode, MockApiResource, MockDiscovery};
pub use http::{HttpMockK8sServer, RunningHttpMockK8sServer};
