//! Human-readable status reports for Kubernetes resources.
//!
//! Objects are resolved from the cluster (or read from manifests), enriched
//! by kind-specific augmentors, and rendered by the rule for their kind.

pub mod augment;
pub mod diff;
pub mod error;
pub mod k8s;
pub mod output;
pub mod query;
pub mod render;
pub mod rollout;
pub mod rules;
pub mod telemetry;
pub mod tree;

pub use self::{
	error::{FetchError, LocalRenderError, ObjectError, QueryError, ResolutionError},
	query::{QueryScope, ResourceStatusQuery},
	render::render_local_file,
	rules::RenderOptions,
};
