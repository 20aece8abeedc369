//! Per-kind enrichment of object trees with facts that need extra cluster
//! reads.
//!
//! Augmentors run in registration order; the first failure stops the chain
//! for that object. They only ever add top-level keys.

mod ingress;
mod node;
mod pod;
mod stateful_set;
pub mod stats;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
	diff::DiffError,
	error::{FetchError, ResolutionError},
	k8s::client::{ClusterConnection, RequestError},
	tree::ConversionError,
};

#[derive(Debug, Error)]
pub enum AugmentError {
	#[error("listing {what}")]
	Lookup {
		what: &'static str,
		#[source]
		source: ResolutionError,
	},

	#[error("fetching usage summary of node {node}")]
	Stats {
		node: String,
		#[source]
		source: RequestError,
	},

	#[error(transparent)]
	Fetch(#[from] FetchError),

	#[error("diffing revisions")]
	Diff(#[from] DiffError),

	#[error(transparent)]
	Conversion(#[from] ConversionError),
}

/// An enrichment step: reads the source snapshot, may query the cluster,
/// and adds keys to the tree.
pub type Augmentor<C> = Box<dyn Fn(&Value, &C, &mut Value) -> Result<(), AugmentError>>;

/// Ordered augmentors per kind.
pub struct Augmentors<C> {
	by_kind: BTreeMap<String, Vec<(&'static str, Augmentor<C>)>>,
}

impl<C> Default for Augmentors<C> {
	fn default() -> Self {
		Self {
			by_kind: BTreeMap::new(),
		}
	}
}

impl<C> Augmentors<C> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append an augmentor to the chain of `kind`.
	pub fn register<F>(&mut self, kind: &str, name: &'static str, augmentor: F) -> &mut Self
	where
		F: Fn(&Value, &C, &mut Value) -> Result<(), AugmentError> + 'static,
	{
		self.by_kind
			.entry(kind.to_string())
			.or_default()
			.push((name, Box::new(augmentor)));
		self
	}

	/// Names of the augmentors registered for `kind`, in order.
	pub fn registered(&self, kind: &str) -> Vec<&'static str> {
		self.by_kind
			.get(kind)
			.map(|chain| chain.iter().map(|(name, _)| *name).collect())
			.unwrap_or_default()
	}

	/// Run the chain of `kind` over `tree`. Kinds without augmentors are left
	/// untouched.
	#[instrument(skip_all, fields(kind = %kind))]
	pub fn augment(
		&self,
		kind: &str,
		source: &Value,
		cluster: &C,
		tree: &mut Value,
	) -> Result<(), AugmentError> {
		for (name, augmentor) in self.by_kind.get(kind).into_iter().flatten() {
			debug!(augmentor = name, "augmenting");
			augmentor(source, cluster, tree)?;
		}
		Ok(())
	}
}

impl Augmentors<ClusterConnection> {
	/// The augmentors used against a live cluster.
	pub fn builtin() -> Self {
		let mut augmentors = Self::new();
		augmentors
			.register("Node", "podsOnNode", node::pods_on_node)
			.register("Node", "nodeStats", node::node_stats)
			.register("Pod", "podMetrics", pod::pod_metrics)
			.register("StatefulSet", "revisionDiff", stateful_set::revision_diff)
			.register("Ingress", "ingressServices", ingress::ingress_services);
		augmentors
	}
}

#[cfg(test)]
mod tests {
	use std::{cell::Cell, rc::Rc};

	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::tree;

	#[test]
	fn test_builtin_registrations() {
		let augmentors = Augmentors::<ClusterConnection>::builtin();
		assert_eq!(augmentors.registered("Node"), ["podsOnNode", "nodeStats"]);
		assert_eq!(augmentors.registered("Pod"), ["podMetrics"]);
		assert!(augmentors.registered("ConfigMap").is_empty());
	}

	#[test]
	fn test_unregistered_kind_is_untouched() {
		let augmentors = Augmentors::<()>::new();
		let source = json!({"kind": "ConfigMap", "metadata": {"name": "c"}});
		let mut tree = source.clone();
		augmentors.augment("ConfigMap", &source, &(), &mut tree).unwrap();
		assert_eq!(tree, source);
	}

	#[test]
	fn test_first_failure_stops_chain() {
		let last_ran = Rc::new(Cell::new(false));
		let flag = Rc::clone(&last_ran);
		let mut augmentors = Augmentors::<()>::new();
		augmentors
			.register("Widget", "first", |_, (), tree| {
				tree::inject(tree, "first", json!(true));
				Ok(())
			})
			.register("Widget", "failing", |_, (), _| {
				Err(ConversionError::MissingKind.into())
			})
			.register("Widget", "last", move |_, (), _| {
				flag.set(true);
				Ok(())
			});

		let source = json!({"kind": "Widget", "metadata": {"name": "w"}});
		let mut tree = source.clone();
		let result = augmentors.augment("Widget", &source, &(), &mut tree);

		assert_matches!(result, Err(AugmentError::Conversion(ConversionError::MissingKind)));
		assert!(!last_ran.get());
		assert_eq!(tree["first"], true);
	}
}
