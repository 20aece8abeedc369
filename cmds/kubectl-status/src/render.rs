//! The per-object pipeline: snapshot, augment, select a rule, render. The
//! [`Renderer`] is also the cluster-backed [`Bindings`] rules see, so inline
//! renders run the same pipeline recursively.

use std::{cell::Cell, collections::BTreeMap, fmt::Write as _, path::Path};

use kube::api::ListParams;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
	augment::Augmentors,
	error::{LocalRenderError, ObjectError},
	k8s::{client::ClusterConnection, manifest::read_manifests, resolver::Resolver},
	rules::{
		event_list, involved_object_selector, services_matching_pod, sort_by_creation, BindingError,
		Bindings, NoopBindings, RenderContext, RenderOptions, RuleSet,
	},
	tree,
};

/// How deep `renderInline` may nest before giving up.
pub const MAX_INLINE_DEPTH: usize = 8;

/// A report and the reason it is incomplete, if any. After an augmentation
/// failure the text is empty; after a render failure it holds the partial
/// output.
#[derive(Debug)]
pub struct Rendered {
	pub text: String,
	pub error: Option<ObjectError>,
}

pub struct Renderer<'a> {
	resolver: Resolver<'a>,
	augmentors: &'a Augmentors<ClusterConnection>,
	rules: &'a RuleSet,
	options: &'a RenderOptions,
	depth: Cell<usize>,
}

impl<'a> Renderer<'a> {
	pub fn new(
		cluster: &'a ClusterConnection,
		augmentors: &'a Augmentors<ClusterConnection>,
		rules: &'a RuleSet,
		options: &'a RenderOptions,
	) -> Self {
		Self {
			resolver: Resolver::new(cluster),
			augmentors,
			rules,
			options,
			depth: Cell::new(0),
		}
	}

	/// Run the whole pipeline for one object. The input tree is left as
	/// fetched; augmentors write into a copy.
	#[instrument(skip_all, fields(kind = %tree::kind(source), name = %tree::name(source)))]
	pub fn render_tree(&self, source: &Value) -> Rendered {
		let kind = tree::kind(source);
		let name = tree::name(source);

		let mut augmented = source.clone();
		if let Err(error) =
			self.augmentors
				.augment(kind, source, self.resolver.cluster(), &mut augmented)
		{
			return Rendered {
				text: String::new(),
				error: Some(ObjectError::Augment {
					kind: kind.to_string(),
					name: name.to_string(),
					source: error,
				}),
			};
		}

		let context = RenderContext {
			bindings: self,
			options: self.options,
		};
		let mut text = String::new();
		let error = self
			.rules
			.render(self.rules.select_rule(kind), &augmented, &context, &mut text)
			.err()
			.map(|error| ObjectError::Render {
				kind: kind.to_string(),
				name: name.to_string(),
				source: error,
			});
		Rendered { text, error }
	}

	fn list_or_empty(&self, resource: &str, namespace: Option<&str>, params: &ListParams) -> Vec<Value> {
		self.resolver
			.list(resource, namespace, params)
			.unwrap_or_else(|error| {
				debug!(error = %error, resource, "lookup failed");
				Vec::new()
			})
	}
}

impl Bindings for Renderer<'_> {
	fn fetch_by_scope(&self, namespace: &str, args: &[String]) -> Vec<Value> {
		self.resolver.resolve_ad_hoc(namespace, args)
	}

	fn fetch_by_label_set(
		&self,
		namespace: &str,
		kind: &str,
		labels: &BTreeMap<String, String>,
	) -> Vec<Value> {
		let params = ListParams::default().labels(&k8s::labels_to_selector(labels));
		let namespace = (!namespace.is_empty()).then_some(namespace);
		self.list_or_empty(kind, namespace, &params)
	}

	fn fetch_services_matching_pod(&self, pod: &Value) -> Vec<Value> {
		let services = self.list_or_empty("services", tree::namespace(pod), &ListParams::default());
		services_matching_pod(services, pod)
	}

	fn fetch_events(&self, object: &Value) -> Value {
		let params = ListParams::default().fields(&involved_object_selector(object));
		let events = self.list_or_empty("events", tree::namespace(object), &params);
		event_list(object, events)
	}

	fn render_inline(&self, namespace: &str, args: &[String]) -> Result<String, BindingError> {
		if namespace.is_empty() && args.is_empty() {
			return Ok(String::new());
		}
		let depth = self.depth.get();
		if depth >= MAX_INLINE_DEPTH {
			return Err(BindingError::TooDeep(MAX_INLINE_DEPTH));
		}

		let mut objects = self.resolver.resolve_ad_hoc(namespace, args);
		sort_by_creation(&mut objects);

		self.depth.set(depth + 1);
		let mut out = String::new();
		for object in &objects {
			let rendered = self.render_tree(object);
			if let Some(error) = &rendered.error {
				warn!(error = %error, "inline render incomplete");
			}
			out.push('\n');
			out.push_str(&rendered.text);
		}
		self.depth.set(depth);
		Ok(out)
	}
}

/// Render manifest files without a cluster: no augmentation, and every
/// data function answers with nothing.
#[instrument(skip(options), fields(path = %path.display()))]
pub fn render_local_file(path: &Path, options: &RenderOptions) -> Result<String, LocalRenderError> {
	let rules = RuleSet::builtin()?;
	let context = RenderContext {
		bindings: &NoopBindings,
		options,
	};

	let mut out = String::new();
	for (index, object) in read_manifests(path)?.iter().enumerate() {
		tree::validate(object).map_err(|source| LocalRenderError::Invalid {
			path: path.display().to_string(),
			index,
			source,
		})?;
		let kind = tree::kind(object);
		let mut report = String::new();
		rules
			.render(rules.select_rule(kind), object, &context, &mut report)
			.map_err(|source| LocalRenderError::Render {
				kind: kind.to_string(),
				name: tree::name(object).to_string(),
				source,
			})?;
		let _ = write!(out, "\n{report}\n");
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use std::io::Write as _;

	use assert_matches::assert_matches;
	use indoc::indoc;

	use super::*;

	fn options() -> RenderOptions {
		RenderOptions {
			color: false,
			now: "2024-05-01T12:00:00Z".parse().unwrap(),
		}
	}

	fn manifest(content: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(content.as_bytes()).unwrap();
		file
	}

	#[test]
	fn test_local_render_joins_reports() {
		let file = manifest(indoc! {"
			apiVersion: v1
			kind: ConfigMap
			metadata:
			  name: settings
			  namespace: shop
			  creationTimestamp: '2024-05-01T11:00:00Z'
			---
			apiVersion: v1
			kind: Namespace
			metadata:
			  name: shop
			status:
			  phase: Active
		"});
		let out = render_local_file(file.path(), &options()).unwrap();
		assert_eq!(
			out,
			"\nConfigMap/settings -n shop, created 60m ago\n\nNamespace/shop Active\n"
		);
	}

	#[test]
	fn test_local_render_flattens_lists() {
		let file = manifest(
			r#"{"apiVersion": "v1", "kind": "List", "items": [
				{"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "a"}},
				{"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "b"}}
			]}"#,
		);
		let out = render_local_file(file.path(), &options()).unwrap();
		assert_eq!(out, "\nSecret/a\n\nSecret/b\n");
	}

	#[test]
	fn test_local_render_owner_inline_is_empty() {
		let file = manifest(indoc! {"
			apiVersion: apps/v1
			kind: ReplicaSet
			metadata:
			  name: web-abc
			  ownerReferences:
			  - kind: Deployment
			    name: web
			spec:
			  replicas: 0
		"});
		let out = render_local_file(file.path(), &options()).unwrap();
		assert_eq!(out, "\nReplicaSet/web-abc\n");
	}

	#[test]
	fn test_local_render_rejects_incomplete_objects() {
		let file = manifest("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n");
		let err = render_local_file(file.path(), &options()).unwrap_err();
		assert_matches!(err, LocalRenderError::Invalid { index: 0, .. });
	}

	#[test]
	fn test_local_render_missing_file() {
		let err = render_local_file(Path::new("/nonexistent/manifest.yaml"), &options()).unwrap_err();
		assert_matches!(err, LocalRenderError::Manifest(_));
	}
}
