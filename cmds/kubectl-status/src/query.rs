//! The entry point: what to show, and writing every report.

use std::{io::Write, path::PathBuf};

use bon::Builder;
use tracing::{info, instrument};

use crate::{
	augment::Augmentors,
	error::{ObjectError, QueryError},
	k8s::{client::ClusterConnection, resolver::Resolver},
	render::Renderer,
	rules::{CompileError, RenderOptions, RuleSet},
};

/// Which objects a query is about, as given on the command line.
#[derive(Debug, Clone, Default, Builder)]
pub struct QueryScope {
	/// Explicit namespace; the context default is used otherwise.
	#[builder(into)]
	pub namespace: Option<String>,
	#[builder(default)]
	pub all_namespaces: bool,
	/// Refuse file objects whose namespace differs from the scope's.
	#[builder(default)]
	pub enforce_namespace: bool,
	#[builder(default)]
	pub filenames: Vec<PathBuf>,
	#[builder(into)]
	pub label_selector: Option<String>,
	#[builder(into)]
	pub field_selector: Option<String>,
	/// `TYPE[/NAME]` arguments.
	#[builder(default)]
	pub args: Vec<String>,
}

impl QueryScope {
	/// Informational line printed when nothing matched.
	pub fn no_resources_message(&self) -> String {
		match &self.namespace {
			Some(namespace) if !self.all_namespaces => {
				format!("No resources found in {namespace} namespace.")
			}
			_ => "No resources found.".to_string(),
		}
	}
}

pub struct ResourceStatusQuery<'a> {
	cluster: &'a ClusterConnection,
	scope: QueryScope,
	options: RenderOptions,
	rules: RuleSet,
	augmentors: Augmentors<ClusterConnection>,
}

impl<'a> ResourceStatusQuery<'a> {
	pub fn new(
		cluster: &'a ClusterConnection,
		scope: QueryScope,
		options: RenderOptions,
	) -> Result<Self, CompileError> {
		Ok(Self {
			cluster,
			scope,
			options,
			rules: RuleSet::builtin()?,
			augmentors: Augmentors::builtin(),
		})
	}

	pub fn scope(&self) -> &QueryScope {
		&self.scope
	}

	/// Resolve, augment and render every object in resolution order, writing
	/// each report as `"\n{report}\n"`. Partial reports are written too.
	/// Returns the objects that failed; only resolution and write failures
	/// abort.
	#[instrument(skip_all)]
	pub fn render_all<W: Write>(&self, writer: &mut W) -> Result<Vec<ObjectError>, QueryError> {
		let resolved = Resolver::new(self.cluster).resolve(&self.scope)?;
		let mut errors: Vec<ObjectError> = resolved.errors.into_iter().map(ObjectError::from).collect();

		if resolved.objects.is_empty() {
			if errors.is_empty() {
				writeln!(writer, "{}", self.scope.no_resources_message())?;
			}
			return Ok(errors);
		}
		info!(objects = resolved.objects.len(), "rendering");

		let renderer = Renderer::new(self.cluster, &self.augmentors, &self.rules, &self.options);
		for object in &resolved.objects {
			let rendered = renderer.render_tree(object);
			if rendered.error.is_none() || !rendered.text.is_empty() {
				write!(writer, "\n{}\n", rendered.text)?;
			}
			errors.extend(rendered.error);
		}
		writer.flush()?;
		Ok(errors)
	}
}
