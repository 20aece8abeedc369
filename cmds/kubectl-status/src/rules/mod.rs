//! The rule library: one [`Rule`] per resource kind, selected by exact kind
//! with a `DefaultResource` fallback. Rules write their report through a
//! [`RenderContext`], which carries the data-access bindings and the render
//! options; nothing about a render is global.

mod bindings;
mod format;
mod kinds;
mod sections;

use std::{collections::BTreeMap, fmt};

use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

pub use self::{
	bindings::{
		event_list, involved_object_selector, services_matching_pod, sort_by_creation, BindingError, Bindings,
		NoopBindings,
	},
	format::{human_duration, humanize_bytes, is_condition_healthy, milli_cores},
};

pub const DEFAULT_RULE: &str = "DefaultResource";

#[derive(Debug, Error)]
pub enum CompileError {
	#[error("rule {0} is registered twice")]
	Duplicate(String),

	#[error("rule table has no {DEFAULT_RULE} rule")]
	MissingDefault,
}

#[derive(Debug, Error)]
pub enum RenderError {
	#[error(transparent)]
	Binding(#[from] BindingError),

	#[error("no rule named {0}")]
	UnknownRule(String),

	#[error("formatting report")]
	Format(#[from] fmt::Error),
}

/// Per-invocation rendering settings.
#[derive(Debug, Clone)]
pub struct RenderOptions {
	pub color: bool,
	/// Clock for relative ages.
	pub now: jiff::Timestamp,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			color: false,
			now: jiff::Timestamp::now(),
		}
	}
}

/// Everything a rule can reach while it runs.
pub struct RenderContext<'a> {
	pub bindings: &'a dyn Bindings,
	pub options: &'a RenderOptions,
}

/// Rendering logic for one kind. The report starts with its header line and
/// never ends with a newline; on failure `out` keeps what was written.
pub trait Rule {
	fn render(&self, tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Result<(), RenderError>;
}

impl<F> Rule for F
where
	F: Fn(&Value, &RenderContext<'_>, &mut String) -> Result<(), RenderError>,
{
	fn render(&self, tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Result<(), RenderError> {
		self(tree, cx, out)
	}
}

pub struct RuleSet {
	rules: BTreeMap<String, Box<dyn Rule>>,
}

impl fmt::Debug for RuleSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.rules.keys()).finish()
	}
}

impl RuleSet {
	/// Build a rule set from `(kind, rule)` entries. Every kind may appear
	/// once, and the table must carry a [`DEFAULT_RULE`] entry.
	pub fn compile<I>(table: I) -> Result<Self, CompileError>
	where
		I: IntoIterator<Item = (&'static str, Box<dyn Rule>)>,
	{
		let mut rules = BTreeMap::new();
		for (kind, rule) in table {
			if rules.insert(kind.to_string(), rule).is_some() {
				return Err(CompileError::Duplicate(kind.to_string()));
			}
		}
		if !rules.contains_key(DEFAULT_RULE) {
			return Err(CompileError::MissingDefault);
		}
		Ok(Self { rules })
	}

	/// The rules shipped with the binary.
	pub fn builtin() -> Result<Self, CompileError> {
		Self::compile(kinds::builtin())
	}

	/// The rule for `kind`, or the default rule.
	pub fn select_rule<'a>(&'a self, kind: &'a str) -> &'a str {
		if self.rules.contains_key(kind) {
			kind
		} else {
			DEFAULT_RULE
		}
	}

	/// Execute `rule` for `tree`. On failure `out` holds the partial report.
	#[instrument(skip_all, fields(rule = %rule))]
	pub fn render(
		&self,
		rule: &str,
		tree: &Value,
		cx: &RenderContext<'_>,
		out: &mut String,
	) -> Result<(), RenderError> {
		let Some(found) = self.rules.get(rule) else {
			return Err(RenderError::UnknownRule(rule.to_string()));
		};
		found.render(tree, cx, out)
	}
}
