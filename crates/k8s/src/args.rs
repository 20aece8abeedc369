//! kubectl-style `TYPE[,TYPE] [NAME...]` / `TYPE/NAME` argument parsing.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
	#[error("you must specify the type of resource to get")]
	Empty,

	#[error(
		"there is no need to specify a resource type as a separate argument when passing \
		 arguments in resource/name form (e.g. 'kubectl-status deployment/nginx')"
	)]
	MixedForms,

	#[error("arguments in resource/name form must have a single resource and name, got `{0}`")]
	InvalidPair(String),

	#[error("names cannot be given with multiple resource types: `{0}`")]
	NamesWithMultipleTypes(String),

	#[error("resource type must not be empty in `{0}`")]
	EmptyType(String),
}

/// One resource (optionally one named object of it) requested on the
/// command line or by a template lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
	/// Type as written by the user: kind, plural, singular or short name,
	/// optionally `.group` qualified.
	pub resource: String,
	/// `None` lists every object of the type.
	pub name: Option<String>,
}

impl ResourceRequest {
	pub fn all(resource: impl Into<String>) -> Self {
		Self {
			resource: resource.into(),
			name: None,
		}
	}

	pub fn named(resource: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			resource: resource.into(),
			name: Some(name.into()),
		}
	}
}

/// Parse positional arguments into resource requests.
///
/// Accepted forms:
/// - `TYPE[,TYPE...]`: every object of each type
/// - `TYPE NAME [NAME...]`: the named objects of one type
/// - `TYPE/NAME [TYPE/NAME...]`: each pair
pub fn parse_type_or_name_args<S: AsRef<str>>(
	args: &[S],
) -> Result<Vec<ResourceRequest>, ArgsError> {
	let args: Vec<&str> = args
		.iter()
		.map(AsRef::as_ref)
		.filter(|a| !a.is_empty())
		.collect();
	let Some(first) = args.first() else {
		return Err(ArgsError::Empty);
	};

	if args.iter().any(|a| a.contains('/')) {
		return args
			.iter()
			.map(|arg| {
				let (resource, name) = arg.split_once('/').ok_or(ArgsError::MixedForms)?;
				if resource.is_empty() || name.is_empty() || name.contains('/') {
					return Err(ArgsError::InvalidPair((*arg).to_string()));
				}
				Ok(ResourceRequest::named(resource, name))
			})
			.collect();
	}

	let types: Vec<&str> = first.split(',').collect();
	if types.iter().any(|t| t.is_empty()) {
		return Err(ArgsError::EmptyType((*first).to_string()));
	}
	let names = &args[1..];

	if names.is_empty() {
		return Ok(types.into_iter().map(ResourceRequest::all).collect());
	}
	if types.len() > 1 {
		return Err(ArgsError::NamesWithMultipleTypes((*first).to_string()));
	}
	Ok(names
		.iter()
		.map(|name| ResourceRequest::named(types[0], *name))
		.collect())
}
