//! Errors of the status query: fatal resolution failures, and the
//! per-object failures collected while rendering.

use thiserror::Error;

use crate::{
	augment::AugmentError,
	k8s::{client::ConnectionError, discovery::DiscoveryError, manifest::ManifestError},
	rules::{CompileError, RenderError},
	tree::ConversionError,
};

/// The query could not be turned into objects. Aborts the invocation.
#[derive(Debug, Error)]
pub enum ResolutionError {
	#[error(transparent)]
	Args(#[from] k8s::ArgsError),

	#[error("invalid label selector")]
	LabelSelector(#[source] k8s::SelectorError),

	#[error("invalid field selector")]
	FieldSelector(#[source] k8s::SelectorError),

	#[error("name cannot be provided when a selector is specified")]
	NamesWithSelector,

	#[error("a resource cannot be retrieved by name across all namespaces")]
	NamesAcrossAllNamespaces,

	#[error("resource arguments cannot be combined with --filename")]
	ArgsWithFilenames,

	#[error("the server doesn't have a resource type \"{0}\"")]
	UnknownResourceType(String),

	#[error("the server doesn't serve {kind} objects of apiVersion {api_version}")]
	UnknownKind { api_version: String, kind: String },

	#[error(
		"the namespace from the provided object \"{found}\" does not match the namespace \
		 \"{expected}\". You must pass '--namespace={found}' to perform this operation."
	)]
	NamespaceMismatch { expected: String, found: String },

	#[error("object {index} of {path} is missing apiVersion, kind or metadata.name")]
	IncompleteManifest { path: String, index: usize },

	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error("discovering API resources")]
	Discovery(#[from] DiscoveryError),

	#[error("listing {resource}")]
	List {
		resource: String,
		#[source]
		source: Box<kube::Error>,
	},

	#[error(transparent)]
	Connection(#[from] ConnectionError),
}

/// A single requested object could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("{resource} \"{name}\" not found")]
	NotFound { resource: String, name: String },

	#[error("getting {resource} \"{name}\"")]
	Get {
		resource: String,
		name: String,
		#[source]
		source: Box<kube::Error>,
	},

	#[error("resolving resource type {resource}")]
	Unresolved {
		resource: String,
		#[source]
		source: Box<ResolutionError>,
	},

	#[error("converting {resource} \"{name}\"")]
	Conversion {
		resource: String,
		name: String,
		#[source]
		source: ConversionError,
	},
}

/// Why one object's report is missing or incomplete.
#[derive(Debug, Error)]
pub enum ObjectError {
	#[error(transparent)]
	Fetch(#[from] FetchError),

	#[error("augmenting {kind}/{name}")]
	Augment {
		kind: String,
		name: String,
		#[source]
		source: AugmentError,
	},

	#[error("rendering {kind}/{name}")]
	Render {
		kind: String,
		name: String,
		#[source]
		source: RenderError,
	},
}

/// Fatal failure of a whole status query.
#[derive(Debug, Error)]
pub enum QueryError {
	#[error(transparent)]
	Resolution(#[from] ResolutionError),

	#[error("writing report")]
	Write(#[from] std::io::Error),
}

/// Failure of a local, cluster-less render of manifest files.
#[derive(Debug, Error)]
pub enum LocalRenderError {
	#[error(transparent)]
	Manifest(#[from] ManifestError),

	#[error("object {index} of {path}")]
	Invalid {
		path: String,
		index: usize,
		#[source]
		source: ConversionError,
	},

	#[error(transparent)]
	Compile(#[from] CompileError),

	#[error("rendering {kind}/{name}")]
	Render {
		kind: String,
		name: String,
		#[source]
		source: RenderError,
	},
}
