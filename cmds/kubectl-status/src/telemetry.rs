//! Diagnostics on stderr, and span export over OTLP/HTTP when the standard
//! `OTEL_EXPORTER_OTLP_*` variables configure an endpoint. Stdout belongs to
//! reports.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_TRACES_ENDPOINT};
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing::{Level, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "kubectl-status";

/// Log target of this crate; `--log-level` raises it without flooding
/// stderr with HTTP client internals.
const CRATE_TARGET: &str = "kubectl_status";

/// Shape of diagnostics on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	/// Compact lines on a terminal, JSON otherwise
	#[default]
	Auto,
	Compact,
	Pretty,
	Json,
}

impl LogFormat {
	fn resolve(self, terminal: bool) -> Self {
		match self {
			Self::Auto if terminal => Self::Compact,
			Self::Auto => Self::Json,
			explicit => explicit,
		}
	}

	fn layer<S>(self) -> Box<dyn Layer<S> + Send + Sync>
	where
		S: Subscriber + for<'span> LookupSpan<'span>,
	{
		let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
		match self.resolve(std::io::stderr().is_terminal()) {
			Self::Pretty => layer.pretty().boxed(),
			Self::Json => layer.json().boxed(),
			Self::Compact | Self::Auto => layer.compact().without_time().boxed(),
		}
	}
}

/// Filter directives. An explicit level applies to this crate, and to its
/// dependencies only down to `warn`; without one `RUST_LOG` is used as is.
fn directives(level: Option<Level>, rust_log: Option<&str>) -> String {
	match (level, rust_log) {
		(Some(level), _) => {
			let dependencies = level.min(Level::WARN);
			format!("{dependencies},{CRATE_TARGET}={level}")
		}
		(None, Some(rust_log)) if !rust_log.trim().is_empty() => rust_log.to_string(),
		(None, _) => Level::WARN.to_string(),
	}
}

/// Where and as whom spans are exported.
#[derive(Debug, PartialEq, Eq)]
struct OtlpSettings {
	/// `None` leaves the name to `OTEL_SERVICE_NAME`.
	service_name: Option<String>,
}

impl OtlpSettings {
	/// `None` unless an OTLP endpoint is configured.
	fn from_env(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
		let configured = [OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_TRACES_ENDPOINT]
			.into_iter()
			.any(|key| var(key).is_some_and(|endpoint| !endpoint.is_empty()));
		configured.then(|| Self {
			service_name: var("OTEL_SERVICE_NAME")
				.is_none()
				.then(|| SERVICE_NAME.to_string()),
		})
	}

	fn tracer_provider(&self) -> Result<SdkTracerProvider> {
		let exporter = SpanExporter::builder()
			.with_http()
			.build()
			.context("building the OTLP span exporter")?;
		let mut resource = Resource::builder();
		if let Some(name) = &self.service_name {
			resource = resource.with_service_name(name.clone());
		}
		Ok(SdkTracerProvider::builder()
			.with_resource(resource.build())
			.with_batch_exporter(exporter)
			.build())
	}
}

/// Keep alive for the whole run; pending spans are flushed on drop.
#[must_use]
pub struct TelemetryGuard {
	provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
	fn drop(&mut self) {
		if let Some(provider) = self.provider.take() {
			if let Err(e) = provider.shutdown() {
				eprintln!("warning: flushing traces: {e}");
			}
		}
	}
}

/// Install the global subscriber.
pub fn init(level: Option<Level>, format: LogFormat) -> Result<TelemetryGuard> {
	let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
	let filter = EnvFilter::builder().parse_lossy(directives(level, rust_log.as_deref()));

	let provider = OtlpSettings::from_env(|key| std::env::var(key).ok())
		.map(|settings| settings.tracer_provider())
		.transpose()?;
	let export = provider.as_ref().map(|provider| {
		tracing_opentelemetry::layer()
			.with_error_records_to_exceptions(true)
			.with_tracer(provider.tracer(SERVICE_NAME))
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(format.layer())
		.with(export)
		.try_init()
		.context("installing the log subscriber")?;
	Ok(TelemetryGuard { provider })
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use rstest::rstest;

	use super::*;

	fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
		let vars: HashMap<_, _> = vars.iter().copied().collect();
		move |key| vars.get(key).map(ToString::to_string)
	}

	#[rstest]
	#[case(Some(Level::DEBUG), None, "warn,kubectl_status=debug")]
	#[case(Some(Level::ERROR), Some("trace"), "error,kubectl_status=error")]
	#[case(None, Some("kube=debug"), "kube=debug")]
	#[case(None, Some(" "), "warn")]
	#[case(None, None, "warn")]
	fn test_directives(#[case] level: Option<Level>, #[case] rust_log: Option<&str>, #[case] expected: &str) {
		assert_eq!(directives(level, rust_log).to_lowercase(), expected);
	}

	#[test]
	fn test_export_needs_endpoint() {
		assert_eq!(OtlpSettings::from_env(env(&[])), None);
		assert_eq!(OtlpSettings::from_env(env(&[(OTEL_EXPORTER_OTLP_ENDPOINT, "")])), None);
		assert_eq!(
			OtlpSettings::from_env(env(&[(OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "http://collector:4318/v1/traces")])),
			Some(OtlpSettings {
				service_name: Some(SERVICE_NAME.into())
			})
		);
	}

	#[test]
	fn test_service_name_from_env_wins() {
		let settings = OtlpSettings::from_env(env(&[
			(OTEL_EXPORTER_OTLP_ENDPOINT, "http://collector:4318"),
			("OTEL_SERVICE_NAME", "status-ci"),
		]));
		assert_eq!(settings, Some(OtlpSettings { service_name: None }));
	}

	#[rstest]
	#[case(LogFormat::Auto, true, LogFormat::Compact)]
	#[case(LogFormat::Auto, false, LogFormat::Json)]
	#[case(LogFormat::Pretty, false, LogFormat::Pretty)]
	#[case(LogFormat::Json, true, LogFormat::Json)]
	fn test_auto_format(#[case] format: LogFormat, #[case] terminal: bool, #[case] expected: LogFormat) {
		assert_eq!(format.resolve(terminal), expected);
	}
}
