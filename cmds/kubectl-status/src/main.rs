use std::{io::Write, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use kubectl_status::{
	k8s::client::ClusterConnection,
	output::{BrokenPipeGuard, ColorMode},
	render_local_file,
	telemetry::{self, LogFormat},
	QueryScope, RenderOptions, ResourceStatusQuery,
};
use tracing::Level;

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "kubectl-status")]
#[command(about = "Show a human-readable status report for Kubernetes resources", long_about = None)]
#[command(version = env!("KUBECTL_STATUS_VERSION"))]
struct Cli {
	/// Resources as TYPE[,TYPE...] [NAME...] or TYPE/NAME...
	args: Vec<String>,

	/// Namespace to look in (defaults to the context's namespace)
	#[arg(short, long)]
	namespace: Option<String>,

	/// Look in all namespaces
	#[arg(short = 'A', long)]
	all_namespaces: bool,

	/// Label selector, e.g. app=web,tier!=cache
	#[arg(short = 'l', long = "selector")]
	selector: Option<String>,

	/// Field selector, e.g. status.phase=Running
	#[arg(long)]
	field_selector: Option<String>,

	/// Manifest files whose objects are shown (may be repeated)
	#[arg(short = 'f', long = "filename")]
	filenames: Vec<PathBuf>,

	/// Render the files given with -f as they are, without a cluster
	#[arg(long, requires = "filenames", conflicts_with = "args")]
	local: bool,

	/// Kubeconfig context to use
	#[arg(long)]
	context: Option<String>,

	/// Path to the kubeconfig file
	#[arg(long)]
	kubeconfig: Option<PathBuf>,

	/// When to colour the output
	#[arg(long, value_enum, default_value_t = ColorMode::Auto)]
	color: ColorMode,

	/// Log level (trace, debug, info, warn, error); overrides RUST_LOG
	#[arg(long)]
	log_level: Option<Level>,

	/// Format of diagnostics on stderr
	#[arg(long, value_enum, default_value_t = LogFormat::Auto)]
	log_format: LogFormat,
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	let _telemetry = match telemetry::init(cli.log_level, cli.log_format) {
		Ok(guard) => guard,
		Err(e) => {
			eprintln!("error: {e:#}");
			return ExitCode::FAILURE;
		}
	};

	let mut stdout = BrokenPipeGuard::new(std::io::stdout().lock());
	match run(cli, &mut stdout) {
		Ok(true) => ExitCode::SUCCESS,
		Ok(false) => ExitCode::FAILURE,
		Err(e) => {
			eprintln!("error: {e:#}");
			ExitCode::FAILURE
		}
	}
}

/// Returns whether every object was reported completely.
fn run(cli: Cli, out: &mut impl Write) -> Result<bool> {
	let options = RenderOptions {
		color: cli.color.should_colorize(),
		..RenderOptions::default()
	};

	if cli.local {
		for path in &cli.filenames {
			let reports = render_local_file(path, &options)?;
			out.write_all(reports.as_bytes())?;
		}
		out.flush()?;
		return Ok(true);
	}

	let cluster = ClusterConnection::connect(cli.kubeconfig.as_deref(), cli.context.as_deref())
		.context("connecting to the cluster")?;

	let scope = QueryScope::builder()
		.enforce_namespace(cli.namespace.is_some())
		.maybe_namespace(cli.namespace)
		.all_namespaces(cli.all_namespaces)
		.filenames(cli.filenames)
		.maybe_label_selector(cli.selector)
		.maybe_field_selector(cli.field_selector)
		.args(cli.args)
		.build();

	let query = ResourceStatusQuery::new(&cluster, scope, options)?;
	let errors = query.render_all(out)?;
	let complete = errors.is_empty();
	for error in errors {
		eprintln!("error: {:#}", anyhow::Error::new(error));
	}
	Ok(complete)
}
