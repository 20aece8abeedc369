//! One rule per kind. Each starts with the shared header and ends with the
//! events about the object.

use std::fmt::Write as _;

use nu_ansi_term::Color;
use serde_json::Value;

use super::{
	format::{field, humanize_bytes, indent, items, milli_cores, text, text_at},
	sections::{self, header},
	RenderContext, RenderError, Rule, DEFAULT_RULE,
};
use crate::tree;

type Report = Result<(), RenderError>;

pub(super) fn builtin() -> Vec<(&'static str, Box<dyn Rule>)> {
	fn entry<R: Rule + 'static>(kind: &'static str, rule: R) -> (&'static str, Box<dyn Rule>) {
		(kind, Box::new(rule))
	}
	vec![
		entry(DEFAULT_RULE, default_resource),
		entry("Pod", pod),
		entry("Node", node),
		entry("Deployment", deployment),
		entry("ReplicaSet", replica_set),
		entry("StatefulSet", stateful_set),
		entry("DaemonSet", daemon_set),
		entry("Service", service),
		entry("Ingress", ingress),
		entry("PersistentVolumeClaim", persistent_volume_claim),
		entry("PersistentVolume", persistent_volume),
		entry("Job", job),
		entry("CronJob", cron_job),
		entry("Namespace", namespace),
	]
}

fn default_resource(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::conditions(tree, cx, out)?;
	sections::owners(tree, out)?;
	sections::owner_inline(tree, cx, out)?;
	sections::events(tree, cx, out)
}

fn pod(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::pod_phase(tree, cx, out)?;
	if let Some(node) = field(tree, "/spec/nodeName") {
		write!(out, "\n  Node: {}", text(Some(node)))?;
	}
	sections::containers(tree, cx, out)?;
	for usage in items(tree, "/podMetrics/containers") {
		write!(
			out,
			"\n  Usage of {}: cpu {}, memory {}",
			text_at(usage, "/name"),
			milli_cores(usage.get("cpuUsageNanoCores")),
			humanize_bytes(usage.get("memoryWorkingSetBytes")),
		)?;
	}
	sections::conditions(tree, cx, out)?;
	for service in cx.bindings.fetch_services_matching_pod(tree) {
		write!(out, "\n  Targeted by Service/{}", tree::name(&service))?;
	}
	sections::owner_inline(tree, cx, out)?;
	sections::events(tree, cx, out)
}

fn node(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	if field(tree, "/spec/unschedulable").is_some() {
		write!(out, " {}", cx.paint(Color::Yellow, "SchedulingDisabled"))?;
	}
	if let Some(info) = field(tree, "/status/nodeInfo") {
		write!(
			out,
			"\n  {}, kubelet {}, {}",
			text_at(info, "/osImage"),
			text_at(info, "/kubeletVersion"),
			text_at(info, "/containerRuntimeVersion"),
		)?;
	}
	if let Some(stats) = field(tree, "/nodeStats") {
		write!(
			out,
			"\n  Usage: cpu {}, memory {} ({} available), fs {}/{}",
			milli_cores(stats.get("cpuUsageNanoCores")),
			humanize_bytes(stats.get("memoryWorkingSetBytes")),
			humanize_bytes(stats.get("memoryAvailableBytes")),
			humanize_bytes(stats.get("fsUsedBytes")),
			humanize_bytes(stats.get("fsCapacityBytes")),
		)?;
	}
	sections::conditions(tree, cx, out)?;
	let pods = items(tree, "/podsOnNode");
	if !pods.is_empty() {
		write!(out, "\n  Pods: {}", pods.len())?;
		for pod in pods {
			write!(
				out,
				"\n    {}/{} {} {}",
				text_at(pod, "/namespace"),
				text_at(pod, "/name"),
				text_at(pod, "/phase"),
				text_at(pod, "/ready"),
			)?;
			if let Some(restarts) = field(pod, "/restarts") {
				write!(out, ", {} restarts", text(Some(restarts)))?;
			}
		}
	}
	sections::events(tree, cx, out)
}

fn deployment(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::replica_banner(tree, cx, out)?;
	sections::rollout(tree, cx, out)?;
	sections::conditions(tree, cx, out)?;
	// Without matchLabels the label set is empty and would match every
	// ReplicaSet in the namespace.
	if let Some(selector) = field(tree, "/spec/selector/matchLabels") {
		let labels = k8s::string_map(Some(selector));
		let namespace = tree::namespace(tree).unwrap_or_default();
		for replica_set in cx.bindings.fetch_by_label_set(namespace, "ReplicaSet", &labels) {
			let Some(replicas) = field(&replica_set, "/status/replicas") else {
				continue;
			};
			let ready = field(&replica_set, "/status/readyReplicas").map_or_else(|| "0".into(), |r| text(Some(r)));
			write!(
				out,
				"\n  ReplicaSet/{}: {ready}/{} ready",
				tree::name(&replica_set),
				text(Some(replicas)),
			)?;
		}
	}
	sections::events(tree, cx, out)
}

fn replica_set(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::replica_banner(tree, cx, out)?;
	sections::conditions(tree, cx, out)?;
	sections::owner_inline(tree, cx, out)?;
	sections::events(tree, cx, out)
}

fn stateful_set(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::replica_banner(tree, cx, out)?;
	sections::rollout(tree, cx, out)?;
	sections::conditions(tree, cx, out)?;
	if let Some(diff) = field(tree, "/revisionDiff").and_then(Value::as_str) {
		out.push_str("\n  Changes between the last two revisions:\n");
		out.push_str(&indent(4, &cx.color_diff(diff.trim())));
	}
	sections::events(tree, cx, out)
}

fn daemon_set(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::replica_banner(tree, cx, out)?;
	sections::rollout(tree, cx, out)?;
	sections::conditions(tree, cx, out)?;
	sections::events(tree, cx, out)
}

fn service(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	let kind = field(tree, "/spec/type").map_or_else(|| "ClusterIP".into(), |t| text(Some(t)));
	write!(out, " {kind}")?;
	if let Some(ip) = field(tree, "/spec/clusterIP") {
		write!(out, " {}", text(Some(ip)))?;
	}
	if let Some(external) = field(tree, "/spec/externalName") {
		write!(out, " -> {}", text(Some(external)))?;
	}
	sections::load_balancer(tree, cx, out)?;

	for port in items(tree, "/spec/ports") {
		out.push_str("\n  Port ");
		if let Some(name) = field(port, "/name") {
			write!(out, "{} ", text(Some(name)))?;
		}
		let protocol = field(port, "/protocol").map_or_else(|| "TCP".into(), |p| text(Some(p)));
		write!(out, "{}/{protocol}", text_at(port, "/port"))?;
		if let Some(target) = field(port, "/targetPort") {
			write!(out, " -> {}", text(Some(target)))?;
		}
	}

	let namespace = tree::namespace(tree).unwrap_or_default();
	if let Some(endpoints) = cx.fetch_first_by_scope(namespace, &["endpoints", tree::name(tree)]) {
		let count = |key: &str| -> usize {
			items(&endpoints, "/subsets")
				.iter()
				.map(|subset| items(subset, key).len())
				.sum()
		};
		let (ready, not_ready) = (count("/addresses"), count("/notReadyAddresses"));
		write!(out, "\n  Endpoints: {ready} ready")?;
		if not_ready > 0 {
			write!(out, ", {}", cx.paint(Color::Red, format!("{not_ready} not ready")))?;
		}
	}
	sections::events(tree, cx, out)
}

fn ingress(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::load_balancer(tree, cx, out)?;
	for rule in items(tree, "/spec/rules") {
		let host = field(rule, "/host").map_or_else(|| "*".into(), |h| text(Some(h)));
		write!(out, "\n  Host {host}")?;
		for path in items(rule, "/http/paths") {
			let route = field(path, "/path").map_or_else(|| "/".into(), |p| text(Some(p)));
			let backend = field(path, "/backend/service/name").or_else(|| field(path, "/backend/serviceName"));
			write!(out, "\n    {route} -> {}", text(backend))?;
		}
	}
	for backend in items(tree, "/ingressServices") {
		let mut report = String::new();
		service(backend, cx, &mut report)?;
		write!(out, "\n{}", indent(2, &report))?;
	}
	sections::events(tree, cx, out)
}

fn persistent_volume_claim(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::volume_phase(tree, cx, out)?;
	if let Some(volume) = field(tree, "/spec/volumeName") {
		write!(out, "\n  Volume: {}", text(Some(volume)))?;
		if let Some(storage) = field(tree, "/status/capacity/storage") {
			write!(out, " ({})", text(Some(storage)))?;
		}
	}
	if let Some(class) = field(tree, "/spec/storageClassName") {
		write!(out, "\n  Storage class: {}", text(Some(class)))?;
	}
	sections::conditions(tree, cx, out)?;
	sections::events(tree, cx, out)
}

fn persistent_volume(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	sections::volume_phase(tree, cx, out)?;
	if let Some(claim) = field(tree, "/spec/claimRef") {
		write!(
			out,
			"\n  Claimed by PersistentVolumeClaim/{} -n {}",
			text_at(claim, "/name"),
			text_at(claim, "/namespace"),
		)?;
	}
	if let Some(reason) = field(tree, "/status/reason") {
		write!(out, "\n  {}", cx.paint(Color::Red, text(Some(reason))))?;
		if let Some(message) = field(tree, "/status/message") {
			write!(out, ": {}", text(Some(message)))?;
		}
	}
	sections::events(tree, cx, out)
}

fn job(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	for (counter, label, color) in [
		("/status/active", "active", Color::Yellow),
		("/status/succeeded", "succeeded", Color::Green),
		("/status/failed", "failed", Color::Red),
	] {
		if let Some(count) = field(tree, counter) {
			write!(out, " {}", cx.paint(color, format!("{} {label}", text(Some(count)))))?;
		}
	}
	if let Some(completed) = field(tree, "/status/completionTime") {
		write!(out, "\n  Completed {} ago", cx.ago(&text(Some(completed))))?;
	}
	sections::conditions(tree, cx, out)?;
	sections::owner_inline(tree, cx, out)?;
	sections::events(tree, cx, out)
}

fn cron_job(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	write!(out, " {}", text_at(tree, "/spec/schedule"))?;
	if field(tree, "/spec/suspend").is_some() {
		write!(out, " {}", cx.paint(Color::Yellow, "Suspended"))?;
	}
	if let Some(scheduled) = field(tree, "/status/lastScheduleTime") {
		write!(out, "\n  Last scheduled {} ago", cx.ago(&text(Some(scheduled))))?;
	}
	if let Some(succeeded) = field(tree, "/status/lastSuccessfulTime") {
		write!(out, "\n  Last succeeded {} ago", cx.ago(&text(Some(succeeded))))?;
	}
	for active in items(tree, "/status/active") {
		write!(out, "\n  Active Job/{}", text_at(active, "/name"))?;
	}
	sections::events(tree, cx, out)
}

fn namespace(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Report {
	header(tree, cx, out)?;
	if let Some(phase) = field(tree, "/status/phase").and_then(Value::as_str) {
		let color = if phase == "Active" { Color::Green } else { Color::Yellow };
		write!(out, " {}", cx.paint(color, phase))?;
	}
	sections::conditions(tree, cx, out)
}
