//! Report sections shared between kinds. The header starts a report; every
//! other section writes lines of the form `"\n  ..."`.

use std::fmt::Write as _;

use nu_ansi_term::{Color, Style};
use serde_json::Value;

use super::{
	format::{field, indent, is_condition_healthy, items, text, text_at},
	RenderContext, RenderError,
};
use crate::{rollout, tree};

type Section = Result<(), RenderError>;

/// `Kind/name -n namespace, created 3h ago`
pub fn header(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	let title = format!("{}/{}", tree::kind(tree), tree::name(tree));
	out.push_str(&cx.paint(Style::new().bold(), title));
	if let Some(namespace) = tree::namespace(tree) {
		write!(out, " -n {namespace}")?;
	}
	if let Some(created) = field(tree, "/metadata/creationTimestamp") {
		write!(out, ", created {} ago", cx.ago(&text(Some(created))))?;
	}
	if let Some(deleted) = field(tree, "/metadata/deletionTimestamp") {
		let deleted = format!("deleted {} ago", cx.ago(&text(Some(deleted))));
		write!(out, ", {}", cx.paint(Color::Red, deleted))?;
	}
	Ok(())
}

pub fn conditions(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	for condition in items(tree, "/status/conditions") {
		let kind = text(condition.get("type"));
		if is_condition_healthy(condition) {
			write!(out, "\n  {}", cx.paint(Color::Green, kind))?;
			continue;
		}
		let status = text(condition.get("status"));
		write!(out, "\n  {}", cx.paint(Color::Red, format!("{kind}: {status}")))?;
		if let Some(reason) = field(condition, "/reason") {
			write!(out, " {}", text(Some(reason)))?;
		}
		if let Some(message) = field(condition, "/message") {
			write!(out, ": {}", text(Some(message)))?;
		}
	}
	Ok(())
}

pub fn owners(tree: &Value, out: &mut String) -> Section {
	for owner in items(tree, "/metadata/ownerReferences") {
		write!(out, "\n  Owned by {}/{}", text(owner.get("kind")), text(owner.get("name")))?;
	}
	Ok(())
}

/// The first owner's own report, indented under this one.
pub fn owner_inline(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	if field(tree, "/metadata/ownerReferences").is_some() {
		out.push_str(&indent(2, &cx.render_owner_inline(tree)?));
	}
	Ok(())
}

pub fn events(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	let list = cx.bindings.fetch_events(tree);
	let events = items(&list, "/items");
	if events.is_empty() {
		return Ok(());
	}
	out.push_str("\n  Events:");
	for event in events {
		out.push_str("\n    ");
		let seen = ["/lastTimestamp", "/eventTime", "/firstTimestamp"]
			.into_iter()
			.find_map(|pointer| field(event, pointer));
		if let Some(seen) = seen {
			write!(out, "{} ago ", cx.ago(&text(Some(seen))))?;
		}
		let reason = text_at(event, "/reason");
		if tree::str_at(event, "/type") == Some("Warning") {
			out.push_str(&cx.paint(Color::Yellow, reason));
		} else {
			out.push_str(&reason);
		}
		if let Some(count) = field(event, "/count").and_then(Value::as_i64).filter(|c| *c > 1) {
			write!(out, " (x{count})")?;
		}
		write!(out, ": {}", text_at(event, "/message"))?;
	}
	Ok(())
}

/// Outage or replica warning after the header.
pub fn replica_banner(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	if let Some(banner) = rollout::workload_banner(tree) {
		write!(out, " {}", cx.paint(Color::Red, banner.to_string()))?;
	}
	Ok(())
}

/// A rollout that failed or is still going.
pub fn rollout(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	let status = rollout::rollout_status(tree);
	if let Some(error) = &status.error {
		write!(out, "\n  {}", cx.paint(Color::Red, error))?;
	} else if !status.done {
		let message = status.message.unwrap_or_default();
		write!(out, "\n  {}", cx.paint(Color::Yellow, message))?;
	}
	Ok(())
}

pub fn pod_phase(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	if let Some(phase) = field(tree, "/status/phase").and_then(Value::as_str) {
		let color = match phase {
			"Running" | "Succeeded" => Color::Green,
			"Failed" => Color::Red,
			_ => Color::Yellow,
		};
		write!(out, " {}", cx.paint(color, phase))?;
	}
	Ok(())
}

pub fn volume_phase(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	if let Some(phase) = field(tree, "/status/phase").and_then(Value::as_str) {
		let color = match phase {
			"Bound" => Color::Green,
			"Available" => Color::Cyan,
			_ => Color::Yellow,
		};
		write!(out, " {}", cx.paint(color, phase))?;
	}
	Ok(())
}

pub fn containers(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	for status in items(tree, "/status/initContainerStatuses") {
		let ready = if field(status, "/ready").is_some() {
			"ready".to_string()
		} else {
			cx.paint(Color::Yellow, "not ready")
		};
		write!(out, "\n  Init container {}: {ready}", text_at(status, "/name"))?;
		if let Some(terminated) = field(status, "/state/terminated") {
			if tree::str_at(terminated, "/reason") != Some("Completed") {
				terminated_line("Terminated", terminated, cx, out)?;
			}
		}
	}

	for status in items(tree, "/status/containerStatuses") {
		let ready = if field(status, "/ready").is_some() {
			cx.paint(Color::Green, "ready")
		} else {
			cx.paint(Color::Red, "not ready")
		};
		write!(out, "\n  Container {}: {ready}", text_at(status, "/name"))?;
		if let Some(restarts) = field(status, "/restartCount") {
			write!(out, ", {} restarts", text(Some(restarts)))?;
		}
		if let Some(waiting) = field(status, "/state/waiting") {
			write!(out, "\n    Waiting: {}", cx.paint(Color::Yellow, text_at(waiting, "/reason")))?;
			if let Some(message) = field(waiting, "/message") {
				write!(out, ": {}", text(Some(message)))?;
			}
		}
		if let Some(terminated) = field(status, "/state/terminated") {
			terminated_line("Terminated", terminated, cx, out)?;
		}
		if let Some(last) = field(status, "/lastState/terminated") {
			write!(out, "\n    Last terminated: {}", text_at(last, "/reason"))?;
			if let Some(finished) = field(last, "/finishedAt") {
				write!(out, ", {} ago", cx.ago(&text(Some(finished))))?;
			}
		}
	}
	Ok(())
}

fn terminated_line(label: &str, terminated: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	let reason = cx.paint(Color::Red, text_at(terminated, "/reason"));
	write!(out, "\n    {label}: {reason}")?;
	if let Some(code) = field(terminated, "/exitCode") {
		write!(out, " (exit code {})", text(Some(code)))?;
	}
	Ok(())
}

/// ` 1.2.3.4 lb.example.com` for each load balancer ingress point.
pub fn load_balancer(tree: &Value, cx: &RenderContext<'_>, out: &mut String) -> Section {
	for point in items(tree, "/status/loadBalancer/ingress") {
		let address = field(point, "/ip").or_else(|| field(point, "/hostname"));
		write!(out, " {}", cx.paint(Color::Cyan, text(address)))?;
	}
	Ok(())
}
