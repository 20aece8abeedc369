//! Text helpers rules share: colours, ages, sizes, and reading loosely
//! typed fields out of trees.

use nu_ansi_term::{Color, Style};
use serde_json::Value;

use super::{BindingError, RenderContext};
use crate::tree;

impl RenderContext<'_> {
	/// `text` in `style`, or unchanged when colour is off.
	pub fn paint(&self, style: impl Into<Style>, text: impl AsRef<str>) -> String {
		if self.options.color {
			style.into().paint(text.as_ref()).to_string()
		} else {
			text.as_ref().to_string()
		}
	}

	/// Age of an RFC 3339 timestamp relative to the render clock.
	pub fn ago(&self, timestamp: &str) -> String {
		match timestamp.parse::<jiff::Timestamp>() {
			Ok(time) => human_duration(self.options.now.as_second() - time.as_second()),
			Err(_) => "<unknown>".into(),
		}
	}

	/// Colour the body lines of a unified diff. File headers stay plain.
	pub fn color_diff(&self, diff: &str) -> String {
		if !self.options.color {
			return diff.to_string();
		}
		diff.split_inclusive('\n')
			.map(|line| {
				let color = if line.starts_with("+++") || line.starts_with("---") {
					None
				} else if line.starts_with('+') {
					Some(Color::Green)
				} else if line.starts_with('-') {
					Some(Color::Red)
				} else if line.starts_with("@@") {
					Some(Color::Cyan)
				} else {
					None
				};
				match color {
					Some(color) => {
						let body = line.trim_end_matches('\n');
						format!("{}{}", color.paint(body), &line[body.len()..])
					}
					None => line.to_string(),
				}
			})
			.collect()
	}

	/// Render the first owner reference inline, whatever its `controller`
	/// flag.
	pub fn render_owner_inline(&self, tree: &Value) -> Result<String, BindingError> {
		let owner = tree
			.pointer("/metadata/ownerReferences/0")
			.ok_or_else(|| BindingError::NoOwners {
				kind: tree::kind(tree).to_string(),
				name: tree::name(tree).to_string(),
			})?;
		let args = [text(owner.get("kind")), text(owner.get("name"))];
		let namespace = tree::namespace(tree).unwrap_or_default();
		self.bindings.render_inline(namespace, &args)
	}

	/// First object `args` resolves to in `namespace`.
	pub fn fetch_first_by_scope(&self, namespace: &str, args: &[&str]) -> Option<Value> {
		let args: Vec<String> = args.iter().map(ToString::to_string).collect();
		self.bindings.fetch_by_scope(namespace, &args).into_iter().next()
	}
}

/// A field with a meaningful value: absent, null, false, zero and empty
/// values all read as `None`.
pub fn field<'a>(tree: &'a Value, pointer: &str) -> Option<&'a Value> {
	tree.pointer(pointer).filter(|value| match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(items) => !items.is_empty(),
		Value::Object(fields) => !fields.is_empty(),
	})
}

/// The elements of an array field; empty when absent.
pub fn items<'a>(tree: &'a Value, pointer: &str) -> &'a [Value] {
	tree.pointer(pointer)
		.and_then(Value::as_array)
		.map(Vec::as_slice)
		.unwrap_or_default()
}

/// Printable form of a scalar field. Missing values print as nothing.
pub fn text(value: Option<&Value>) -> String {
	match value {
		None | Some(Value::Null) => String::new(),
		Some(Value::String(s)) => s.clone(),
		Some(other) => other.to_string(),
	}
}

/// `text` of the field at `pointer`.
pub fn text_at(tree: &Value, pointer: &str) -> String {
	text(tree.pointer(pointer))
}

/// Prefix every non-empty line with `width` spaces.
pub fn indent(width: usize, text: &str) -> String {
	let pad = " ".repeat(width);
	text.split('\n')
		.map(|line| {
			if line.is_empty() {
				String::new()
			} else {
				format!("{pad}{line}")
			}
		})
		.collect::<Vec<_>>()
		.join("\n")
}

/// Whether a status condition reports a good state. Conditions that name a
/// problem are healthy when False, all others when True.
pub fn is_condition_healthy(condition: &Value) -> bool {
	let kind = tree::str_at(condition, "/type").unwrap_or_default();
	let status = tree::str_at(condition, "/status").unwrap_or_default();
	let negative = kind.ends_with("Pressure")
		|| matches!(kind, "NetworkUnavailable" | "ReplicaFailure" | "Failed" | "Stalled");
	status == if negative { "False" } else { "True" }
}

/// Human readable age, matching kubectl's `HumanDuration`.
pub fn human_duration(seconds: i64) -> String {
	if seconds < -1 {
		return "<invalid>".into();
	}
	if seconds < 0 {
		return "0s".into();
	}
	if seconds < 60 * 2 {
		return format!("{seconds}s");
	}
	let minutes = seconds / 60;
	if minutes < 10 {
		let s = seconds % 60;
		return if s == 0 {
			format!("{minutes}m")
		} else {
			format!("{minutes}m{s}s")
		};
	}
	if minutes < 60 * 3 {
		return format!("{minutes}m");
	}
	let hours = seconds / 3600;
	if hours < 8 {
		let m = minutes % 60;
		return if m == 0 {
			format!("{hours}h")
		} else {
			format!("{hours}h{m}m")
		};
	}
	if hours < 48 {
		return format!("{hours}h");
	}
	if hours < 24 * 8 {
		let h = hours % 24;
		return if h == 0 {
			format!("{}d", hours / 24)
		} else {
			format!("{}d{h}h", hours / 24)
		};
	}
	if hours < 24 * 365 * 2 {
		return format!("{}d", hours / 24);
	}
	if hours < 24 * 365 * 8 {
		let days = (hours / 24) % 365;
		return if days == 0 {
			format!("{}y", hours / 24 / 365)
		} else {
			format!("{}y{days}d", hours / 24 / 365)
		};
	}
	format!("{}y", hours / 24 / 365)
}

/// Binary-prefixed size, `n/a` when unknown.
pub fn humanize_bytes(bytes: Option<&Value>) -> String {
	const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
	let Some(bytes) = bytes.and_then(Value::as_f64) else {
		return "n/a".into();
	};
	if bytes < 1024.0 {
		return format!("{bytes} B");
	}
	let mut value = bytes;
	let mut unit = "B";
	for next in UNITS {
		if value < 1024.0 {
			break;
		}
		value /= 1024.0;
		unit = next;
	}
	format!("{value:.1} {unit}")
}

/// CPU usage in nanocores as millicores, `n/a` when unknown.
pub fn milli_cores(nano_cores: Option<&Value>) -> String {
	nano_cores
		.and_then(Value::as_f64)
		.map_or_else(|| "n/a".into(), |n| format!("{}m", (n / 1e6).round()))
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;
	use crate::rules::{NoopBindings, RenderOptions};

	#[rstest]
	#[case(-5, "<invalid>")]
	#[case(-1, "0s")]
	#[case(59, "59s")]
	#[case(119, "119s")]
	#[case(120, "2m")]
	#[case(150, "2m30s")]
	#[case(3600, "60m")]
	#[case(3 * 3600 + 60, "3h1m")]
	#[case(10 * 3600, "10h")]
	#[case(3 * 86400 + 3600, "3d1h")]
	#[case(30 * 86400, "30d")]
	#[case(3 * 365 * 86400 + 86400, "3y1d")]
	#[case(10 * 365 * 86400, "10y")]
	fn test_human_duration(#[case] seconds: i64, #[case] expected: &str) {
		assert_eq!(human_duration(seconds), expected);
	}

	#[rstest]
	#[case(json!(512), "512 B")]
	#[case(json!(1536), "1.5 KiB")]
	#[case(json!(3_221_225_472_u64), "3.0 GiB")]
	#[case(json!(null), "n/a")]
	fn test_humanize_bytes(#[case] bytes: Value, #[case] expected: &str) {
		assert_eq!(humanize_bytes(Some(&bytes)), expected);
	}

	#[test]
	fn test_milli_cores() {
		assert_eq!(milli_cores(Some(&json!(250_000_000))), "250m");
		assert_eq!(milli_cores(None), "n/a");
	}

	#[rstest]
	#[case(json!({"type": "Ready", "status": "True"}), true)]
	#[case(json!({"type": "Ready", "status": "False"}), false)]
	#[case(json!({"type": "MemoryPressure", "status": "False"}), true)]
	#[case(json!({"type": "DiskPressure", "status": "True"}), false)]
	#[case(json!({"type": "ReplicaFailure", "status": "True"}), false)]
	#[case(json!({"type": "Stalled", "status": "Unknown"}), false)]
	fn test_is_condition_healthy(#[case] condition: Value, #[case] expected: bool) {
		assert_eq!(is_condition_healthy(&condition), expected);
	}

	#[test]
	fn test_field_skips_empty_values() {
		let tree = json!({"a": 0, "b": "", "c": [], "d": false, "e": 2, "f": "x"});
		for pointer in ["/a", "/b", "/c", "/d", "/missing"] {
			assert_eq!(field(&tree, pointer), None, "{pointer}");
		}
		assert_eq!(field(&tree, "/e"), Some(&json!(2)));
		assert_eq!(text_at(&tree, "/f"), "x");
		assert_eq!(text_at(&tree, "/e"), "2");
		assert_eq!(text_at(&tree, "/missing"), "");
	}

	#[test]
	fn test_indent_keeps_blank_lines() {
		assert_eq!(indent(2, "a\n\nb"), "  a\n\n  b");
		assert_eq!(indent(2, "\nPod/p"), "\n  Pod/p");
	}

	#[test]
	fn test_colors_follow_options() {
		let mut options = RenderOptions {
			color: false,
			now: jiff::Timestamp::UNIX_EPOCH,
		};
		let plain = RenderContext {
			bindings: &NoopBindings,
			options: &options,
		};
		assert_eq!(plain.paint(Color::Red, "x"), "x");
		assert_eq!(plain.color_diff("-a\n+b\n"), "-a\n+b\n");

		options.color = true;
		let colored = RenderContext {
			bindings: &NoopBindings,
			options: &options,
		};
		assert_eq!(colored.paint(Color::Red, "x"), Color::Red.paint("x").to_string());
		assert_eq!(
			colored.color_diff("--- a\n-a\n+b\n"),
			format!("--- a\n{}\n{}\n", Color::Red.paint("-a"), Color::Green.paint("+b"))
		);
	}

	#[test]
	fn test_owner_inline_requires_owners() {
		let options = RenderOptions::default();
		let cx = RenderContext {
			bindings: &NoopBindings,
			options: &options,
		};
		let err = cx
			.render_owner_inline(&json!({"kind": "Pod", "metadata": {"name": "p"}}))
			.unwrap_err();
		assert_eq!(err.to_string(), "Pod/p has no owner references");

		let owned = json!({"kind": "Pod", "metadata": {"name": "p", "ownerReferences": [{"kind": "ReplicaSet", "name": "rs"}]}});
		assert_eq!(cx.render_owner_inline(&owned).unwrap(), "");
	}

	#[test]
	fn test_ago_of_garbage() {
		let options = RenderOptions::default();
		let cx = RenderContext {
			bindings: &NoopBindings,
			options: &options,
		};
		assert_eq!(cx.ago("yesterday"), "<unknown>");
	}
}
