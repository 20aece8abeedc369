//! Label and field selectors.
//!
//! Label selectors support the equality (`=`, `==`, `!=`), existence
//! (`key`, `!key`) and set (`in`, `notin`) forms. Field selectors only
//! support the equality forms, and a missing field compares as the empty
//! string, as the API server does.

use std::{collections::BTreeMap, fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
	#[error("invalid selector requirement `{0}`")]
	InvalidRequirement(String),

	#[error("unbalanced parentheses in selector `{0}`")]
	Unbalanced(String),

	#[error("field selectors only support =, == and !=, got `{0}`")]
	UnsupportedFieldOperator(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
	Equals,
	NotEquals,
	Exists,
	DoesNotExist,
	In(Vec<String>),
	NotIn(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
	pub key: String,
	pub operator: Operator,
	/// Right-hand side for the equality operators, empty otherwise.
	pub value: String,
}

impl Requirement {
	fn matches(&self, actual: Option<&str>) -> bool {
		match &self.operator {
			Operator::Equals => actual == Some(self.value.as_str()),
			Operator::NotEquals => actual != Some(self.value.as_str()),
			Operator::Exists => actual.is_some(),
			Operator::DoesNotExist => actual.is_none(),
			Operator::In(values) => actual.is_some_and(|a| values.iter().any(|v| v == a)),
			Operator::NotIn(values) => actual.is_none_or(|a| values.iter().all(|v| v != a)),
		}
	}

	fn is_equality(&self) -> bool {
		matches!(self.operator, Operator::Equals | Operator::NotEquals)
	}
}

/// A parsed selector: the conjunction of its requirements. The empty
/// selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
	requirements: Vec<Requirement>,
}

impl Selector {
	/// Parse a field selector, rejecting set-based requirements.
	pub fn parse_fields(input: &str) -> Result<Self, SelectorError> {
		let selector: Self = input.parse()?;
		if let Some(req) = selector.requirements.iter().find(|r| !r.is_equality()) {
			return Err(SelectorError::UnsupportedFieldOperator(req.key.clone()));
		}
		Ok(selector)
	}

	/// Build an equality selector from a label map.
	pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
		Self {
			requirements: labels
				.iter()
				.map(|(k, v)| Requirement {
					key: k.clone(),
					operator: Operator::Equals,
					value: v.clone(),
				})
				.collect(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.requirements.is_empty()
	}

	pub fn requirements(&self) -> &[Requirement] {
		&self.requirements
	}

	/// Match against the `metadata.labels` of an object.
	pub fn matches_labels(&self, object: &serde_json::Value) -> bool {
		let labels = crate::string_map(object.pointer("/metadata/labels"));
		self.requirements
			.iter()
			.all(|r| r.matches(labels.get(&r.key).map(String::as_str)))
	}

	/// Match against dotted field paths of an object (`spec.nodeName`,
	/// `involvedObject.uid`, ...).
	pub fn matches_fields(&self, object: &serde_json::Value) -> bool {
		self.requirements.iter().all(|r| {
			let actual = field_value(object, &r.key).unwrap_or_default();
			r.matches(Some(actual.as_str()))
		})
	}
}

/// Read a dotted field path as a string. Numbers and booleans are rendered
/// the way the API server compares them.
pub fn field_value(object: &serde_json::Value, path: &str) -> Option<String> {
	let pointer = format!("/{}", path.replace('.', "/"));
	match object.pointer(&pointer)? {
		serde_json::Value::String(s) => Some(s.clone()),
		serde_json::Value::Number(n) => Some(n.to_string()),
		serde_json::Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

impl FromStr for Selector {
	type Err = SelectorError;

	fn from_str(input: &str) -> Result<Self, Self::Err> {
		let requirements = split_top_level(input)?
			.into_iter()
			.map(str::trim)
			.filter(|part| !part.is_empty())
			.map(parse_requirement)
			.collect::<Result<_, _>>()?;
		Ok(Self { requirements })
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self
			.requirements
			.iter()
			.map(|r| match &r.operator {
				Operator::Equals => format!("{}={}", r.key, r.value),
				Operator::NotEquals => format!("{}!={}", r.key, r.value),
				Operator::Exists => r.key.clone(),
				Operator::DoesNotExist => format!("!{}", r.key),
				Operator::In(values) => format!("{} in ({})", r.key, values.join(",")),
				Operator::NotIn(values) => format!("{} notin ({})", r.key, values.join(",")),
			})
			.collect();
		f.write_str(&parts.join(","))
	}
}

/// Split on commas that are not inside a parenthesized value set.
fn split_top_level(input: &str) -> Result<Vec<&str>, SelectorError> {
	let mut parts = Vec::new();
	let mut depth = 0usize;
	let mut start = 0;
	for (idx, ch) in input.char_indices() {
		match ch {
			'(' => depth += 1,
			')' => {
				depth = depth
					.checked_sub(1)
					.ok_or_else(|| SelectorError::Unbalanced(input.to_string()))?;
			}
			',' if depth == 0 => {
				parts.push(&input[start..idx]);
				start = idx + 1;
			}
			_ => {}
		}
	}
	if depth != 0 {
		return Err(SelectorError::Unbalanced(input.to_string()));
	}
	parts.push(&input[start..]);
	Ok(parts)
}

fn parse_requirement(part: &str) -> Result<Requirement, SelectorError> {
	let invalid = || SelectorError::InvalidRequirement(part.to_string());

	for (token, operator) in [
		(" notin ", Operator::NotIn(Vec::new())),
		(" in ", Operator::In(Vec::new())),
	] {
		if let Some((key, values)) = part.split_once(token) {
			let values = values
				.trim()
				.strip_prefix('(')
				.and_then(|v| v.strip_suffix(')'))
				.ok_or_else(invalid)?
				.split(',')
				.map(|v| v.trim().to_string())
				.collect();
			let operator = match operator {
				Operator::NotIn(_) => Operator::NotIn(values),
				_ => Operator::In(values),
			};
			return requirement(key.trim(), operator, "").ok_or_else(invalid);
		}
	}

	let parsed = if let Some((key, value)) = part.split_once("!=") {
		requirement(key, Operator::NotEquals, value)
	} else if let Some((key, value)) = part.split_once("==") {
		requirement(key, Operator::Equals, value)
	} else if let Some((key, value)) = part.split_once('=') {
		requirement(key, Operator::Equals, value)
	} else if let Some(key) = part.strip_prefix('!') {
		requirement(key, Operator::DoesNotExist, "")
	} else {
		requirement(part, Operator::Exists, "")
	};
	parsed.ok_or_else(invalid)
}

fn requirement(key: &str, operator: Operator, value: &str) -> Option<Requirement> {
	let key = key.trim();
	if key.is_empty() || key.contains(char::is_whitespace) {
		return None;
	}
	Some(Requirement {
		key: key.to_string(),
		operator,
		value: value.trim().to_string(),
	})
}

/// True iff every entry of `subset` is present in `superset` with an equal
/// value. The empty map is a subset of every map.
pub fn is_subset(subset: &BTreeMap<String, String>, superset: &BTreeMap<String, String>) -> bool {
	subset
		.iter()
		.all(|(k, v)| superset.get(k).is_some_and(|other| other == v))
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| ((*k).to_string(), (*v).to_string()))
			.collect()
	}

	#[rstest]
	#[case(&[], &[], true)]
	#[case(&[], &[("app", "web")], true)]
	#[case(&[("app", "web")], &[("app", "web"), ("tier", "fe")], true)]
	#[case(&[("app", "web")], &[("app", "db")], false)]
	#[case(&[("app", "web")], &[], false)]
	#[case(&[("app", "web"), ("tier", "fe")], &[("app", "web")], false)]
	fn test_is_subset(
		#[case] a: &[(&str, &str)],
		#[case] b: &[(&str, &str)],
		#[case] expected: bool,
	) {
		assert_eq!(is_subset(&map(a), &map(b)), expected);
	}

	#[rstest]
	#[case("app=web", true)]
	#[case("app==web,tier=fe", true)]
	#[case("app!=db", true)]
	#[case("app!=web", false)]
	#[case("tier", true)]
	#[case("!missing", true)]
	#[case("!tier", false)]
	#[case("app in (db, web)", true)]
	#[case("app notin (db,web)", false)]
	#[case("missing notin (x)", true)]
	#[case("", true)]
	fn test_label_selector(#[case] input: &str, #[case] expected: bool) {
		let object = json!({"metadata": {"labels": {"app": "web", "tier": "fe"}}});
		let selector: Selector = input.parse().unwrap();
		assert_eq!(selector.matches_labels(&object), expected);
	}

	#[test]
	fn test_field_selector() {
		let object = json!({"spec": {"nodeName": "node-1"}, "metadata": {"name": "p"}});
		let selector = Selector::parse_fields("spec.nodeName=node-1,metadata.name!=q").unwrap();
		assert!(selector.matches_fields(&object));

		let missing = Selector::parse_fields("spec.nodeName=").unwrap();
		assert!(missing.matches_fields(&json!({})));
	}

	#[test]
	fn test_field_selector_rejects_set_ops() {
		assert_eq!(
			Selector::parse_fields("spec.nodeName in (a)"),
			Err(SelectorError::UnsupportedFieldOperator("spec.nodeName".into()))
		);
	}

	#[rstest]
	#[case("app in (a")]
	#[case("app)")]
	#[case("=web")]
	#[case("bad key=x")]
	fn test_invalid(#[case] input: &str) {
		assert!(input.parse::<Selector>().is_err());
	}

	#[test]
	fn test_display_roundtrips_equality() {
		let selector = Selector::from_labels(&map(&[("app", "web"), ("tier", "fe")]));
		assert_eq!(selector.to_string(), "app=web,tier=fe");
	}
}
