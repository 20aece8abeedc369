//! Well-known resource aliases, as accepted by kubectl.

use phf::phf_map;

/// Short names of built-in resources mapped to their plural names.
///
/// Discovery reports short names too, but not every server does (and
/// aggregated discovery omits them for some groups), so the common ones are
/// resolved locally first.
pub static SHORT_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
	"cj" => "cronjobs",
	"cm" => "configmaps",
	"ds" => "daemonsets",
	"deploy" => "deployments",
	"ep" => "endpoints",
	"ev" => "events",
	"hpa" => "horizontalpodautoscalers",
	"ing" => "ingresses",
	"limits" => "limitranges",
	"netpol" => "networkpolicies",
	"no" => "nodes",
	"ns" => "namespaces",
	"pdb" => "poddisruptionbudgets",
	"po" => "pods",
	"pv" => "persistentvolumes",
	"pvc" => "persistentvolumeclaims",
	"quota" => "resourcequotas",
	"rc" => "replicationcontrollers",
	"rs" => "replicasets",
	"sa" => "serviceaccounts",
	"sc" => "storageclasses",
	"sts" => "statefulsets",
	"svc" => "services",
};

/// Resources listed by the `all` category, in output order.
pub const CATEGORY_ALL: &[&str] = &[
	"pods",
	"services",
	"daemonsets",
	"deployments",
	"replicasets",
	"statefulsets",
	"jobs",
	"cronjobs",
];

/// Expand a short name to its plural form. Unknown names are returned
/// unchanged, lowercased.
pub fn expand_short_name(name: &str) -> String {
	let lower = name.to_ascii_lowercase();
	match SHORT_NAMES.get(lower.as_str()) {
		Some(plural) => (*plural).to_string(),
		None => lower,
	}
}

/// Resources a category name stands for, if it is a known category.
pub fn expand_category(name: &str) -> Option<&'static [&'static str]> {
	match name {
		"all" => Some(CATEGORY_ALL),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("po", "pods")]
	#[case("deploy", "deployments")]
	#[case("STS", "statefulsets")]
	#[case("Deployment", "deployment")]
	#[case("pods", "pods")]
	fn test_expand_short_name(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(expand_short_name(input), expected);
	}

	#[test]
	fn test_expand_category() {
		assert_eq!(expand_category("all"), Some(CATEGORY_ALL));
		assert_eq!(expand_category("pods"), None);
	}
}
