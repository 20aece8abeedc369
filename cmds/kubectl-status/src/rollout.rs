//! Rollout progress of workload controllers, following the messages of
//! `kubectl rollout status`, and the replica banners derived from it.

use std::fmt;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use serde_json::Value;

use crate::tree::{self, ConversionError};

const ROLLING_UPDATE: &str = "RollingUpdate";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutStatus {
	pub done: bool,
	pub message: Option<String>,
	pub error: Option<String>,
}

impl RolloutStatus {
	fn progressing(message: String) -> Self {
		Self {
			done: false,
			message: Some(message),
			error: None,
		}
	}

	fn complete(message: String) -> Self {
		Self {
			done: true,
			message: Some(message),
			error: None,
		}
	}

	fn failed(done: bool, error: String) -> Self {
		Self {
			done,
			message: None,
			error: Some(error),
		}
	}
}

/// Rollout status of a Deployment, DaemonSet or StatefulSet tree. Other
/// kinds, and trees that do not decode, report an error instead.
pub fn rollout_status(tree: &Value) -> RolloutStatus {
	let result = match tree::kind(tree) {
		"Deployment" => tree::to_typed(tree).map(|d| deployment_status(&d)),
		"DaemonSet" => tree::to_typed(tree).map(|d| daemon_set_status(&d)),
		"StatefulSet" => tree::to_typed(tree).map(|s| stateful_set_status(&s)),
		kind => {
			return RolloutStatus::failed(
				false,
				format!("no rollout status available for kind {kind}"),
			)
		}
	};
	result.unwrap_or_else(|e: ConversionError| RolloutStatus::failed(false, e.to_string()))
}

fn deployment_status(deployment: &Deployment) -> RolloutStatus {
	let name = deployment.metadata.name.as_deref().unwrap_or_default();
	let generation = deployment.metadata.generation.unwrap_or_default();
	let status = deployment.status.clone().unwrap_or_default();
	if generation > status.observed_generation.unwrap_or_default() {
		return RolloutStatus::progressing(
			"Waiting for deployment spec update to be observed...".into(),
		);
	}

	let deadline_exceeded = status.conditions.iter().flatten().any(|c| {
		c.type_ == "Progressing" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
	});
	if deadline_exceeded {
		return RolloutStatus::failed(
			false,
			format!("deployment {name:?} exceeded its progress deadline"),
		);
	}

	let updated = status.updated_replicas.unwrap_or_default();
	let replicas = status.replicas.unwrap_or_default();
	let available = status.available_replicas.unwrap_or_default();
	let desired = deployment.spec.as_ref().and_then(|s| s.replicas);
	if let Some(desired) = desired.filter(|d| updated < *d) {
		return RolloutStatus::progressing(format!(
			"Waiting for deployment {name:?} rollout to finish: {updated} out of {desired} new replicas have been updated..."
		));
	}
	if replicas > updated {
		return RolloutStatus::progressing(format!(
			"Waiting for deployment {name:?} rollout to finish: {} old replicas are pending termination...",
			replicas - updated
		));
	}
	if available < updated {
		return RolloutStatus::progressing(format!(
			"Waiting for deployment {name:?} rollout to finish: {available} of {updated} updated replicas are available..."
		));
	}
	RolloutStatus::complete(format!("deployment {name:?} successfully rolled out"))
}

fn daemon_set_status(daemon_set: &DaemonSet) -> RolloutStatus {
	let name = daemon_set.metadata.name.as_deref().unwrap_or_default();
	let strategy = daemon_set
		.spec
		.as_ref()
		.and_then(|s| s.update_strategy.as_ref())
		.and_then(|s| s.type_.as_deref())
		.unwrap_or(ROLLING_UPDATE);
	if strategy != ROLLING_UPDATE {
		return RolloutStatus::failed(
			true,
			format!("rollout status is only available for {ROLLING_UPDATE} strategy type"),
		);
	}

	let generation = daemon_set.metadata.generation.unwrap_or_default();
	let status = daemon_set.status.clone().unwrap_or_default();
	if generation > status.observed_generation.unwrap_or_default() {
		return RolloutStatus::progressing(
			"Waiting for daemon set spec update to be observed...".into(),
		);
	}

	let desired = status.desired_number_scheduled;
	let updated = status.updated_number_scheduled.unwrap_or_default();
	let available = status.number_available.unwrap_or_default();
	if updated < desired {
		return RolloutStatus::progressing(format!(
			"Waiting for daemon set {name:?} rollout to finish: {updated} out of {desired} new pods have been updated..."
		));
	}
	if available < desired {
		return RolloutStatus::progressing(format!(
			"Waiting for daemon set {name:?} rollout to finish: {available} of {desired} updated pods are available..."
		));
	}
	RolloutStatus::complete(format!("daemon set {name:?} successfully rolled out"))
}

fn stateful_set_status(stateful_set: &StatefulSet) -> RolloutStatus {
	let spec = stateful_set.spec.clone().unwrap_or_default();
	let strategy = spec.update_strategy.clone().unwrap_or_default();
	if strategy.type_.as_deref().unwrap_or(ROLLING_UPDATE) != ROLLING_UPDATE {
		return RolloutStatus::failed(
			true,
			format!("rollout status is only available for {ROLLING_UPDATE} strategy type"),
		);
	}

	let generation = stateful_set.metadata.generation.unwrap_or_default();
	let status = stateful_set.status.clone().unwrap_or_default();
	let observed = status.observed_generation.unwrap_or_default();
	if observed == 0 || generation > observed {
		return RolloutStatus::progressing(
			"Waiting for statefulset spec update to be observed...".into(),
		);
	}

	let ready = status.ready_replicas.unwrap_or_default();
	if let Some(desired) = spec.replicas.filter(|d| ready < *d) {
		return RolloutStatus::progressing(format!(
			"Waiting for {} pods to be ready...",
			desired - ready
		));
	}

	let updated = status.updated_replicas.unwrap_or_default();
	if let Some(rolling) = &strategy.rolling_update {
		if let (Some(desired), Some(partition)) = (spec.replicas, rolling.partition) {
			if updated < desired - partition {
				return RolloutStatus::progressing(format!(
					"Waiting for partitioned roll out to finish: {updated} out of {} new pods have been updated...",
					desired - partition
				));
			}
		}
		return RolloutStatus::complete(format!(
			"partitioned roll out complete: {updated} new pods have been updated..."
		));
	}

	let update_revision = status.update_revision.unwrap_or_default();
	let current_revision = status.current_revision.unwrap_or_default();
	if update_revision != current_revision {
		return RolloutStatus::progressing(format!(
			"waiting for statefulset rolling update to complete {updated} pods at revision {update_revision}..."
		));
	}
	RolloutStatus::complete(format!(
		"statefulset rolling update complete {} pods at revision {current_revision}...",
		status.current_replicas.unwrap_or_default()
	))
}

/// Headline warning about a replicated workload, at most one per report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaBanner {
	Outage,
	NotReady(i64),
	Unavailable(i64),
}

impl fmt::Display for ReplicaBanner {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Outage => write!(f, "Outage"),
			Self::NotReady(n) => write!(f, "Not Ready Replicas: {n} replicas are not Ready."),
			Self::Unavailable(n) => {
				write!(f, "Unavailable Replicas: {n} replicas are not available.")
			}
		}
	}
}

/// Pick the banner for a workload tree from the replica counters the
/// controller reports in `status`. Deployment/ReplicaSet/StatefulSet use
/// `replicas`, `readyReplicas` and `unavailableReplicas`; DaemonSet uses its
/// scheduling counters. Counters the API did not report count as zero.
pub fn replica_banner(tree: &Value, rollout: &RolloutStatus) -> Option<ReplicaBanner> {
	let counter = |field: &str| {
		tree.pointer(&format!("/status/{field}"))
			.and_then(Value::as_i64)
			.unwrap_or_default()
	};
	let (desired, ready, unavailable) = if tree::kind(tree) == "DaemonSet" {
		(
			counter("desiredNumberScheduled"),
			counter("numberReady"),
			counter("numberUnavailable"),
		)
	} else {
		(
			counter("replicas"),
			counter("readyReplicas"),
			counter("unavailableReplicas"),
		)
	};

	if desired > 0 && ready == 0 {
		Some(ReplicaBanner::Outage)
	} else if rollout.done && ready < desired {
		Some(ReplicaBanner::NotReady(desired - ready))
	} else if rollout.done && unavailable > 0 {
		Some(ReplicaBanner::Unavailable(unavailable))
	} else {
		None
	}
}

/// Banner for any replicated workload. Kinds without a rollout notion
/// (ReplicaSet, ReplicationController) count as rolled out.
pub fn workload_banner(tree: &Value) -> Option<ReplicaBanner> {
	let rollout = match tree::kind(tree) {
		"Deployment" | "DaemonSet" | "StatefulSet" => rollout_status(tree),
		_ => RolloutStatus {
			done: true,
			..RolloutStatus::default()
		},
	};
	replica_banner(tree, &rollout)
}
