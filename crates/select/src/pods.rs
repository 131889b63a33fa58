//! Pod selectors.

use std::sync::Arc;

use serde_json::Value;
use yakd_core::Resource;

use crate::{resources_by, Filter, Selection};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodFilter {
    pub filter: Filter,
    /// Exact `spec.nodeName`.
    pub node_name: Option<String>,
}

impl From<Filter> for PodFilter {
    fn from(filter: Filter) -> Self {
        Self { filter, node_name: None }
    }
}

pub fn node_name(pod: &Resource) -> &str {
    pod.str_field(&["spec", "nodeName"])
}

pub fn status_phase(pod: &Resource) -> &str {
    pod.str_field(&["status", "phase"])
}

fn container_statuses(pod: &Resource) -> &[Value] {
    pod.field(&["status", "containerStatuses"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// At least one container status, and all of them ready.
pub fn containers_ready(pod: &Resource) -> bool {
    let statuses = container_statuses(pod);
    !statuses.is_empty()
        && statuses.iter().all(|cs| cs.get("ready").and_then(Value::as_bool).unwrap_or(false))
}

pub fn is_succeeded(pod: &Resource) -> bool {
    status_phase(pod) == "Succeeded"
}

pub fn restart_count(pod: &Resource) -> u64 {
    container_statuses(pod)
        .iter()
        .filter_map(|cs| cs.get("restartCount").and_then(Value::as_u64))
        .sum()
}

pub fn ready_count<'a>(pods: impl IntoIterator<Item = &'a Arc<Resource>>) -> usize {
    pods.into_iter().filter(|p| containers_ready(p)).count()
}

pub fn succeeded_count<'a>(pods: impl IntoIterator<Item = &'a Arc<Resource>>) -> usize {
    pods.into_iter().filter(|p| is_succeeded(p)).count()
}

pub fn pods_by<'a, I>(pods: I, filter: &PodFilter) -> Selection
where
    I: IntoIterator<Item = &'a Arc<Resource>>,
{
    let mut selection = resources_by(pods, &filter.filter);
    if let Some(node) = filter.node_name.as_deref().filter(|n| !n.is_empty()) {
        selection.retain(|_, pod| node_name(pod) == node);
    }
    selection
}
