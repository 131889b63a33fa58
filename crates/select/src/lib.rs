//! yakd selectors: derive filtered, sorted views over a per-kind store.
//!
//! Everything here is a pure function of a store snapshot. The base filter
//! composes its options with AND semantics; kind-specific filters in
//! [`pods`], [`rbac`] and [`crds`] add one predicate each on top of it.

#![forbid(unsafe_code)]

pub mod crds;
pub mod pods;
pub mod rbac;

use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use yakd_core::{Resource, Uid};
use yakd_store::KindStore;

/// Filtered view, `uid -> Resource`. Iteration order carries no meaning.
pub type Selection = FxHashMap<Uid, Arc<Resource>>;

/// Filter descriptor shared by every resource list.
///
/// Empty strings count as "not set", matching how list pages pass optional
/// props. An empty `names`/`uids`/`owner_uids` set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    /// Exact `metadata.namespace`.
    pub namespace: Option<String>,
    /// `metadata.name` must be one of these.
    pub names: Option<Vec<String>>,
    /// Case-insensitive substring of `metadata.name`.
    pub name_like: Option<String>,
    /// Some owner reference has this uid.
    pub owner_uid: Option<String>,
    /// Some owner reference uid is in this set.
    pub owner_uids: Option<Vec<String>>,
    /// Own uid is in this set.
    pub uids: Option<Vec<String>>,
    /// Own uid is not in this set, whatever else matches.
    pub uids_not_in: Option<Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn name_like(mut self, needle: impl Into<String>) -> Self {
        self.name_like = Some(needle.into());
        self
    }

    pub fn owner_uid(mut self, uid: impl Into<String>) -> Self {
        self.owner_uid = Some(uid.into());
        self
    }

    pub fn owner_uids<S: Into<String>>(mut self, uids: impl IntoIterator<Item = S>) -> Self {
        self.owner_uids = Some(uids.into_iter().map(Into::into).collect());
        self
    }

    pub fn uids<S: Into<String>>(mut self, uids: impl IntoIterator<Item = S>) -> Self {
        self.uids = Some(uids.into_iter().map(Into::into).collect());
        self
    }

    pub fn uids_not_in<S: Into<String>>(mut self, uids: impl IntoIterator<Item = S>) -> Self {
        self.uids_not_in = Some(uids.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        if let Some(ns) = non_empty(&self.namespace) {
            if resource.namespace() != ns {
                return false;
            }
        }
        if let Some(names) = &self.names {
            if !contains(names, resource.name()) {
                return false;
            }
        }
        if let Some(needle) = non_empty(&self.name_like) {
            if !resource.name().to_uppercase().contains(&needle.to_uppercase()) {
                return false;
            }
        }
        let owners = resource.owner_reference_uids();
        if let Some(owner) = non_empty(&self.owner_uid) {
            if !owners.contains(&owner) {
                return false;
            }
        }
        if let Some(wanted) = &self.owner_uids {
            if !owners.iter().any(|o| contains(wanted, o)) {
                return false;
            }
        }
        if let Some(uids) = &self.uids {
            if !contains(uids, resource.uid()) {
                return false;
            }
        }
        if let Some(excluded) = &self.uids_not_in {
            if contains(excluded, resource.uid()) {
                return false;
            }
        }
        true
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

fn contains(set: &[String], value: &str) -> bool {
    set.iter().any(|s| s == value)
}

/// Entries of `resources` matching `filter`.
pub fn resources_by<'a, I>(resources: I, filter: &Filter) -> Selection
where
    I: IntoIterator<Item = &'a Arc<Resource>>,
{
    resources
        .into_iter()
        .filter(|r| filter.matches(r))
        .map(|r| (r.uid().to_string(), Arc::clone(r)))
        .collect()
}

/// Newest first; resources without a creation timestamp sort as the oldest.
/// Ties fall back to name, then uid, so output is deterministic.
pub fn sort_by_creation_timestamp(a: &Resource, b: &Resource) -> Ordering {
    b.creation_timestamp()
        .cmp(&a.creation_timestamp())
        .then_with(|| a.name().cmp(b.name()))
        .then_with(|| a.uid().cmp(b.uid()))
}

/// Values of a selection (or any resource iterator) in list order.
pub fn sorted<'a, I>(resources: I) -> Vec<Arc<Resource>>
where
    I: IntoIterator<Item = &'a Arc<Resource>>,
{
    let mut out: Vec<Arc<Resource>> = resources.into_iter().cloned().collect();
    out.sort_by(|a, b| sort_by_creation_timestamp(a, b));
    out
}

/// Resolve a route parameter that may be a uid or a name.
///
/// An exact uid match wins; otherwise the resource with that name (the one
/// with the smallest uid when several namespaces share the name).
pub fn by_uid_or_name<'a>(store: &'a KindStore, uid_or_name: &str) -> Option<&'a Arc<Resource>> {
    if let Some(r) = store.get(uid_or_name) {
        return Some(r);
    }
    store
        .values()
        .filter(|r| r.name() == uid_or_name)
        .min_by(|a, b| a.uid().cmp(b.uid()))
}
