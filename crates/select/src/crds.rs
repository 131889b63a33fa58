//! CustomResourceDefinition selectors.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use yakd_core::Resource;

use crate::{resources_by, Filter, Selection};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrdFilter {
    pub filter: Filter,
    /// Exact `spec.group`.
    pub group: Option<String>,
}

impl From<Filter> for CrdFilter {
    fn from(filter: Filter) -> Self {
        Self { filter, group: None }
    }
}

pub fn spec_group(crd: &Resource) -> &str {
    crd.str_field(&["spec", "group"])
}

pub fn spec_names_kind(crd: &Resource) -> &str {
    crd.str_field(&["spec", "names", "kind"])
}

pub fn is_namespaced(crd: &Resource) -> bool {
    crd.str_field(&["spec", "scope"]) == "Namespaced"
}

/// Highest version name by reverse lexical order, `""` when none.
pub fn latest_version(crd: &Resource) -> &str {
    crd.field(&["spec", "versions"])
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.get("name").and_then(Value::as_str))
        .max()
        .unwrap_or("")
}

pub fn crds_by<'a, I>(crds: I, filter: &CrdFilter) -> Selection
where
    I: IntoIterator<Item = &'a Arc<Resource>>,
{
    let mut selection = resources_by(crds, &filter.filter);
    if let Some(group) = filter.group.as_deref().filter(|g| !g.is_empty()) {
        selection.retain(|_, crd| spec_group(crd) == group);
    }
    selection
}

/// Distinct API groups declared by the CRDs, sorted.
pub fn groups<'a>(crds: impl IntoIterator<Item = &'a Arc<Resource>>) -> Vec<String> {
    crds.into_iter()
        .map(|crd| spec_group(crd).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yakd_core::Kind;

    fn crd(uid: &str, group: &str, versions: Value) -> Arc<Resource> {
        Arc::new(
            Resource::new(Kind::CustomResourceDefinition, uid, uid)
                .with_field(&["spec", "group"], json!(group))
                .with_field(&["spec", "scope"], json!("Namespaced"))
                .with_field(&["spec", "versions"], versions),
        )
    }

    #[test]
    fn filters_by_group_and_lists_groups() {
        let all = [
            crd("1", "cert-manager.io", json!([{"name": "v1"}])),
            crd("2", "example.com", json!([{"name": "v1alpha1"}, {"name": "v1beta1"}])),
            crd("3", "cert-manager.io", json!([])),
        ];
        let f = CrdFilter { filter: Filter::new(), group: Some("cert-manager.io".into()) };
        assert_eq!(crds_by(all.iter(), &f).len(), 2);
        assert_eq!(groups(all.iter()), vec!["cert-manager.io", "example.com"]);
        assert_eq!(latest_version(&all[1]), "v1beta1");
        assert_eq!(latest_version(&all[2]), "");
        assert!(is_namespaced(&all[0]));
    }
}
