//! RoleBinding and ClusterRoleBinding selectors.

use std::sync::Arc;

use yakd_core::Resource;

use crate::{resources_by, Filter, Selection};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingFilter {
    pub filter: Filter,
    /// Exact `roleRef.name`.
    pub role_ref_name: Option<String>,
}

impl From<Filter> for BindingFilter {
    fn from(filter: Filter) -> Self {
        Self { filter, role_ref_name: None }
    }
}

pub fn role_ref_name(binding: &Resource) -> &str {
    binding.str_field(&["roleRef", "name"])
}

pub fn role_ref_kind(binding: &Resource) -> &str {
    binding.str_field(&["roleRef", "kind"])
}

/// Works for both RoleBindings and ClusterRoleBindings.
pub fn bindings_by<'a, I>(bindings: I, filter: &BindingFilter) -> Selection
where
    I: IntoIterator<Item = &'a Arc<Resource>>,
{
    let mut selection = resources_by(bindings, &filter.filter);
    if let Some(role) = filter.role_ref_name.as_deref().filter(|r| !r.is_empty()) {
        selection.retain(|_, b| role_ref_name(b) == role);
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yakd_core::Kind;

    fn crb(uid: &str, role: &str) -> Arc<Resource> {
        Arc::new(
            Resource::new(Kind::ClusterRoleBinding, uid, uid)
                .with_field(&["roleRef"], json!({"kind": "ClusterRole", "name": role})),
        )
    }

    #[test]
    fn filters_by_referenced_role() {
        let all = [crb("1", "admin"), crb("2", "view"), crb("3", "admin")];
        let f = BindingFilter { filter: Filter::new(), role_ref_name: Some("admin".into()) };
        let mut uids: Vec<_> = bindings_by(all.iter(), &f).into_keys().collect();
        uids.sort();
        assert_eq!(uids, vec!["1", "3"]);
        assert_eq!(role_ref_kind(&all[0]), "ClusterRole");
    }
}
