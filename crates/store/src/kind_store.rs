use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;
use yakd_core::{Kind, Resource, Uid};

/// A change applied uniformly to every per-kind store.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or replace by uid.
    Upsert(Arc<Resource>),
    /// Delete by uid; absent uids are ignored.
    Remove(Arc<Resource>),
    /// Drop everything of `kind` and rebuild from `resources`.
    ReplaceAll { kind: Kind, resources: Vec<Arc<Resource>> },
    /// Empty the store for `kind` only.
    ClearKind(Kind),
    /// Empty every store.
    ClearAll,
}

impl Mutation {
    pub fn upsert(resource: Resource) -> Self {
        Mutation::Upsert(Arc::new(resource))
    }

    pub fn remove(resource: Resource) -> Self {
        Mutation::Remove(Arc::new(resource))
    }

    pub fn replace_all(kind: Kind, resources: impl IntoIterator<Item = Resource>) -> Self {
        Mutation::ReplaceAll { kind, resources: resources.into_iter().map(Arc::new).collect() }
    }
}

/// `uid -> Resource` for a single kind.
///
/// Every stored value has the store's kind; mutations carrying another kind
/// leave the store untouched. No operation fails.
#[derive(Debug, Clone, PartialEq)]
pub struct KindStore {
    kind: Kind,
    items: FxHashMap<Uid, Arc<Resource>>,
}

impl KindStore {
    pub fn new(kind: Kind) -> Self {
        Self { kind, items: FxHashMap::default() }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, uid: &str) -> Option<&Arc<Resource>> {
        self.items.get(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.items.contains_key(uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Resource>)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.items.values()
    }

    /// Returns whether the store changed.
    pub fn apply(&mut self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::Upsert(r) => self.upsert(Arc::clone(r)),
            Mutation::Remove(r) => self.remove(r),
            Mutation::ReplaceAll { kind, resources } => self.replace_all(*kind, resources),
            Mutation::ClearKind(kind) => self.clear_kind(*kind),
            Mutation::ClearAll => self.clear_all(),
        }
    }

    pub fn upsert(&mut self, resource: Arc<Resource>) -> bool {
        if !resource.is_kind(self.kind) || resource.uid().is_empty() {
            return false;
        }
        let uid = resource.uid().to_string();
        if self.items.get(&uid) == Some(&resource) {
            return false;
        }
        self.items.insert(uid, resource);
        true
    }

    pub fn remove(&mut self, resource: &Resource) -> bool {
        if !resource.is_kind(self.kind) {
            return false;
        }
        self.items.remove(resource.uid()).is_some()
    }

    pub fn replace_all(&mut self, kind: Kind, resources: &[Arc<Resource>]) -> bool {
        if kind != self.kind {
            return false;
        }
        let mut next = FxHashMap::default();
        for r in resources {
            if !r.is_kind(self.kind) || r.uid().is_empty() {
                debug!(store = %self.kind, kind = %r.kind, uid = %r.uid(), "skipping resource in replace_all");
                continue;
            }
            next.insert(r.uid().to_string(), Arc::clone(r));
        }
        let changed = next != self.items;
        self.items = next;
        changed
    }

    pub fn clear_kind(&mut self, kind: Kind) -> bool {
        if kind != self.kind {
            return false;
        }
        self.clear_all()
    }

    pub fn clear_all(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }
}
