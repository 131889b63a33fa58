use std::collections::BTreeMap;
use std::sync::Arc;

use yakd_core::Kind;

use crate::kind_store::{KindStore, Mutation};

/// One `KindStore` per watched kind.
///
/// Cloning is cheap: stores are shared until the next mutation touches them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStore {
    stores: BTreeMap<Kind, Arc<KindStore>>,
}

impl Default for ResourceStore {
    fn default() -> Self {
        let stores = Kind::ALL.iter().map(|k| (*k, Arc::new(KindStore::new(*k)))).collect();
        Self { stores }
    }
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: Kind) -> &KindStore {
        // Built with every kind in `Default`, never removed.
        &self.stores[&kind]
    }

    pub fn kind(&self, kind: Kind) -> Arc<KindStore> {
        Arc::clone(&self.stores[&kind])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Kind, &KindStore)> {
        self.stores.iter().map(|(k, s)| (*k, s.as_ref()))
    }

    pub fn total(&self) -> usize {
        self.stores.values().map(|s| s.len()).sum()
    }

    /// Apply `mutation` to every store it can affect. Returns whether anything changed.
    pub fn apply(&mut self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::Upsert(r) => match r.typed_kind() {
                Some(kind) => self.apply_to(kind, mutation),
                None => false,
            },
            Mutation::Remove(r) => match r.typed_kind() {
                Some(kind) if self.get(kind).contains(r.uid()) => self.apply_to(kind, mutation),
                _ => false,
            },
            Mutation::ReplaceAll { kind, .. } => self.apply_to(*kind, mutation),
            Mutation::ClearKind(kind) => {
                !self.get(*kind).is_empty() && self.apply_to(*kind, mutation)
            }
            Mutation::ClearAll => {
                let mut changed = false;
                for store in self.stores.values_mut() {
                    if !store.is_empty() {
                        changed |= Arc::make_mut(store).apply(mutation);
                    }
                }
                changed
            }
        }
    }

    fn apply_to(&mut self, kind: Kind, mutation: &Mutation) -> bool {
        match self.stores.get_mut(&kind) {
            Some(store) => Arc::make_mut(store).apply(mutation),
            None => false,
        }
    }
}

/// Connectivity and error banner shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub offline: bool,
    /// Dismissible error message; `None` once cleared.
    pub error: Option<String>,
    /// Times the watch stream opened (and the stores were reset for a
    /// resync). Zero until the first connection is up.
    pub stream_opens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Mutate(Mutation),
    ApiGroupsSet(Vec<String>),
    SetOffline(bool),
    SetError(String),
    ClearError,
    /// Dispatched after the on-open reset, once per connection.
    StreamOpened,
}

impl From<Mutation> for Action {
    fn from(m: Mutation) -> Self {
        Action::Mutate(m)
    }
}

/// Immutable application state published to readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    /// Bumped on every dispatch that changed something.
    pub epoch: u64,
    pub resources: ResourceStore,
    pub ui: UiState,
    pub api_groups: Arc<Vec<String>>,
}

impl State {
    /// Reduce one action in place. Returns whether the state changed.
    pub fn reduce(&mut self, action: Action) -> bool {
        match action {
            Action::Mutate(m) => self.resources.apply(&m),
            Action::ApiGroupsSet(groups) => {
                if *self.api_groups == groups {
                    return false;
                }
                self.api_groups = Arc::new(groups);
                true
            }
            Action::SetOffline(offline) => {
                let changed = self.ui.offline != offline;
                self.ui.offline = offline;
                changed
            }
            Action::SetError(error) => {
                let changed = self.ui.error.as_deref() != Some(error.as_str());
                self.ui.error = Some(error);
                changed
            }
            Action::ClearError => self.ui.error.take().is_some(),
            Action::StreamOpened => {
                self.ui.stream_opens = self.ui.stream_opens.saturating_add(1);
                true
            }
        }
    }
}
