#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::json;
use yakd_core::{Kind, Resource};
use yakd_store::{KindStore, Mutation, ResourceStore};

fn pod(uid: &str, name: &str) -> Resource {
    Resource::new(Kind::Pod, uid, name).with_namespace("default")
}

fn svc(uid: &str, name: &str) -> Resource {
    Resource::new(Kind::Service, uid, name).with_namespace("default")
}

fn uids(store: &KindStore) -> Vec<String> {
    let mut out: Vec<String> = store.iter().map(|(uid, _)| uid.to_string()).collect();
    out.sort();
    out
}

#[test]
fn upsert_is_idempotent() {
    let mut once = KindStore::new(Kind::Pod);
    assert!(once.apply(&Mutation::upsert(pod("p1", "a"))));

    let mut twice = once.clone();
    assert!(!twice.apply(&Mutation::upsert(pod("p1", "a"))), "same resource twice is not a change");
    assert_eq!(once, twice);
    assert_eq!(twice.len(), 1);
}

#[test]
fn upsert_replaces_wholesale() {
    let mut store = KindStore::new(Kind::Pod);
    store.apply(&Mutation::upsert(pod("p1", "old").with_label("v", "1")));
    store.apply(&Mutation::upsert(pod("p1", "new")));

    assert_eq!(store.len(), 1);
    let r = store.get("p1").unwrap();
    assert_eq!(r.name(), "new");
    assert!(r.labels().is_empty(), "previous fields do not survive a replace");
}

#[test]
fn other_kinds_never_touch_the_store() {
    let mut store = KindStore::new(Kind::Pod);
    store.apply(&Mutation::upsert(pod("shared", "a")));
    let before = store.clone();

    // Same uid, different kind.
    assert!(!store.apply(&Mutation::upsert(svc("other", "b"))));
    assert!(!store.apply(&Mutation::remove(svc("shared", "a"))));
    assert!(!store.apply(&Mutation::replace_all(Kind::Service, vec![svc("x", "x")])));
    assert!(!store.apply(&Mutation::ClearKind(Kind::Service)));
    assert_eq!(store, before);
}

#[test]
fn removing_an_absent_uid_is_a_noop() {
    let mut store = KindStore::new(Kind::Pod);
    store.apply(&Mutation::upsert(pod("p1", "a")));
    let before = store.clone();

    assert!(!store.apply(&Mutation::remove(pod("missing", "zz"))));
    assert_eq!(store, before);

    assert!(store.apply(&Mutation::remove(pod("p1", "a"))));
    assert!(store.is_empty());
    assert!(!store.apply(&Mutation::remove(pod("p1", "a"))));
}

#[test]
fn replace_all_replaces_rather_than_merges() {
    let mut store = KindStore::new(Kind::Pod);
    store.apply(&Mutation::upsert(pod("a", "a")));
    store.apply(&Mutation::upsert(pod("c", "c")));

    store.apply(&Mutation::replace_all(Kind::Pod, vec![pod("a", "a"), pod("b", "b")]));
    assert_eq!(uids(&store), vec!["a", "b"]);

    store.apply(&Mutation::replace_all(Kind::Pod, Vec::new()));
    assert!(store.is_empty());
}

#[test]
fn replace_all_skips_foreign_kinds_in_the_list() {
    let mut store = KindStore::new(Kind::Pod);
    store.apply(&Mutation::replace_all(Kind::Pod, vec![pod("a", "a"), svc("s", "s")]));
    assert_eq!(uids(&store), vec!["a"]);
}

#[test]
fn clear_kind_only_clears_its_own_kind() {
    let mut rs = ResourceStore::new();
    rs.apply(&Mutation::upsert(pod("p1", "a")));
    rs.apply(&Mutation::upsert(svc("s1", "b")));

    assert!(rs.apply(&Mutation::ClearKind(Kind::Pod)));
    assert!(rs.get(Kind::Pod).is_empty());
    assert_eq!(rs.get(Kind::Service).len(), 1);
    assert!(!rs.apply(&Mutation::ClearKind(Kind::Pod)), "already empty");
}

#[test]
fn clear_all_wipes_every_kind() {
    let mut rs = ResourceStore::new();
    rs.apply(&Mutation::upsert(pod("p1", "a")));
    rs.apply(&Mutation::upsert(svc("s1", "b")));
    rs.apply(&Mutation::upsert(
        Resource::new(Kind::ConfigMap, "c1", "cfg").with_field(&["data", "k"], json!("v")),
    ));
    assert_eq!(rs.total(), 3);

    assert!(rs.apply(&Mutation::ClearAll));
    assert_eq!(rs.total(), 0);
    for (_, store) in rs.iter() {
        assert!(store.is_empty());
    }
    assert!(!rs.apply(&Mutation::ClearAll));
}

#[test]
fn unknown_kinds_are_ignored_by_the_aggregate() {
    let mut rs = ResourceStore::new();
    let mut widget = pod("w1", "w");
    widget.kind = "Widget".to_string();
    assert!(!rs.apply(&Mutation::upsert(widget)));
    assert_eq!(rs.total(), 0);
}

#[test]
fn snapshots_are_not_affected_by_later_mutations() {
    let mut rs = ResourceStore::new();
    rs.apply(&Mutation::upsert(pod("p1", "a")));
    let snapshot = rs.kind(Kind::Pod);

    rs.apply(&Mutation::upsert(pod("p2", "b")));
    rs.apply(&Mutation::remove(pod("p1", "a")));

    assert_eq!(uids(&snapshot), vec!["p1"]);
    assert_eq!(uids(rs.get(Kind::Pod)), vec!["p2"]);
    assert!(Arc::strong_count(&snapshot) >= 1);
}
