#![forbid(unsafe_code)]

use std::time::Duration;

use yakd_core::{Kind, Resource};
use yakd_store::{channel, Action, Mutation};

fn pod(uid: &str) -> Resource {
    Resource::new(Kind::Pod, uid, uid).with_namespace("default")
}

#[test]
fn dispatch_publishes_new_epochs_only_on_change() {
    let (mut writer, reader) = channel();
    assert_eq!(reader.current().epoch, 0);

    assert!(writer.dispatch(Mutation::upsert(pod("p1"))));
    assert_eq!(reader.current().epoch, 1);
    assert_eq!(reader.kind(Kind::Pod).len(), 1);

    assert!(!writer.dispatch(Mutation::upsert(pod("p1"))));
    assert!(!writer.dispatch(Action::SetOffline(false)));
    assert_eq!(reader.current().epoch, 1);
}

#[test]
fn ui_slice_tracks_offline_and_errors() {
    let (mut writer, reader) = channel();

    writer.dispatch(Action::SetOffline(true));
    writer.dispatch(Action::SetError("500 boom".to_string()));
    let s = reader.current();
    assert!(s.ui.offline);
    assert_eq!(s.ui.error.as_deref(), Some("500 boom"));

    writer.dispatch(Action::ClearError);
    writer.dispatch(Action::ApiGroupsSet(vec!["apps".into(), "batch".into()]));
    let s = reader.current();
    assert!(s.ui.error.is_none());
    assert_eq!(s.api_groups.as_slice(), ["apps".to_string(), "batch".to_string()]);
}

#[test]
fn readers_hold_consistent_snapshots() {
    let (mut writer, reader) = channel();
    writer.dispatch(Mutation::upsert(pod("p1")));
    let before = reader.current();

    writer.dispatch(Mutation::ClearAll);
    assert_eq!(before.resources.get(Kind::Pod).len(), 1);
    assert_eq!(reader.current().resources.total(), 0);
}

#[tokio::test]
async fn wait_until_resolves_after_matching_dispatch() {
    let (mut writer, reader) = channel();
    let waiter = {
        let reader = reader.clone();
        tokio::spawn(async move { reader.wait_until(|s| s.resources.get(Kind::Pod).len() == 2).await })
    };

    writer.dispatch(Mutation::upsert(pod("p1")));
    tokio::time::sleep(Duration::from_millis(5)).await;
    writer.dispatch(Mutation::upsert(pod("p2")));

    let state = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
    assert_eq!(state.resources.get(Kind::Pod).len(), 2);
}

#[tokio::test]
async fn wait_until_returns_when_writer_is_dropped() {
    let (writer, reader) = channel();
    drop(writer);
    let state = tokio::time::timeout(Duration::from_secs(2), reader.wait_until(|_| false))
        .await
        .unwrap();
    assert_eq!(state.epoch, 0);
}

#[test]
fn stream_opened_counts_connections() {
    let (mut writer, reader) = channel();
    writer.dispatch(Action::ApiGroupsSet(vec!["apps".into()]));
    assert_eq!(reader.current().ui.stream_opens, 0);

    writer.dispatch(Action::SetOffline(false));
    writer.dispatch(Mutation::ClearAll);
    assert!(writer.dispatch(Action::StreamOpened));
    assert!(writer.dispatch(Action::StreamOpened));
    assert_eq!(reader.current().ui.stream_opens, 2);
}
