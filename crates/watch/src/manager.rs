//! The watch manager task.
//!
//! A single task owns the stream connection, the liveness timer, the
//! in-flight probe and the [`StoreWriter`], so every store mutation is
//! applied in order by one writer.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use yakd_core::{decode, ErrorPayload, Kind, WatchEvent};
use yakd_store::{Action, Mutation, StoreWriter};

use crate::config::WatchConfig;
use crate::connection::{Connection, ReadyState, Signal};
use crate::error::Result;
use crate::probe::{ApiProbe, HttpApi};
use crate::transport::{SseTransport, Transport};

/// UI error shown while the liveness probe keeps failing.
pub const POLL_ERROR: &str = "Error when polling resources (retrying)";

/// Handle to a running watch manager. Dropping it cancels the task without
/// waiting; [`WatchManager::stop`] also joins it.
pub struct WatchManager {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchManager {
    /// Start against the dashboard backend described by `config`.
    pub fn start(config: &WatchConfig, writer: StoreWriter) -> Result<Self> {
        let transport = Arc::new(SseTransport::new(config)?);
        let probe = Arc::new(HttpApi::new(config)?);
        Ok(Self::start_with(transport, probe, writer, config.poll_interval))
    }

    /// Start with explicit seams. Must be called inside a tokio runtime.
    pub fn start_with(
        transport: Arc<dyn Transport>,
        probe: Arc<dyn ApiProbe>,
        writer: StoreWriter,
        poll_interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = Worker { transport, probe, writer, poll_interval, connections: 0 };
        let task = tokio::spawn(worker.run(cancel.clone()));
        info!(poll_interval_ms = poll_interval.as_millis() as u64, "watch manager started");
        Self { cancel, task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the timer and any in-flight probe, close the stream and wait
    /// for the task. Nothing is dispatched after this returns.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(error = %e, "watch manager task panicked");
                }
            }
        }
        info!("watch manager stopped");
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type ProbeFuture = BoxFuture<'static, Result<Vec<String>>>;

enum Poll {
    Sleeping(Pin<Box<Sleep>>),
    Probing(ProbeFuture),
}

enum PollStep {
    Due,
    Probed(Result<Vec<String>>),
}

impl Poll {
    fn sleeping(interval: Duration) -> Self {
        Poll::Sleeping(Box::pin(sleep(interval)))
    }

    /// Each variant is driven to completion once and then replaced.
    async fn next(&mut self) -> PollStep {
        match self {
            Poll::Sleeping(timer) => {
                timer.as_mut().await;
                PollStep::Due
            }
            Poll::Probing(probe) => PollStep::Probed(probe.as_mut().await),
        }
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    probe: Arc<dyn ApiProbe>,
    writer: StoreWriter,
    poll_interval: Duration,
    connections: u64,
}

impl Worker {
    async fn run(mut self, cancel: CancellationToken) {
        let mut conn = self.connect();
        let mut poll = Poll::Probing(self.probe());
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(signal) = conn.recv() => self.on_signal(conn.id(), signal),
                step = poll.next() => match step {
                    PollStep::Due => poll = Poll::Probing(self.probe()),
                    PollStep::Probed(result) => {
                        self.on_probe(result);
                        if conn.ready_state() == ReadyState::Closed {
                            error!(connection = conn.id(), "watch stream lost, reconnecting");
                            counter!("watch_reconnects_total", 1);
                            self.writer.dispatch(Action::SetOffline(true));
                            conn.close();
                            conn = self.connect();
                        }
                        poll = Poll::sleeping(self.poll_interval);
                    }
                },
            }
        }
        conn.close();
        debug!(connection = conn.id(), "watch manager task exiting");
    }

    fn connect(&mut self) -> Connection {
        self.connections += 1;
        debug!(connection = self.connections, "opening watch connection");
        Connection::open(self.connections, Arc::clone(&self.transport))
    }

    fn probe(&self) -> ProbeFuture {
        let probe = Arc::clone(&self.probe);
        Box::pin(async move { probe.list_groups().await })
    }

    fn on_probe(&mut self, result: Result<Vec<String>>) {
        match result {
            Ok(groups) => {
                debug!(groups = groups.len(), "api groups listed");
                self.writer.dispatch(Action::ApiGroupsSet(groups));
            }
            Err(e) => {
                warn!(error = %e, "api probe failed");
                counter!("watch_probe_failures_total", 1);
                self.writer.dispatch(Action::SetError(POLL_ERROR.to_string()));
            }
        }
    }

    fn on_signal(&mut self, connection: u64, signal: Signal) {
        match signal {
            Signal::Opened => {
                info!(connection, "watch stream open");
                self.writer.dispatch(Action::SetOffline(false));
                self.writer.dispatch(Mutation::ClearAll);
                self.writer.dispatch(Action::StreamOpened);
            }
            Signal::Message(data) => self.on_message(&data),
            Signal::Error(reason) => {
                warn!(connection, %reason, "watch stream error");
                self.writer.dispatch(Action::SetOffline(true));
            }
        }
    }

    fn on_message(&mut self, data: &str) {
        counter!("watch_events_total", 1);
        match decode(data) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => debug!("ignoring watch message without a handled type or object"),
            Err(e) => {
                counter!("watch_decode_errors_total", 1);
                warn!(error = %e, "dropping undecodable watch message");
            }
        }
    }

    fn apply(&mut self, event: WatchEvent) {
        let event_type = event.event_type();
        match event {
            WatchEvent::Added(resource) | WatchEvent::Modified(resource) => {
                debug!(%event_type, kind = %resource.kind, uid = resource.uid(), "upsert");
                self.writer.dispatch(Mutation::upsert(resource));
            }
            WatchEvent::Deleted(resource) => {
                debug!(%event_type, kind = %resource.kind, uid = resource.uid(), "remove");
                self.writer.dispatch(Mutation::remove(resource));
            }
            WatchEvent::Error(ErrorPayload::RequestRestart { kind }) => match kind.parse::<Kind>() {
                Ok(kind) => {
                    info!(%kind, "backend watcher restarting, clearing kind");
                    self.writer.dispatch(Mutation::ClearKind(kind));
                }
                Err(_) => debug!(%kind, "restart marker for an unwatched kind"),
            },
            WatchEvent::Error(payload) => {
                let message = payload.display_message();
                warn!(%message, "backend reported an error");
                self.writer.dispatch(Action::SetError(message));
            }
        }
    }
}
