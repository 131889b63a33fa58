//! yakd store: per-kind resource caches fed by the watch stream.
//!
//! One [`StoreWriter`] (owned by the watch manager) reduces [`Action`]s into a
//! fresh immutable [`State`] and swaps it in; any number of [`StoreReader`]s
//! load the latest snapshot without locking and can await epoch changes.

#![forbid(unsafe_code)]

mod kind_store;
mod state;

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use metrics::{gauge, histogram};
use tokio::sync::watch;
use tracing::trace;
use yakd_core::Kind;

pub use kind_store::{KindStore, Mutation};
pub use state::{Action, ResourceStore, State, UiState};

/// Create the single writer and a reader for a fresh, empty state.
pub fn channel() -> (StoreWriter, StoreReader) {
    let state = Arc::new(ArcSwap::from_pointee(State::default()));
    let (epoch_tx, epoch_rx) = watch::channel(0u64);
    let writer = StoreWriter { state: Arc::clone(&state), epoch_tx };
    (writer, StoreReader { state, epoch_rx })
}

/// The only mutation path into the store. Not `Clone`.
pub struct StoreWriter {
    state: Arc<ArcSwap<State>>,
    epoch_tx: watch::Sender<u64>,
}

impl StoreWriter {
    /// Reduce `action` and publish the result. Returns whether the state changed.
    pub fn dispatch(&mut self, action: impl Into<Action>) -> bool {
        let started = Instant::now();
        let mut next = State::clone(&self.state.load());
        if !next.reduce(action.into()) {
            return false;
        }
        next.epoch = next.epoch.saturating_add(1);
        let epoch = next.epoch;
        let total = next.resources.total();
        self.state.store(Arc::new(next));
        self.epoch_tx.send_replace(epoch);
        gauge!("store_resources", total as f64);
        histogram!("store_dispatch_ms", started.elapsed().as_secs_f64() * 1000.0);
        trace!(epoch, total, "store state published");
        true
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader { state: Arc::clone(&self.state), epoch_rx: self.epoch_tx.subscribe() }
    }
}

/// Read-only access to the latest published state.
#[derive(Clone)]
pub struct StoreReader {
    state: Arc<ArcSwap<State>>,
    epoch_rx: watch::Receiver<u64>,
}

impl StoreReader {
    pub fn current(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Store slice for one kind.
    pub fn kind(&self, kind: Kind) -> Arc<KindStore> {
        self.state.load().resources.kind(kind)
    }

    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> {
        self.epoch_rx.clone()
    }

    /// Resolve once `pred` holds for the published state, or with the last
    /// state once the writer is gone.
    pub async fn wait_until<F>(&self, mut pred: F) -> Arc<State>
    where
        F: FnMut(&State) -> bool,
    {
        let mut rx = self.epoch_rx.clone();
        loop {
            let _ = rx.borrow_and_update();
            let cur = self.current();
            if pred(&cur) {
                return cur;
            }
            if rx.changed().await.is_err() {
                return self.current();
            }
        }
    }
}
