//! One watch stream connection and its reader task.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::transport::Transport;

const SIGNAL_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ReadyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }
}

/// What the reader task reports to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Signal {
    Opened,
    Message(String),
    Error(String),
}

/// A live (or dead) stream. The reader task never reconnects on its own:
/// once it reports an error the state stays `Closed` until the manager
/// replaces the whole connection.
pub(crate) struct Connection {
    id: u64,
    ready: Arc<AtomicU8>,
    signals: mpsc::Receiver<Signal>,
    reader: JoinHandle<()>,
}

impl Connection {
    pub(crate) fn open(id: u64, transport: Arc<dyn Transport>) -> Self {
        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (tx, signals) = mpsc::channel(SIGNAL_BUFFER);
        let reader = tokio::spawn(read_stream(id, transport, Arc::clone(&ready), tx));
        Self { id, ready, signals, reader }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::Acquire))
    }

    pub(crate) async fn recv(&mut self) -> Option<Signal> {
        self.signals.recv().await
    }

    pub(crate) fn close(&mut self) {
        self.reader.abort();
        self.signals.close();
        self.ready.store(ReadyState::Closed as u8, Ordering::Release);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_stream(
    id: u64,
    transport: Arc<dyn Transport>,
    ready: Arc<AtomicU8>,
    tx: mpsc::Sender<Signal>,
) {
    let closed = |reason: String| {
        ready.store(ReadyState::Closed as u8, Ordering::Release);
        Signal::Error(reason)
    };
    let mut stream = match transport.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(closed(e.to_string())).await;
            return;
        }
    };
    ready.store(ReadyState::Open as u8, Ordering::Release);
    if tx.send(Signal::Opened).await.is_err() {
        return;
    }
    while let Some(item) = stream.next().await {
        let signal = match item {
            Ok(data) => Signal::Message(data),
            Err(e) => {
                let _ = tx.send(closed(e.to_string())).await;
                return;
            }
        };
        if tx.send(signal).await.is_err() {
            return;
        }
    }
    debug!(connection = id, "watch stream ended");
    let _ = tx.send(closed("stream ended".to_string())).await;
}
