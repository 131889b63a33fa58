//! Opening the watch stream.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tracing::debug;

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};

/// Raw `data` payloads of a watch stream, in arrival order. An `Err` item
/// ends the stream.
pub type MessageStream = BoxStream<'static, Result<String>>;

/// Something that can open a watch stream. Each call is a fresh connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Resolves once the server accepted the stream.
    async fn connect(&self) -> Result<MessageStream>;
}

/// Server-sent events from `{api_url}/watch`.
#[derive(Clone)]
pub struct SseTransport {
    client: Client,
    url: String,
}

impl SseTransport {
    pub fn new(config: &WatchConfig) -> Result<Self> {
        config.validate()?;
        // No overall request timeout: it would cut the stream body.
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| WatchError::Config(e.to_string()))?;
        Ok(Self::with_client(client, config.watch_url()))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> Result<MessageStream> {
        debug!(url = %self.url, "opening watch stream");
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|source| WatchError::Connect { url: self.url.clone(), source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::Status { url: self.url.clone(), status: status.as_u16() });
        }
        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) if event.data.is_empty() => None,
                    Ok(event) => Some(Ok(event.data)),
                    Err(e) => Some(Err(WatchError::Stream(e.to_string()))),
                })
            })
            .boxed();
        Ok(stream)
    }
}
