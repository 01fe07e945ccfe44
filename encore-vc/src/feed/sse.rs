//! SSE connector for the encore-ls realtime endpoint

use super::connector::{EventStream, FeedConnector};
use crate::error::FeedError;
use async_trait::async_trait;
use encore_common::sse::SseFrameDecoder;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    base_url: String,
}

impl SseConnector {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        Ok(Self::with_client(client, base_url.into()))
    }

    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FeedConnector for SseConnector {
    async fn connect(&self, setlist_id: Uuid) -> Result<EventStream, FeedError> {
        let url = format!("{}/api/setlists/{}/events", self.base_url, setlist_id);
        debug!("Opening SSE feed: {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let mut decoder = SseFrameDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(FeedError::Stream(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(events.boxed())
    }
}
