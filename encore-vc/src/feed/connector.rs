//! Feed connectors
//!
//! A connector opens one per-setlist event stream. The feed adapter owns
//! retry and lifecycle; a connector only connects once per call.

use crate::error::FeedError;
use async_trait::async_trait;
use encore_common::events::{EventBus, VoteEvent};
use futures::stream::{BoxStream, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

/// Stream of decoded events for one setlist; ends when the channel closes
pub type EventStream = BoxStream<'static, Result<VoteEvent, FeedError>>;

#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self, setlist_id: Uuid) -> Result<EventStream, FeedError>;
}

/// In-process connector over the ledger's [`EventBus`]
#[derive(Clone)]
pub struct BusConnector {
    events: EventBus,
}

impl BusConnector {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

#[async_trait]
impl FeedConnector for BusConnector {
    async fn connect(&self, setlist_id: Uuid) -> Result<EventStream, FeedError> {
        let rx = self.events.subscribe();

        let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
            match result {
                Ok(event) if event.setlist_id() == setlist_id => Some(Ok(event)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(%setlist_id, skipped, "Feed receiver lagged");
                    Some(Err(FeedError::Lagged(skipped)))
                }
            }
        });

        Ok(stream.boxed())
    }
}
