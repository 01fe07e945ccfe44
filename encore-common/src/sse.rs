//! Server-Sent Events (SSE) wire format
//!
//! The ledger service encodes each [`VoteEvent`] as one SSE frame:
//! `event:` carries the event type, `data:` the JSON body. The voting
//! client decodes the same frames with [`SseFrameDecoder`].

use crate::events::VoteEvent;
use axum::response::sse::{Event, KeepAlive};
use std::time::Duration;
use tracing::{debug, warn};

/// Keep-alive interval for SSE connections
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Encode a VoteEvent as an SSE frame
pub fn encode_event(event: &VoteEvent) -> Result<Event, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(Event::default().event(event.event_type()).data(json))
}

/// Keep-alive comment frames so idle proxies don't drop the stream
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive")
}

/// Incremental decoder for an SSE byte stream
///
/// Bytes are pushed as they arrive; complete frames (terminated by a blank
/// line) are decoded into VoteEvents. Comments, keep-alives and frames with
/// unknown payloads are skipped.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<VoteEvent> {
        // CR LF and LF framing are treated alike
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = decode_frame(&String::from_utf8_lossy(&frame)) {
                events.push(event);
            }
        }
        events
    }
}

fn decode_frame(frame: &str) -> Option<VoteEvent> {
    let mut event_type = None;
    let mut data = String::new();

    for line in frame.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value);
            }
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<VoteEvent>(&data) {
        Ok(event) => {
            if let Some(ty) = event_type.as_deref() {
                if ty != event.event_type() {
                    debug!("SSE event field {} disagrees with payload {}", ty, event.event_type());
                }
            }
            Some(event)
        }
        Err(e) => {
            warn!("Skipping undecodable SSE frame: {}", e);
            None
        }
    }
}
