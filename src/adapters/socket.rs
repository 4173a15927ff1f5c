//! Push-socket (WebSocket) adapter.
//!
//! One inbound text or binary message may hold several newline separated records. The
//! connection is never re-established automatically.

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::{AdapterEvent, EventSink};
use crate::data::sample::{Sample, SampleParser};
use crate::error::{AdapterError, ConfigError};

/// Reject anything that is not a `ws://` or `wss://` URL before dialing.
pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| ConfigError::InvalidEndpoint(format!("{url:?} is not a ws:// or wss:// URL")))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::InvalidEndpoint(format!("{url:?} has no host")));
    }
    Ok(())
}

/// Split one message into records and parse them, skipping malformed ones.
pub fn decode_message(text: &str, parser: &SampleParser, sink: &EventSink) -> Vec<Sample> {
    text.split('\n')
        .filter_map(|line| sink.decode_line(parser, line))
        .collect()
}

pub async fn run(url: String, parser: SampleParser, sink: EventSink) {
    if let Err(err) = validate_url(&url) {
        sink.send(AdapterEvent::Failed(err.into()));
        return;
    }
    let (mut ws, _) = match connect_async(url.trim()).await {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(source = %sink.source(), %url, %err, "socket connect failed");
            sink.send(AdapterEvent::Failed(AdapterError::ConnectFailed(err.to_string())));
            return;
        }
    };
    tracing::info!(source = %sink.source(), %url, "socket open");
    sink.send(AdapterEvent::Opened);

    let reason = loop {
        let text = match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| format!("closed by peer ({}): {}", f.code, f.reason))
                    .unwrap_or_else(|| "closed by peer".to_string());
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => break err.to_string(),
            None => break "connection closed".to_string(),
        };
        let samples = decode_message(&text, &parser, &sink);
        if !samples.is_empty() && !sink.send(AdapterEvent::Samples(samples)) {
            // cancelled or the UI went away
            let _ = ws.close(None).await;
            return;
        }
    };
    tracing::warn!(source = %sink.source(), %reason, "socket stream ended");
    sink.send(AdapterEvent::Failed(AdapterError::StreamClosed(reason)));
    let _ = ws.close(None).await;
}
