//! Server-sent events from a streaming chat-completions response.

use eventsource_stream::Eventsource;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::ChatStream;

const DONE: &str = "[DONE]";

/// Text fragments carried by the `data:` lines of `response`.
///
/// Role-only and empty deltas are dropped. Transport errors, unparsable
/// events and in-band `error` objects are yielded as errors.
pub(crate) fn fragment_stream(response: reqwest::Response) -> ChatStream {
    let fragments = response
        .bytes_stream()
        .eventsource()
        .filter_map(|event| match event {
            Ok(event) => decode(&event.data).transpose(),
            Err(e) => Some(Err(LlmError::SseParse(e.to_string()))),
        });
    Box::pin(fragments)
}

/// `Ok(None)` for events that carry no text.
fn decode(data: &str) -> Result<Option<String>, LlmError> {
    if data == DONE {
        return Ok(None);
    }
    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| LlmError::SseParse(format!("failed to parse SSE data: {e}")))?;
    if let Some(error) = event.error {
        return Err(LlmError::SseParse(format!("stream error: {}", error.message)));
    }
    Ok(event
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}
