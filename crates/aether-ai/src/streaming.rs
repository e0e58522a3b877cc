//! Server-Sent Events (SSE) reader.
//!
//! Chat completion endpoints stream `data:` lines separated by blank lines.
//! `SseReader` yields one `SseEvent` per block and works over any buffered
//! async reader, so tests can feed it plain byte slices.

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::io::StreamReader;

use crate::AiError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, when the server sends one.
    pub event: Option<String>,
    /// The event data, multi-line payloads joined with `\n`.
    pub data: String,
}

pub struct SseReader<R> {
    lines: Lines<R>,
    finished: bool,
}

/// Wrap a reqwest response body.
pub fn sse_reader(response: reqwest::Response) -> SseReader<impl AsyncBufRead + Unpin + Send> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    SseReader::new(BufReader::new(StreamReader::new(Box::pin(byte_stream))))
}

impl<R: AsyncBufRead + Unpin> SseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    /// Next complete event, or `None` once the body is exhausted.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, AiError> {
        if self.finished {
            return Ok(None);
        }

        let mut current_event: Option<String> = None;
        let mut current_data = String::new();

        while let Some(line) = self
            .lines
            .next_line()
            .await
            .map_err(|e| AiError::NetworkError(e.to_string()))?
        {
            if line.is_empty() {
                if !current_data.is_empty() {
                    return Ok(Some(SseEvent {
                        event: current_event,
                        data: current_data,
                    }));
                }
                current_event = None;
                continue;
            }

            if let Some(event_type) = line.strip_prefix("event:") {
                current_event = Some(event_type.trim_start().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                if !current_data.is_empty() {
                    current_data.push('\n');
                }
                current_data.push_str(data.strip_prefix(' ').unwrap_or(data));
            }
            // id:, retry: and comment lines are ignored
        }

        self.finished = true;
        if current_data.is_empty() {
            Ok(None)
        } else {
            Ok(Some(SseEvent {
                event: current_event,
                data: current_data,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &'static [u8]) -> Vec<SseEvent> {
        let mut reader = SseReader::new(input);
        let mut events = Vec::new();
        while let Some(event) = reader.next_event().await.unwrap() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn splits_on_blank_lines() {
        let events = collect(b"data: {\"a\":1}\n\ndata: [DONE]\n\n").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].data, "[DONE]");
    }

    #[tokio::test]
    async fn joins_multiline_data_and_keeps_event_name() {
        let events = collect(b"event: message\ndata: one\ndata: two\n\n").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[tokio::test]
    async fn ignores_comments_and_flushes_trailing_event() {
        let events = collect(b": keep-alive\n\ndata:tail").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "tail");
    }

    #[tokio::test]
    async fn empty_body_yields_nothing() {
        assert!(collect(b"").await.is_empty());
    }
}
