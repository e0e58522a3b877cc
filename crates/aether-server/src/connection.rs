//! Per-connection handler: parse requests, answer them, stream chat turns.

use std::net::SocketAddr;
use std::sync::Arc;

use aether_ai::orchestrator::END_OF_STREAM;
use aether_ai::ChatRequest;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientMessage, ServerResponse};
use crate::state::AppState;

const OUTBOUND_BUFFER: usize = 256;

/// Handle a single WebSocket connection until the client goes away.
pub async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    addr: SocketAddr,
    state: Arc<AppState>,
) {
    let (mut sink, mut stream) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    tracing::info!(peer = %addr, "client connected");

    loop {
        tokio::select! {
            Some(frame) = out_rx.recv() => {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text(&state, &text, &out_tx).await {
                            if sink.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Dropping out_rx makes in-flight turns see a closed caller and stop.
    tracing::info!(peer = %addr, "client disconnected");
}

/// Returns the reply frame for requests answered inline. Chat turns are
/// spawned and stream through `out`; this never sends on `out` itself,
/// since the caller is the loop that drains it.
async fn handle_text(
    state: &Arc<AppState>,
    text: &str,
    out: &mpsc::Sender<String>,
) -> Option<String> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "invalid request");
            return Some(ServerResponse::error(format!("invalid request: {e}")).to_frame());
        }
    };

    match message {
        ClientMessage::Chat(request) => {
            tokio::spawn(stream_chat(Arc::clone(state), request, out.clone()));
            None
        }
        other => Some(state.dispatch(other).await.to_frame()),
    }
}

/// Run one turn and forward its events as JSON frames, then `[DONE]`.
/// If the connection closes first, the event receiver is dropped and the
/// turn stops at its next send.
pub async fn stream_chat(state: Arc<AppState>, request: ChatRequest, out: mpsc::Sender<String>) {
    let (tx, mut rx) = mpsc::channel(state.event_buffer);
    let orchestrator = Arc::clone(&state.orchestrator);
    let turn = tokio::spawn(async move { orchestrator.handle(request, &tx).await });

    while let Some(event) = rx.recv().await {
        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode event");
                continue;
            }
        };
        if out.send(frame).await.is_err() {
            tracing::debug!("connection closed mid-turn");
            return;
        }
    }

    match turn.await {
        Ok(Ok(outcome)) => tracing::debug!(?outcome, "turn finished"),
        Ok(Err(e)) => tracing::debug!(error = %e, "turn ended early"),
        Err(e) => tracing::error!(error = %e, "turn task failed"),
    }
    let _ = out.send(END_OF_STREAM.to_string()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_ai::OutputEvent;

    #[tokio::test]
    async fn chat_without_key_streams_error_then_done() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(crate::state::tests::state(dir.path()));
        let (out_tx, mut out_rx) = mpsc::channel(16);

        stream_chat(state, ChatRequest::new("hello"), out_tx).await;

        let first = out_rx.recv().await.unwrap();
        let event: OutputEvent = serde_json::from_str(&first).unwrap();
        assert_eq!(
            event.error_type,
            Some(aether_ai::orchestrator::ErrorType::ConfigurationError)
        );
        assert!(event.session_id.is_some());
        assert_eq!(out_rx.recv().await.as_deref(), Some(END_OF_STREAM));
    }

    #[tokio::test]
    async fn invalid_frame_gets_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(crate::state::tests::state(dir.path()));
        let (out_tx, _out_rx) = mpsc::channel(4);

        let frame = handle_text(&state, "not json", &out_tx).await.unwrap();
        assert!(frame.starts_with(r#"{"type":"error""#));

        let frame = handle_text(&state, r#"{"type":"ping"}"#, &out_tx).await;
        assert_eq!(frame.as_deref(), Some(r#"{"type":"pong"}"#));
    }

    #[tokio::test]
    async fn requests_are_answered_while_outbound_buffer_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(crate::state::tests::state(dir.path()));
        let (out_tx, mut out_rx) = mpsc::channel(1);
        out_tx.send("backlog".to_string()).await.unwrap();

        for request in [r#"{"type":"ping"}"#, r#"{"type":"list_sessions"}"#, "not json"] {
            let frame = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                handle_text(&state, request, &out_tx),
            )
            .await
            .expect("reply must not wait on the outbound buffer");
            assert!(frame.is_some());
        }

        assert_eq!(out_rx.recv().await.as_deref(), Some("backlog"));
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn chat_streams_through_outbound_channel() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(crate::state::tests::state(dir.path()));
        let (out_tx, mut out_rx) = mpsc::channel(16);

        let reply = handle_text(&state, r#"{"type":"chat","message":"hi"}"#, &out_tx).await;
        assert!(reply.is_none());

        let first = out_rx.recv().await.unwrap();
        assert!(first.contains("configuration_error"), "{first}");
        assert_eq!(out_rx.recv().await.as_deref(), Some(END_OF_STREAM));
    }
}
