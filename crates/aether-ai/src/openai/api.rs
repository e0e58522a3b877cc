//! CompletionClient implementation for OpenAiClient.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::streaming::sse_reader;
use crate::{AiError, CompletionClient, CompletionRequest, DeltaStream};

use super::chunk::parse_chunk;
use super::client::OpenAiClient;

const DONE_SENTINEL: &str = "[DONE]";
const DELTA_BUFFER: usize = 64;

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn ensure_configured(&self) -> Result<(), AiError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(AiError::NotConfigured(
                "OpenAI API key not configured. Please set your API key in the backend configuration."
                    .into(),
            ))
        }
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, AiError> {
        self.ensure_configured()?;
        let body = self.build_request_body(&request);
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        debug!(
            model = %self.config.model,
            tools = request.tools.len(),
            tool_choice = request.tool_choice.as_str(),
            "chat completion streaming request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout
                } else {
                    AiError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(AiError::Unauthorized(format!("HTTP {status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(AiError::ApiError(format!("HTTP {status}: {text}")));
        }

        let (tx, rx) = mpsc::channel(DELTA_BUFFER);
        tokio::spawn(async move {
            let mut reader = sse_reader(response);
            loop {
                let event = match reader.next_event().await {
                    Ok(Some(event)) => event,
                    Ok(None) => {
                        warn!("completion stream closed without {DONE_SENTINEL}");
                        return;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                if event.data.trim() == DONE_SENTINEL {
                    return;
                }

                match parse_chunk(&event.data) {
                    Ok(deltas) => {
                        for delta in deltas {
                            if tx.send(Ok(delta)).await.is_err() {
                                debug!("delta receiver dropped, abandoning stream");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
