//! Client struct and request building.

use serde_json::json;

use crate::{AiError, CompletionRequest, Role};

use super::config::OpenAiConfig;

/// Chat completions client.
pub struct OpenAiClient {
    pub(crate) config: OpenAiConfig,
    pub(crate) http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::NetworkError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    pub(crate) fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the streaming request body. Tool results travel as user
    /// messages so no call-id bookkeeping is needed on the wire.
    pub(crate) fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                };
                json!({ "role": role, "content": msg.content })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": self.config.temperature,
            "stream": true,
        });

        if !request.tools.is_empty() {
            let tools: Vec<_> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!(request.tool_choice.as_str());
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, ToolChoice, ToolDefinition};

    fn client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig::new("k").with_base_url("http://localhost:1234/v1/"))
            .unwrap()
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(client().endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn tool_messages_are_sent_as_user() {
        let request = CompletionRequest::new(vec![
            Message::system("sys"),
            Message::user("q"),
            Message::tool("[Tool Result: get_strings]\n..."),
        ]);
        let body = client().build_request_body(&request);
        let roles: Vec<_> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["system", "user", "user"]);
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 500);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn tools_and_choice_are_included() {
        let request = CompletionRequest::new(vec![Message::user("q")])
            .with_tools(
                vec![ToolDefinition {
                    name: "get_assembly".into(),
                    description: "asm".into(),
                    parameters: serde_json::json!({"type": "object", "properties": {}}),
                }],
                ToolChoice::Required,
            )
            .with_max_tokens(20);
        let body = client().build_request_body(&request);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_assembly");
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["max_tokens"], 20);
    }
}
