//! Session title generation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{AiError, CompletionClient, CompletionRequest, Message};

const TITLE_MAX_CHARS: usize = 50;
const PROMPT_MESSAGE_CHARS: usize = 100;
const NAMING_MAX_TOKENS: u32 = 20;

const NAMING_PROMPT: &str = "Generate a short, descriptive title (max 6 words) for a chat based on the first message and function being analyzed. The title should capture the main topic or question.";

/// How a session got its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOutcome {
    Generated(String),
    Fallback(String),
}

impl NameOutcome {
    pub fn name(&self) -> &str {
        match self {
            NameOutcome::Generated(name) | NameOutcome::Fallback(name) => name,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, NameOutcome::Generated(_))
    }
}

#[async_trait]
pub trait SessionNamer: Send + Sync {
    async fn generate(&self, first_message: &str, function_name: Option<&str>) -> Result<String, AiError>;
}

/// Asks the completion service for a title.
pub struct CompletionNamer {
    client: Arc<dyn CompletionClient>,
}

impl CompletionNamer {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionNamer for CompletionNamer {
    async fn generate(&self, first_message: &str, function_name: Option<&str>) -> Result<String, AiError> {
        self.client.ensure_configured()?;
        let excerpt: String = first_message.chars().take(PROMPT_MESSAGE_CHARS).collect();
        let request = CompletionRequest::new(vec![
            Message::system(NAMING_PROMPT),
            Message::user(format!(
                "First message: {excerpt}\nFunction: {}",
                function_name.unwrap_or("Unknown")
            )),
        ])
        .with_max_tokens(NAMING_MAX_TOKENS);
        self.client.complete_text(request).await
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Deterministic name derived from the first message.
pub fn fallback_name(first_message: &str) -> String {
    let collapsed = first_message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "New chat".to_string();
    }
    truncate_chars(&collapsed, TITLE_MAX_CHARS)
}

/// Normalize a model-produced title: strip quotes, trim, cap length.
pub fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    if title.is_empty() {
        None
    } else {
        Some(truncate_chars(title, TITLE_MAX_CHARS))
    }
}

/// Produce a name, never failing: the namer's title when it yields one,
/// the fallback otherwise.
pub async fn resolve_name(
    namer: &dyn SessionNamer,
    first_message: &str,
    function_name: Option<&str>,
) -> NameOutcome {
    match namer.generate(first_message, function_name).await {
        Ok(raw) => match clean_title(&raw) {
            Some(title) => {
                debug!(title = %title, "generated session title");
                NameOutcome::Generated(title)
            }
            None => NameOutcome::Fallback(fallback_name(first_message)),
        },
        Err(e) => {
            warn!(error = %e, "session naming failed, keeping fallback");
            NameOutcome::Fallback(fallback_name(first_message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, ()>);

    #[async_trait]
    impl SessionNamer for Fixed {
        async fn generate(&self, _: &str, _: Option<&str>) -> Result<String, AiError> {
            self.0
                .map(String::from)
                .map_err(|_| AiError::NetworkError("down".into()))
        }
    }

    #[test]
    fn fallback_truncates_and_collapses() {
        assert_eq!(fallback_name("  what   does\nthis do "), "what does this do");
        let long = "a".repeat(80);
        let name = fallback_name(&long);
        assert_eq!(name.chars().count(), 50);
        assert!(name.ends_with("..."));
        assert_eq!(fallback_name("   "), "New chat");
    }

    #[test]
    fn clean_title_strips_quotes() {
        assert_eq!(clean_title("\"Key Check Analysis\"\n").as_deref(), Some("Key Check Analysis"));
        assert_eq!(clean_title(" '' "), None);
    }

    #[tokio::test]
    async fn resolve_name_outcomes() {
        let generated = resolve_name(&Fixed(Ok("\"Decrypt Routine\"")), "what is this", None).await;
        assert_eq!(generated, NameOutcome::Generated("Decrypt Routine".into()));

        let failed = resolve_name(&Fixed(Err(())), "what is this", None).await;
        assert_eq!(failed, NameOutcome::Fallback("what is this".into()));
        assert!(!failed.is_generated());

        let blank = resolve_name(&Fixed(Ok("  ")), "hello", None).await;
        assert_eq!(blank.name(), "hello");
    }
}
