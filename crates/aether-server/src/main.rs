//! aether-server: WebSocket front end for the reverse-engineering assistant.
//!
//! Loads configuration, wires the completion client, context provider,
//! tool registry, session store and rate limiter into one orchestrator, and
//! serves chat turns and session management over WebSocket.

mod connection;
mod protocol;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aether_ai::session::CompletionNamer;
use aether_ai::tools::register_analysis_tools;
use aether_ai::{
    CompletionClient, InMemoryContextProvider, OpenAiClient, OpenAiConfig, Orchestrator,
    RateLimiter, SessionStore, ToolRegistry, ToolUsePolicy,
};
use aether_config::{AetherConfig, ModelConfig};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing_subscriber::EnvFilter;

use crate::connection::handle_connection;
use crate::state::AppState;

const DEFAULT_LOG_DIRECTIVE: &str = "aether=info";

#[derive(Parser)]
#[command(name = "aether-server", about = "Reverse-engineering assistant over WebSocket")]
struct Args {
    /// Port to listen on (overrides server.port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file to load instead of the platform default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding `<binary>_functions.json` files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter directive, e.g. `aether=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

/// Load environment variables from a .env file (KEY=VALUE lines).
/// Variables already set in the environment win.
fn load_dotenv() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        PathBuf::from(".env"),
        manifest_dir.join("..").join("..").join(".env"),
    ];

    for path in &candidates {
        if let Ok(contents) = std::fs::read_to_string(path) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    let value = value.trim().trim_matches('"').trim_matches('\'');
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value);
                    }
                }
            }
            return;
        }
    }
}

fn openai_config(model: &ModelConfig) -> OpenAiConfig {
    OpenAiConfig::from_env(&model.api_key_env)
        .with_base_url(&model.base_url)
        .with_model(&model.model)
        .with_max_tokens(model.max_tokens)
        .with_temperature(model.temperature)
        .with_request_timeout(Duration::from_secs(model.request_timeout_secs.into()))
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => aether_config::load_config_from(path),
        None => aether_config::load_config(),
    };

    let log_directive = match (&args.log_level, &loaded) {
        (Some(level), _) => level.clone(),
        (None, Ok(config)) => format!("aether={}", config.logging.level.as_directive()),
        (None, Err(_)) => DEFAULT_LOG_DIRECTIVE.to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| DEFAULT_LOG_DIRECTIVE.parse().expect("valid default directive")),
            ),
        )
        .init();

    tracing::info!("aether-server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        AetherConfig::default()
    });

    let data_dir = args.data_dir.unwrap_or_else(|| config.data.dir.clone());
    let provider = Arc::new(InMemoryContextProvider::new(&data_dir));

    let client: Arc<dyn CompletionClient> = match OpenAiClient::new(openai_config(&config.model)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to build completion client: {e}");
            std::process::exit(1);
        }
    };

    let tools = Arc::new(
        ToolRegistry::new(provider.clone())
            .with_timeout(Duration::from_secs(config.engine.tool_timeout_secs.into())),
    );
    register_analysis_tools(&tools);
    tracing::info!(tools = tools.list().len(), "tool registry ready");

    let sessions = SessionStore::new(provider.clone())
        .with_namer(Arc::new(CompletionNamer::new(Arc::clone(&client))));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.per_minute,
        config.rate_limit.per_hour,
        config.rate_limit.per_day,
    ));
    let policy = ToolUsePolicy::new(
        &config.engine.intent_keywords,
        config.engine.intent_min_matches as usize,
    );
    let orchestrator = Orchestrator::new(client, sessions.clone(), tools, limiter, provider.clone())
        .with_policy(policy)
        .with_max_iterations(config.engine.max_iterations);

    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        sessions: sessions.clone(),
        provider,
        data_dir,
        event_buffer: config.engine.event_buffer as usize,
    });

    // Idle session reaper.
    let ttl = Duration::from_secs(u64::from(config.session.timeout_hours) * 3600);
    let interval = Duration::from_secs(config.session.reap_interval_secs.into());
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let evicted = sessions.evict_expired(ttl).await;
            let count = sessions.count().await;
            tracing::debug!(evicted, sessions = count, "Reaper tick");
        }
    });

    let port = args
        .port
        .or_else(|| u16::try_from(config.server.port).ok())
        .unwrap_or(8000);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!("aether-server listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, state).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
