//! Configuration schema types for the assistant engine.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod engine;
mod limits;
mod model;
mod server;

pub use engine::*;
pub use limits::*;
pub use model::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AetherConfig {
    pub model: ModelConfig,
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}
