//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# AetherRE assistant configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[model]
# base_url = "https://api.openai.com/v1"
# model = "gpt-4.1-nano"
# max_tokens = 500            # 16-32000
# temperature = 0.7           # 0.0-2.0
# api_key_env = "OPENAI_API_KEY"
# request_timeout_secs = 120  # 5-600

[rate_limit]
# per_minute = 5
# per_hour = 50
# per_day = 250

[session]
# timeout_hours = 24          # 1-720
# reap_interval_secs = 60     # 5-3600

[engine]
# max_iterations = 5          # 1-20 tool executions per turn
# tool_timeout_secs = 30      # 1-300
# intent_min_matches = 1
# intent_keywords = ["analyze", "pseudocode", "assembly", "xref", "search", "jump"]
# event_buffer = 64

[server]
# host = "127.0.0.1"
# port = 8000

[data]
# dir = "data"                # holds <binary>_functions.json

[logging]
# level = "INFO"              # TRACE, DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
