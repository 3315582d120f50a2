use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line flags. Only flags that were actually passed are layered over
/// the file and environment.
#[derive(Parser, Serialize, Debug)]
#[command(name = "forum-server", version, about = "Forum chat server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, env = "FORUM_CONFIG", default_value = "./forum.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Data directory for the SQLite database
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Messages returned per chat history page
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_page_size: Option<u32>,

    /// Seconds between server keepalive pings
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,

    /// Seconds to wait for a pong before closing the connection
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong_timeout_secs: Option<u64>,

    /// Name of the cookie carrying the session token
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Resolved server settings.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub data_dir: String,
    pub history_page_size: u32,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub session_cookie: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            history_page_size: 10,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            session_cookie: "session_token".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (FORUM_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("FORUM_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Forum Chat Server Configuration
# Place this file at ./forum.toml or specify with --config <path>
# All settings can be overridden via environment variables (FORUM_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# ---- Chat ----

# Messages returned per history page (GET /messages)
# history_page_size = 10

# Keepalive: ping every N seconds, close if no pong within the timeout
# ping_interval_secs = 30
# pong_timeout_secs = 10

# Cookie carrying the session token
# session_cookie = "session_token"
"#
    .to_string()
}
