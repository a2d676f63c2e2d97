//! Process configuration: capture interface, audit database path, and
//! classifier connection details, assembled once at startup from CLI
//! arguments and environment variables and never mutated afterward.

use clap::Parser;

const DEFAULT_IFNAME: &str = "enp0s3";
const DEFAULT_DB_PATH: &str = "/var/lib/gateguard/access.db";
const DEFAULT_AI_ENDPOINT: &str = "http://127.0.0.1:8000/v1/score";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1500;
const DEFAULT_TOTAL_TIMEOUT_MS: u64 = 3000;
const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Parser, Debug)]
#[command(name = "gateguard", about = "Inline HTTP capture, classification, and enforcement")]
struct Cli {
    /// Network interface to capture on.
    #[arg(default_value = DEFAULT_IFNAME)]
    ifname: String,
}

/// Fully resolved runtime configuration, built once in `main` and handed
/// out by reference to every module that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub ifname: String,
    pub db_path: String,
    pub ai_endpoint: String,
    pub ai_token: Option<String>,
    pub ai_connect_timeout_ms: u64,
    pub ai_total_timeout_ms: u64,
    pub ai_threshold: f64,
}

impl Config {
    /// Parses CLI arguments and layers environment variable overrides on
    /// top — the interface name is the one positional CLI argument per the
    /// engine's external interface contract; everything else is
    /// environment-driven since there's no admin API to configure it through.
    pub fn load() -> Self {
        let cli = Cli::parse();

        let db_path = std::env::var("GATEGUARD_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        let ai_endpoint =
            std::env::var("GATEGUARD_AI_ENDPOINT").unwrap_or_else(|_| DEFAULT_AI_ENDPOINT.to_string());
        let ai_token = std::env::var("GATEGUARD_AI_TOKEN").ok().filter(|s| !s.is_empty());

        let ai_connect_timeout_ms = parse_env_u64("GATEGUARD_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS);
        let ai_total_timeout_ms = parse_env_u64("GATEGUARD_TOTAL_TIMEOUT_MS", DEFAULT_TOTAL_TIMEOUT_MS);
        let ai_threshold = parse_env_f64("GATEGUARD_AI_THRESHOLD", DEFAULT_THRESHOLD);

        Config {
            ifname: cli.ifname,
            db_path,
            ai_endpoint,
            ai_token,
            ai_connect_timeout_ms,
            ai_total_timeout_ms,
            ai_threshold,
        }
    }
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
