//! Server configuration.
//!
//! Everything is read from the environment so the editor extension can
//! point the server at a parser build without a config file.

use std::path::PathBuf;
use std::time::Duration;

/// Default parser executable, resolved via `PATH`.
pub const DEFAULT_PARSER_PATH: &str = "arch-parser";

/// Default quiet period after the last edit before re-analysis runs.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default wall-clock budget for a single parser invocation.
pub const DEFAULT_PARSE_TIMEOUT_MS: u64 = 10_000;

/// Runtime configuration for the language server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the external arch parser executable.
    pub parser_path: PathBuf,
    /// Debounce window for change-triggered analysis.
    pub debounce: Duration,
    /// Upper bound on one parser subprocess run.
    pub parse_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            parser_path: PathBuf::from(DEFAULT_PARSER_PATH),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            parse_timeout: Duration::from_millis(DEFAULT_PARSE_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    /// Read configuration from `ARCH_PARSER_PATH`, `ARCH_LSP_DEBOUNCE_MS`
    /// and `ARCH_LSP_PARSE_TIMEOUT_MS`, falling back to defaults for
    /// absent or unparsable values.
    pub fn from_env() -> Self {
        let parser_path = std::env::var("ARCH_PARSER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PARSER_PATH));
        Self {
            parser_path,
            debounce: env_millis("ARCH_LSP_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS),
            parse_timeout: env_millis("ARCH_LSP_PARSE_TIMEOUT_MS", DEFAULT_PARSE_TIMEOUT_MS),
        }
    }
}

fn env_millis(name: &str, default: u64) -> Duration {
    let millis = std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}
