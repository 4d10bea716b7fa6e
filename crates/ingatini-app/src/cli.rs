//! CLI argument definitions for the Ingatini client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use ingatini_core::UserId;

/// Ingatini: ask questions about your own documents.
#[derive(Parser, Debug)]
#[command(name = "ingatini", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the RAG service, e.g. http://localhost:8000/api.
    #[arg(short = 'u', long = "base-url")]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Resume an existing user by id at startup.
    #[arg(long = "user-id")]
    pub user_id: Option<UserId>,

    /// Use the in-memory service instead of the network.
    #[arg(long = "offline")]
    pub offline: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > INGATINI_CONFIG env var > ~/.ingatini/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("INGATINI_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the service base URL.
    ///
    /// Priority: --base-url flag > INGATINI_API_BASE_URL env var > config file value.
    pub fn resolve_base_url(&self, config_value: &str) -> String {
        if let Some(ref url) = self.base_url {
            return url.clone();
        }
        match std::env::var("INGATINI_API_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => config_value.to_string(),
        }
    }

    /// The log filter to install, or `None` to defer to `RUST_LOG` and then config.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".ingatini").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".ingatini").join("config.toml");
    }
    PathBuf::from("config.toml")
}
