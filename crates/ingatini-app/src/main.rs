//! Ingatini application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the service client (HTTP, or in-memory with `--offline`)
//! 4. Probe service health and optionally resume a user
//! 5. Hand stdin to the interactive shell

mod cli;
mod shell;

use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use ingatini_client::{HttpRagClient, MockRagService, RagService};
use ingatini_core::config::IngatiniConfig;
use ingatini_session::Session;

use cli::CliArgs;
use shell::Shell;

/// Pick the log filter: --log-level, then RUST_LOG, then the config file.
fn env_filter(flag: Option<String>, config_level: &str) -> EnvFilter {
    match flag {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = IngatiniConfig::load_or_default(&config_file);
    config.service.base_url = args.resolve_base_url(&config.service.base_url);

    // Tracing goes to stderr so it never interleaves with shell output.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(args.resolve_log_level(), &config.general.log_level))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Ingatini v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Service.
    let service: Arc<dyn RagService> = if args.offline {
        tracing::info!("Offline mode: using the in-memory service");
        Arc::new(MockRagService::new())
    } else {
        let client = HttpRagClient::new(&config.service)?;
        tracing::info!(base_url = %client.base_url(), "Service client ready");
        Arc::new(client)
    };

    let mut session = Session::new(service, &config);
    println!("{}", session.probe_health().await);

    if let Some(ref user_id) = args.user_id {
        match session.resume(user_id).await {
            Ok(identity) => println!(
                "Welcome back, {}! {} document(s) uploaded",
                identity.display_name,
                session.scope().len()
            ),
            Err(err) => println!("{}", err),
        }
    }

    println!("Type `help` for commands.");
    let mut shell = Shell::new(session);
    shell.run(BufReader::new(tokio::io::stdin())).await?;

    tracing::info!("Ingatini shut down");
    Ok(())
}
