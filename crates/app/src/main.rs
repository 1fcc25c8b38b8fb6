use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use reel::Cli;
use reel::settings::SettingsStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let store = SettingsStore::load(cli.config.clone());
    init_tracing(&store.settings().log_filter);

    match reel::app::run(cli, store, std::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(error = ?error, "command failed");
            eprintln!("{} {error}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr so stdout stays
/// clean for rendered output.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
