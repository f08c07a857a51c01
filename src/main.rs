//! ytrag CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ytrag::cli::{commands, Cli, Commands, Output};
use ytrag::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(std::path::PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ytrag={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Execute command
    match &cli.command {
        Commands::Run {
            url,
            lang,
            per_volume,
            output,
        } => {
            let run = commands::run_channel(url, lang, *per_volume, output.clone(), settings);
            tokio::select! {
                result = run => result?,
                _ = tokio::signal::ctrl_c() => {
                    Output::warning("Interrupted. Finished videos are recorded; run again to resume.");
                    std::process::exit(130);
                }
            }
        }

        Commands::Status => {
            commands::run_status(&settings)?;
        }

        Commands::Clean {
            file,
            output,
            format,
        } => {
            commands::run_clean(file, output.as_deref(), format.as_deref(), &settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, config_path.as_ref())?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &settings, config_path.as_ref())?;
        }
    }

    Ok(())
}
