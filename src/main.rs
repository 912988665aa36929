//! Accident severity CLI entry point

use accident_severity::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accident_severity=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => cmd_train(&args)?,
        Commands::Predict(args) => cmd_predict(&args)?,
        Commands::Info { data } => cmd_info(&data)?,
    }

    Ok(())
}
