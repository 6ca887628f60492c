use anyhow::Result;
use clap::Parser;
use crag_engine::commands;
use crag_engine::config::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(cli.command, &mut out)
}
