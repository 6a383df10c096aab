mod cli;
mod commands;
mod config;
mod telemetry;

use clap::Parser;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = cli::CliArgs::parse();
    let config = config::AppConfig::try_from(args)?;
    telemetry::init(&config.telemetry)?;
    commands::run(config).await
}
