//! relink - gateway link supervisor harness

use clap::Parser;

use relink_cli::{
    app,
    cli::{Cli, Commands},
    config::AppConfig,
    script,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            report_interval_secs,
        } => app::run(config, report_interval_secs).await?,
        Commands::Simulate { script: text, json } => {
            let steps = script::parse(text.as_deref().unwrap_or(script::DEFAULT_SCRIPT))?;
            app::simulate(config, steps, json).await?;
        }
        Commands::CheckConfig { json } => app::check_config(&config, json)?,
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
