mod api_client;
mod config;
mod data;
mod error;
mod logger;
mod runner;

use clap::Parser;
use config::Config;
use error::Error;
use log::error;

/// Exports the daily CPC metrics of every campaign of every vendor account
/// attached to a partner-portal login into a single CSV file.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    config: Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    logger::init(&args.config.log_dir)?;

    if let Err(err) = runner::run(args.config).await {
        error!("campaign export failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
