use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

use sitesync::cli::{normalize_args, Cli};
use sitesync::config::StoreCredentials;
use sitesync::logging;
use sitesync::remote::S3Store;
use sitesync::sync::SyncEngine;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let credentials = StoreCredentials::from_env()?;
    let store = S3Store::connect(
        &cli.bucket,
        &cli.region,
        cli.endpoint.as_deref(),
        &credentials,
    )
    .await;

    let bucket = cli.bucket.clone();
    let engine = SyncEngine::new(Arc::new(store), cli.into_config());
    engine
        .sync()
        .await
        .with_context(|| format!("sync to bucket {} failed", bucket))?;

    Ok(())
}
