//! caching-proxy: CLI entry point.

use std::process::ExitCode;

use caching_proxy::cli::Cli;
use caching_proxy::config::{Action, ConfigError};
use caching_proxy::{CacheStore, Proxy, RunError, logging};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format, cli.verbose) {
        eprintln!("Error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let action = match Action::from_cli(&cli) {
        Ok(action) => action,
        Err(e) => {
            let kind = match e {
                ConfigError::MissingArguments => ErrorKind::MissingRequiredArgument,
                ConfigError::InvalidOrigin { .. } => ErrorKind::ValueValidation,
                ConfigError::CacheDir(_) => ErrorKind::Io,
            };
            Cli::command().error(kind, e).exit()
        }
    };

    match run(action).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(action: Action) -> Result<(), RunError> {
    match action {
        Action::ClearCache(dir) => {
            CacheStore::open(dir).await?.clear().await?;
            println!("Cache cleared.");
            Ok(())
        }
        Action::Serve(config) => {
            let proxy = Proxy::bind(&config).await?;
            println!(
                "Caching proxy listening on http://localhost:{} -> {}",
                proxy.local_addr().port(),
                config.origin
            );
            proxy.run_until(shutdown_signal()).await?;
            println!("Shutting down proxy server.");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received"),
        Err(e) => {
            error!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
