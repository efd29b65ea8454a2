use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use hsu_common::{ServiceName, DEFAULT_SERVICE_NAME};
use hsu_service_host::{ConsoleHost, HostOptions, ServiceHost};

/// HSU Service Wrapper - runs a single executable as a background service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service name; selects the configuration entry
    #[arg(short, long, default_value = DEFAULT_SERVICE_NAME)]
    service_name: String,

    /// Configuration file path (YAML); the registry is used when omitted on Windows
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run in the foreground instead of under the Service Control Manager
    #[arg(long)]
    console: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    let options = HostOptions {
        service_name: ServiceName::new(args.service_name),
        config_file: args.config,
    };
    info!("Starting HSU Service Wrapper for {}", options.service_name);

    let result = if args.console || !cfg!(windows) {
        ConsoleHost.run(&options)
    } else {
        run_dispatcher(&options)
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code() as i32
        }
    };

    info!("HSU Service Wrapper exiting with code {}", code);
    std::process::exit(code);
}

#[cfg(windows)]
fn run_dispatcher(options: &HostOptions) -> hsu_common::ServiceResult<i32> {
    hsu_service_host::WindowsServiceHost.run(options)
}

#[cfg(not(windows))]
fn run_dispatcher(options: &HostOptions) -> hsu_common::ServiceResult<i32> {
    ConsoleHost.run(options)
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
