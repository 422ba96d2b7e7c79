use realtime_console::APP_DIR_NAME;
use realtime_console::app::Console;
use realtime_console::credentials::Credentials;
use realtime_console::error::ConsoleError;
use realtime_console::logger::initialize as LoggerInitialize;
use realtime_console::sink::console_handler;

use realtime_core::RealtimeConfig;

use std::fs::create_dir_all;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ConsoleError> {
    let log_dir = log_dir()?;
    create_dir_all(&log_dir)
        .map_err(|e| ConsoleError::console(format!("Failed to create log directory: {e}")))?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Realtime console starting");
    info!("Log directory: {}", log_dir.display());

    let config_dir = RealtimeConfig::default_dir()?;
    let console = Console::load(&config_dir)?;
    info!("API base URL: {}", console.config().api.base_url);

    let credentials = Credentials::from_env()?;

    console
        .run_until(credentials, console_handler(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {e}");
            }
        })
        .await
}

fn log_dir() -> Result<PathBuf, ConsoleError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("logs"))
        .ok_or_else(|| ConsoleError::console("Failed to resolve local data directory"))
}
