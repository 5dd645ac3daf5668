//! Check-in dashboard helpers: form validation mirroring the server rules,
//! and a live-update client that follows the server's event stream.

mod commands;
pub mod live;
pub mod settings;
mod utils;
pub mod validation;

use std::process::ExitCode;

use clap::Parser;
use log::error;

pub use commands::{Cli, Command};
pub use live::{ConnectionStatus, LiveConfig, LiveUpdateClient};
pub use settings::{LiveSettings, SettingsStore};
pub use utils::logging::init_logging;
pub use validation::{sanitize_form_data, validate_form, FormData};

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Reads RUST_LOG, defaults to info
    init_logging();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::execute(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}
