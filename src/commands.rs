use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    live::{HttpEventTransport, HttpRefresh, LiveConfig, LiveUpdateClient, LogIndicator},
    settings::{LiveSettings, SettingsStore},
    validation::{
        sanitize_checkin_payload, sanitize_form_data, validate_checkin_payload, validate_form,
        FormData,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON settings file for the live-update client.
    #[arg(long, global = true, default_value = "checkin-live.json")]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate and sanitize a check-in form (JSON object) from FILE or stdin.
    Validate {
        file: Option<PathBuf>,

        /// Apply the server's stricter payload rules.
        #[arg(long)]
        server: bool,
    },

    /// Follow the dashboard's event stream. Type `visible`, `status` or `quit` on stdin.
    Watch {
        /// Origin of the dashboard page, e.g. https://checkin.example.se
        #[arg(long)]
        origin: Option<String>,

        /// URL fetched whenever the dashboard should refresh.
        #[arg(long)]
        refresh_url: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    errors: Vec<String>,
    sanitized: FormData,
}

/// Runs the chosen subcommand. `Ok(false)` means the input was rejected.
pub async fn execute(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Validate { file, server } => validate(file, server),
        Command::Watch {
            origin,
            refresh_url,
        } => {
            let store = SettingsStore::new(cli.settings)?;
            let mut settings = store.live().with_env_overrides();
            if origin.is_some() {
                settings.origin = origin;
            }
            if refresh_url.is_some() {
                settings.refresh_url = refresh_url;
            }
            watch(settings).await
        }
    }
}

fn validate(file: Option<PathBuf>, server: bool) -> Result<bool> {
    let raw = match &file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read form from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read form from stdin")?;
            buffer
        }
    };

    let data: FormData =
        serde_json::from_str(&raw).context("Form must be a JSON object of field values")?;

    let (errors, sanitized) = if server {
        (validate_checkin_payload(&data), sanitize_checkin_payload(&data))
    } else {
        (validate_form(&data), sanitize_form_data(&data))
    };

    let report = ValidationReport {
        valid: errors.is_empty(),
        errors,
        sanitized,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(report.valid)
}

async fn watch(settings: LiveSettings) -> Result<bool> {
    let config = LiveConfig::from(&settings);
    info!("Watching {}", config.endpoint_url());

    let client = Client::builder()
        .build()
        .context("HTTP client build failed")?;
    let transport = Arc::new(HttpEventTransport::new(
        client.clone(),
        config.reconnect_delay,
    ));
    let refresh = Arc::new(HttpRefresh::new(client, settings.refresh_url.as_deref()));
    let live = LiveUpdateClient::start(config, transport, Arc::new(LogIndicator), refresh);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "visible" => live.notify_visible(),
                    "status" => println!("{}", serde_json::to_string(&live.snapshot())?),
                    "quit" | "exit" => break,
                    "" => {}
                    other => warn!("Unknown command '{other}' (expected visible, status or quit)"),
                },
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!("Stopped reading stdin: {err}");
                    stdin_open = false;
                }
            },
        }
    }

    live.stop().await?;
    Ok(true)
}
