use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::live::config::{DEFAULT_DEV_ORIGIN, DEFAULT_DEV_PORT, DEFAULT_STREAM_PATH};

const ORIGIN_ENV: &str = "CHECKIN_LIVE_ORIGIN";
const REFRESH_URL_ENV: &str = "CHECKIN_LIVE_REFRESH_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveSettings {
    pub origin: Option<String>,
    pub dev_port: u16,
    pub dev_origin: String,
    pub stream_path: String,
    pub startup_delay_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub fallback_interval_ms: u64,
    pub indicator_retry_ms: u64,
    pub refresh_url: Option<String>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            origin: None,
            dev_port: DEFAULT_DEV_PORT,
            dev_origin: DEFAULT_DEV_ORIGIN.into(),
            stream_path: DEFAULT_STREAM_PATH.into(),
            startup_delay_ms: 1000,
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 10,
            fallback_interval_ms: 30_000,
            indicator_retry_ms: 500,
            refresh_url: None,
        }
    }
}

impl LiveSettings {
    /// Environment variables win over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(origin) = var(ORIGIN_ENV) {
            self.origin = Some(origin);
        }
        if let Some(refresh_url) = var(REFRESH_URL_ENV) {
            self.refresh_url = Some(refresh_url);
        }
        self
    }
}

fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            info!("Using {key} from environment");
            Some(value.trim().to_string())
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default)]
    live: LiveSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn live(&self) -> LiveSettings {
        self.read().live.clone()
    }

    pub fn update_live(&self, settings: LiveSettings) -> Result<()> {
        let mut guard = self.write();
        guard.live = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
