// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use roster_api::{DEFAULT_API_KEY, DEFAULT_BASE_URL};
use roster_tui::UiTiming;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "roster";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_REFRESH_DELAY: &str = "1s";
const DEFAULT_STATUS_TTL: &str = "4s";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub refresh_delay: Option<String>,
    pub status_ttl: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ROSTER_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ROSTER_CONFIG_PATH to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [api], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let durations = [
            ("api.timeout", &self.api.timeout),
            ("ui.refresh_delay", &self.ui.refresh_delay),
            ("ui.status_ttl", &self.ui.status_ttl),
        ];
        for (key, raw) in durations {
            let Some(raw) = raw else {
                continue;
            };
            let parsed = parse_duration(raw)
                .with_context(|| format!("{key} in {}", path.display()))?;
            if key != "ui.refresh_delay" && parsed.is_zero() {
                bail!("{key} in {} must be positive, got {raw}", path.display());
            }
        }

        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!("api.base_url in {} must not be empty", path.display());
        }

        Ok(())
    }

    /// `ROSTER_API_URL` wins over the file.
    pub fn api_base_url(&self) -> String {
        env_override("ROSTER_API_URL")
            .or_else(|| self.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
    }

    /// `ROSTER_API_KEY` wins over the file.
    pub fn api_key(&self) -> String {
        env_override("ROSTER_API_KEY")
            .or_else(|| self.api.api_key.clone())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_owned())
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn ui_timing(&self) -> Result<UiTiming> {
        Ok(UiTiming {
            refresh_delay: parse_duration(
                self.ui
                    .refresh_delay
                    .as_deref()
                    .unwrap_or(DEFAULT_REFRESH_DELAY),
            )?,
            status_ttl: parse_duration(self.ui.status_ttl.as_deref().unwrap_or(DEFAULT_STATUS_TTL))?,
        })
    }

    /// `ROSTER_LOG` wins over the file. Any `EnvFilter` directive is
    /// accepted.
    pub fn log_filter(&self) -> String {
        env_override("ROSTER_LOG")
            .or_else(|| self.log.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned())
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file in the config")
        })?;
        Ok(data_root.join(APP_NAME).join("roster.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# roster config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# ROSTER_API_URL and ROSTER_API_KEY override these.\nbase_url = \"{}\"\napi_key = \"{}\"\ntimeout = \"{}\"\n\n[ui]\n# Wait before re-fetching after a save.\nrefresh_delay = \"{}\"\nstatus_ttl = \"{}\"\n\n[log]\n# EnvFilter directive; ROSTER_LOG overrides it.\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/roster/roster.log)\n# file = \"/absolute/path/to/roster.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_API_KEY,
            DEFAULT_TIMEOUT,
            DEFAULT_REFRESH_DELAY,
            DEFAULT_STATUS_TTL,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn env_override(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
