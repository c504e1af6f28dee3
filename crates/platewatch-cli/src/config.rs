// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use platewatch_app::ViewKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "platewatch";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub video: Video,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            ui: Ui::default(),
            video: Video::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub start_view: Option<String>,
    pub autoplay: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            start_view: Some(ViewKind::Cars.label().to_owned()),
            autoplay: Some(true),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Video {
    pub player: Option<String>,
    pub player_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("PLATEWATCH_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set PLATEWATCH_CONFIG_PATH to the config file"
            )
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
                    "config file {} has no version. Add `version = 1` and put values under [server], [ui], [video] and [log]",
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
        if let Some(base_url) = &self.server.base_url {
            platewatch_api::validate_base_url(base_url)
                .with_context(|| format!("invalid [server] section in {}", path.display()))?;
        }

        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(view) = &self.ui.start_view
            && ViewKind::parse(view).is_none()
        {
            bail!(
                "ui.start_view in {} must be one of cars, map, unknown; got {:?}",
                path.display(),
                view
            );
        }

        if let Some(player) = &self.video.player
            && player.trim().is_empty()
        {
            bail!(
                "video.player in {} is empty; remove it to disable the external player",
                path.display()
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {level:?} in {} is not a valid filter (try info or debug)",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    /// `--server` wins over the file.
    pub fn override_base_url(&mut self, raw: &str) -> Result<()> {
        let base_url =
            platewatch_api::validate_base_url(raw).context("invalid --server value")?;
        self.server.base_url = Some(base_url);
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// `None` waits on the backend indefinitely.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.server
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
    }

    pub fn start_view(&self) -> ViewKind {
        self.ui
            .start_view
            .as_deref()
            .and_then(ViewKind::parse)
            .unwrap_or(ViewKind::Cars)
    }

    pub fn autoplay(&self) -> bool {
        self.ui.autoplay.unwrap_or(true)
    }

    pub fn player(&self) -> Option<&str> {
        self.video.player.as_deref().map(str::trim)
    }

    pub fn player_args(&self) -> &[String] {
        self.video.player_args.as_deref().unwrap_or_default()
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to an explicit path")
        })?;
        Ok(data_root.join(APP_NAME).join(format!("{APP_NAME}.log")))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# platewatch config\n# Place this file at: {}\n\nversion = 1\n\n[server]\nbase_url = \"{}\"\n# Optional. Unset waits on the backend indefinitely.\n# timeout = \"10s\"\n\n[ui]\n# cars, map or unknown\nstart_view = \"cars\"\nautoplay = true\n\n[video]\n# Optional. Receives the clip URL as its last argument.\n# player = \"mpv\"\n# player_args = [\"--really-quiet\"]\n\n[log]\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/platewatch/platewatch.log)\n# file = \"/absolute/path/to/platewatch.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use platewatch_app::ViewKind;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "http://127.0.0.1:5000");
        assert_eq!(config.timeout()?, None);
        assert_eq!(config.start_view(), ViewKind::Cars);
        assert!(config.autoplay());
        assert_eq!(config.player(), None);
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nbase_url = \"http://cam.local\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"), "{message}");
        assert!(message.contains("[server], [ui], [video] and [log]"), "{message}");
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[server]\nbase_url = \"http://cam.local:5000///\"\ntimeout = \"750ms\"\n[ui]\nstart_view = \"map\"\nautoplay = false\n[video]\nplayer = \"mpv\"\nplayer_args = [\"--really-quiet\"]\n[log]\nlevel = \"platewatch_api=debug,info\"\nfile = \"/var/log/platewatch.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "http://cam.local:5000");
        assert_eq!(config.timeout()?, Some(Duration::from_millis(750)));
        assert_eq!(config.start_view(), ViewKind::Map);
        assert!(!config.autoplay());
        assert_eq!(config.player(), Some("mpv"));
        assert_eq!(config.player_args(), ["--really-quiet".to_owned()]);
        assert_eq!(config.log_level(), "platewatch_api=debug,info");
        assert_eq!(config.log_file()?, PathBuf::from("/var/log/platewatch.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn bad_values_are_rejected() -> Result<()> {
        for (body, needle) in [
            ("[server]\nbase_url = \"ftp://cam.local\"\n", "[server]"),
            ("[server]\ntimeout = \"0s\"\n", "must be positive"),
            ("[server]\ntimeout = \"soon\"\n", "invalid duration"),
            ("[ui]\nstart_view = \"grid\"\n", "cars, map, unknown"),
            ("[video]\nplayer = \"  \"\n", "video.player"),
            ("[log]\nlevel = \"platewatch=loudest\"\n", "log.level"),
        ] {
            let (_temp, path) = write_config(&format!("version = 1\n{body}"))?;
            let error = Config::load(&path).expect_err("invalid value should fail");
            let message = format!("{error:#}");
            assert!(message.contains(needle), "{body}: {message}");
        }
        Ok(())
    }

    #[test]
    fn server_override_is_validated_and_trimmed() -> Result<()> {
        let mut config = Config::default();
        config.override_base_url("https://cam.example/")?;
        assert_eq!(config.base_url(), "https://cam.example");
        assert!(config.override_base_url("cam.example").is_err());
        assert_eq!(config.base_url(), "https://cam.example");
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("PLATEWATCH_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("PLATEWATCH_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("PLATEWATCH_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("platewatch/config.toml"));
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn minutes_too_large_for_seconds_are_rejected() {
        let raw = format!("{}m", u64::MAX / 60 + 1);
        let error = parse_duration(&raw).expect_err("overflowing minutes should fail");
        assert!(error.to_string().contains("invalid timeout duration"));
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.version, 1);
        assert_eq!(config.start_view(), ViewKind::Cars);
        Ok(())
    }
}
