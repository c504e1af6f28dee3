// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "PLATEWATCH_LOG";

/// The terminal belongs to the UI, so events go to an append-only file.
pub fn init(log_file: &Path, configured_level: &str) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path",
                log_file.display()
            )
        })?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(build_filter(configured_level)?)
        .with(file_layer)
        .try_init()
        .context("install log subscriber")?;

    tracing::info!(path = %log_file.display(), "logging initialized");
    Ok(())
}

/// `PLATEWATCH_LOG` beats the config value.
fn build_filter(configured_level: &str) -> Result<EnvFilter> {
    if let Ok(directives) = env::var(LOG_ENV)
        && !directives.trim().is_empty()
    {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("{LOG_ENV}={directives:?} is not a valid log filter"));
    }
    EnvFilter::try_new(configured_level)
        .with_context(|| format!("log level {configured_level:?} is not a valid log filter"))
}

#[cfg(test)]
mod tests {
    use super::{LOG_ENV, build_filter};
    use anyhow::Result;

    #[test]
    fn env_filter_overrides_config_level() -> Result<()> {
        let error = build_filter("platewatch=loudest").expect_err("bad level should fail");
        assert!(error.to_string().contains("not a valid log filter"));

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(LOG_ENV, "platewatch_api=trace");
        }
        let filter = build_filter("platewatch=loudest");
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(LOG_ENV);
        }
        assert_eq!(filter?.to_string(), "platewatch_api=trace");
        Ok(())
    }
}
