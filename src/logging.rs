use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use busguardian::Config;

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env("BUSGUARDIAN_LOG").unwrap_or_else(|_| EnvFilter::new(default))
}

/// The dashboard owns the terminal, so logs go to `busguardian.log` in the config directory.
pub fn init_file() -> Result<()> {
    let dir = Config::config_dir()?;
    fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("busguardian.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter("info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))
}

/// Headless commands log warnings and errors to stderr.
pub fn init_stderr() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))
}
