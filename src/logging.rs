use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "O2PARIS_LOG";
const DEFAULT_DIRECTIVES: &str = "o2paris=info";

/// Sends `tracing` output to `path` (appending). The terminal belongs to the UI,
/// so nothing is ever written to stdout or stderr.
pub fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(log = %path.display(), "logging started");
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| DEFAULT_DIRECTIVES.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_to_the_log_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("o2paris.log");

        init_logging(&path).expect("first init succeeds");
        tracing::info!("hello from the test");
        assert!(init_logging(&path).is_err(), "second init must be refused");

        let written = fs::read_to_string(&path).expect("read log");
        assert!(written.contains("logging started"));
    }
}
