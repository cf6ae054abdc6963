//! Logging setup: `tracing` to stderr and, optionally, to data_dir/logs with rotation.

use crate::config::Config;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info_span, warn, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_SUBDIR: &str = "logs";
const LOG_FILE: &str = "companion.log";
const ROTATE_SIZE_BYTES: u64 = 5 * 1024 * 1024; // 5 MB

#[derive(Error, Debug)]
pub enum LogInitError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Observability handle injected into the orchestrator.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    span: Span,
}

impl Diagnostics {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Records nothing of its own; events still reach any installed subscriber.
    pub fn disabled() -> Self {
        Self { span: Span::none() }
    }

    /// Parent span for generation work.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// A failure masked by fallback output.
    pub fn absorbed(&self, use_case: &str, stage: &str, error: &dyn Display) {
        self.span.in_scope(|| {
            warn!(use_case, stage, error = %error, "live path failed; serving fallback");
        });
    }
}

pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_SUBDIR).join(LOG_FILE)
}

fn rotate_if_needed(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.len() >= ROTATE_SIZE_BYTES {
            let old = path.with_extension("log.old");
            let _ = std::fs::remove_file(&old);
            let _ = std::fs::rename(path, &old);
        }
    }
}

/// Installs the global subscriber. Call once at startup.
pub fn init(config: &Config) -> Result<Diagnostics, LogInitError> {
    let filter = EnvFilter::try_new(&config.log_filter)?;
    let file_layer = if config.log_to_file {
        let path = log_path(&config.data_dir);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        rotate_if_needed(&path);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
    } else {
        None
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(Diagnostics::new(info_span!(
        "companion",
        model = %config.model,
        endpoint = %config.ollama_url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_log_is_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, vec![b'x'; ROTATE_SIZE_BYTES as usize]).unwrap();
        rotate_if_needed(&path);
        assert!(!path.exists());
        assert!(path.with_extension("log.old").exists());
    }

    #[test]
    fn small_log_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"line\n").unwrap();
        rotate_if_needed(&path);
        assert!(path.exists());
    }

    #[test]
    fn disabled_handle_accepts_events() {
        let diagnostics = Diagnostics::disabled();
        assert!(diagnostics.span().is_none());
        diagnostics.absorbed("chat", "complete", &"timeout");
    }
}
