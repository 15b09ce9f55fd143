//! Tracing configuration and log routing.
//!
//! Both binaries log to stdout with a compact formatter and append to a per-component log file.
//! `ROADMAP_RAG_LOG_FILE` overrides the file path for every component; otherwise each binary
//! writes `logs/<component>.log` so server and ingestion runs do not interleave.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR: &str = "logs";
const LOG_FILE_ENV: &str = "ROADMAP_RAG_LOG_FILE";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the stdout layer and, when the log file can be opened, a non-blocking file layer.
///
/// Respects `RUST_LOG` for filtering (defaults to `info`).
pub fn init_tracing(component: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let path = resolve_log_path(std::env::var(LOG_FILE_ENV).ok().as_deref(), component);
    match open_file_writer(&path) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
            tracing::debug!(path = %path.display(), component, "File logging enabled");
        }
        None => registry.init(),
    }
}

/// Pick the log file for a component, honoring a non-empty override.
fn resolve_log_path(override_path: Option<&str>, component: &str) -> PathBuf {
    match override_path.map(str::trim).filter(|value| !value.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => Path::new(LOG_DIR).join(format!("{component}.log")),
    }
}

fn open_file_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty())
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_log_lands_under_logs_dir() {
        assert_eq!(
            resolve_log_path(None, "ingest-catalog"),
            PathBuf::from("logs/ingest-catalog.log")
        );
    }

    #[test]
    fn override_wins_unless_blank() {
        assert_eq!(
            resolve_log_path(Some("/var/log/roadmap.log"), "roadmap-rag"),
            PathBuf::from("/var/log/roadmap.log")
        );
        assert_eq!(
            resolve_log_path(Some("   "), "roadmap-rag"),
            PathBuf::from("logs/roadmap-rag.log")
        );
    }
}
