//! Logging System
//!
//! tracing subscriber setup for console and file mode.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log directory (next to the EXE)
pub fn get_log_dir() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join("logs");
        }
    }
    PathBuf::from(".").join("logs")
}

/// Initializes the console logger
pub fn init_console_logger() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();

    Ok(())
}

/// Initializes the file logger
pub fn init_file_logger() -> Result<()> {
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir)?;

    // Clean up old log files (keep only 2)
    cleanup_old_logs(&log_dir, 2, "watcher.log");

    let file_appender = tracing_appender::rolling::daily(&log_dir, "watcher.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Guard must stay alive - we intentionally leak it for app lifetime
    Box::leak(Box::new(_guard));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_target(false))
        .with(filter)
        .init();

    Ok(())
}

/// Deletes old log files with a given prefix, keeps only the newest N
fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize, prefix: &str) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                let path = e.path();
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    name.starts_with(prefix)
                } else {
                    false
                }
            })
            .collect();

        // Sort by modification time (newest first)
        log_files.sort_by(|a, b| {
            let time_a = a.metadata().and_then(|m| m.modified()).ok();
            let time_b = b.metadata().and_then(|m| m.modified()).ok();
            time_b.cmp(&time_a)
        });

        for old_file in log_files.iter().skip(keep_count) {
            if let Err(e) = fs::remove_file(old_file.path()) {
                error!("Could not delete old log file: {}", e);
            } else {
                info!("Old log file deleted: {}", old_file.path().display());
            }
        }
    }
}
