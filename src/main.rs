//! MU Watcher - Window Monitoring with template-matching detection
//!
//! Runs headless with file logging by default; `console` keeps a console
//! window with live log output.

#![cfg_attr(windows, windows_subsystem = "windows")]

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use mu_watcher::capture::FrameSource;
use mu_watcher::delivery::HttpTransport;
use mu_watcher::notify::{LocalAlert, LogAlert};
use mu_watcher::{
    logger, AlarmController, ConfigHandle, DeliveryQueue, NotificationDispatcher, ObservationMode,
    PollLoop, TemplateSet, WindowRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// MU Watcher - monitors game windows for helper and message state
#[derive(Parser)]
#[command(name = "mu_watcher")]
#[command(about = "Window monitoring with template-matching detection and alerting")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run with console window (for debugging)
    Console,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Console) => {
            // Create own console (don't attach to parent)
            #[cfg(windows)]
            unsafe {
                let _ = windows::Win32::System::Console::AllocConsole();
            }

            logger::init_console_logger()?;
            info!("MU Watcher started in console mode");

            run_app()?;
        }
        None => {
            // Normal start (without console)
            logger::init_file_logger()?;
            info!("MU Watcher started");

            run_app()?;
        }
    }

    Ok(())
}

/// Directory next to the EXE, falling back to the working directory
fn exe_relative(name: &str) -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join(name);
        }
    }
    PathBuf::from(".").join(name)
}

/// Main application logic
fn run_app() -> Result<()> {
    let config = ConfigHandle::load(exe_relative("config.json"))?;
    let cfg = config.snapshot();

    let registry = Arc::new(WindowRegistry::new());
    let templates = Arc::new(TemplateSet::load(
        &exe_relative("Resources").join("Helper"),
        cfg.match_threshold,
    ));

    let local: Arc<dyn LocalAlert> = Arc::new(LogAlert);
    let transport = Arc::new(HttpTransport::new(config.clone())?);
    let queue = Arc::new(DeliveryQueue::new(transport, local.clone(), config.clone()));
    let alarm = Arc::new(AlarmController::new(
        config.clone(),
        exe_relative("Resources").join("Alert"),
    ));
    let dispatcher = Arc::new(NotificationDispatcher::new(local, queue.clone()));

    #[cfg(windows)]
    let source: Arc<dyn FrameSource> = Arc::new(mu_watcher::capture::GdiFrameSource::new());
    #[cfg(not(windows))]
    let source: Arc<dyn FrameSource> = {
        tracing::warn!("No screen capture backend on this platform, windows resolve as gone");
        Arc::new(mu_watcher::capture::NullFrameSource)
    };

    let monitor = PollLoop::new(
        ObservationMode::Monitoring,
        registry.clone(),
        source.clone(),
        templates.clone(),
        dispatcher.clone(),
        alarm.clone(),
        config.clone(),
    );
    let marketing = PollLoop::new(
        ObservationMode::Marketing,
        registry,
        source,
        templates,
        dispatcher,
        alarm.clone(),
        config,
    );

    queue.start();
    monitor.start();
    marketing.start();

    // CTRL+C Handler
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let _ = ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    });

    // Block until shutdown is requested
    let _ = stop_rx.recv();
    info!("Shutting down...");

    monitor.stop();
    marketing.stop();
    alarm.stop();
    queue.stop();

    info!("MU Watcher ended");
    Ok(())
}
