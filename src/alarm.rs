//! Alarm Controller
//!
//! Plays a looping alert sound until explicitly silenced. At most one
//! looping alarm runs at a time, enforced by an atomic guard.

use crate::config::ConfigHandle;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Selectable alert sounds; "None" disables the one-shot preview
pub const SOUND_NAMES: &[&str] = &[
    "None",
    "alert_01.wav",
    "alert_02.wav",
    "alert_03.wav",
    "alert_04.wav",
    "alert_05.wav",
    "alert_10.mp3",
];

/// Sound played once when a marketing window receives a message
pub const MESSAGE_SOUND: &str = "alert_10.mp3";

/// Playback seam. The rodio implementation runs on a dedicated thread
/// because its output objects are not Send.
pub trait AlarmPlayer: Send + Sync {
    /// Plays the sound in a loop until the stop channel signals or
    /// disconnects. Blocks the calling thread.
    fn play_looping(&self, path: &Path, stop: Receiver<()>) -> Result<()>;

    /// Plays the sound once to completion. Blocks the calling thread.
    fn play_once(&self, path: &Path) -> Result<()>;
}

/// rodio-backed playback
pub struct RodioPlayer;

impl AlarmPlayer for RodioPlayer {
    fn play_looping(&self, path: &Path, stop: Receiver<()>) -> Result<()> {
        let (_stream, handle) =
            OutputStream::try_default().context("opening audio output stream")?;
        let sink = Sink::try_new(&handle).context("creating audio sink")?;

        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("decoding {}", path.display()))?
            .repeat_infinite();
        sink.append(source);

        // The stream must stay alive while looping; poll the stop channel
        loop {
            match stop.recv_timeout(Duration::from_millis(200)) {
                Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            }
        }

        sink.stop();
        Ok(())
    }

    fn play_once(&self, path: &Path) -> Result<()> {
        let (_stream, handle) =
            OutputStream::try_default().context("opening audio output stream")?;
        let sink = Sink::try_new(&handle).context("creating audio sink")?;

        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("decoding {}", path.display()))?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

pub struct AlarmController {
    player: Arc<dyn AlarmPlayer>,
    playing: Arc<AtomicBool>,
    stop_tx: Mutex<Option<Sender<()>>>,
    config: ConfigHandle,
    sound_dir: PathBuf,
}

impl AlarmController {
    pub fn new(config: ConfigHandle, sound_dir: impl Into<PathBuf>) -> Self {
        Self::with_player(config, sound_dir, Arc::new(RodioPlayer))
    }

    pub fn with_player(
        config: ConfigHandle,
        sound_dir: impl Into<PathBuf>,
        player: Arc<dyn AlarmPlayer>,
    ) -> Self {
        Self {
            player,
            playing: Arc::new(AtomicBool::new(false)),
            stop_tx: Mutex::new(None),
            config,
            sound_dir: sound_dir.into(),
        }
    }

    /// Starts the looping alarm. No-op if alarms are disabled or one is
    /// already playing.
    pub fn start(&self, sound: Option<&str>) {
        let cfg = self.config.snapshot();
        if !cfg.use_alarm {
            debug!("Alarm disabled in configuration");
            return;
        }

        // The stop_tx lock spans the guard and the sender publication so a
        // racing stop() cannot slip between them
        let mut stop_tx = self.stop_tx.lock();
        if self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Alarm already playing");
            return;
        }

        let name = sound.unwrap_or(&cfg.alarm_sound).to_string();
        let path = self.sound_dir.join(&name);
        let (tx, rx) = bounded(1);
        *stop_tx = Some(tx);

        let player = self.player.clone();
        let playing = self.playing.clone();
        info!("Alarm started ({name})");

        let spawned = thread::Builder::new()
            .name("alarm-playback".to_string())
            .spawn(move || {
                if let Err(e) = player.play_looping(&path, rx) {
                    warn!("Alarm playback failed: {e:#}");
                    playing.store(false, Ordering::SeqCst);
                }
            });

        if let Err(e) = spawned {
            warn!("Could not spawn alarm thread: {e}");
            self.playing.store(false, Ordering::SeqCst);
            *stop_tx = None;
        }
    }

    /// Halts playback and resets the guard; safe with no alarm active
    pub fn stop(&self) {
        // Dropping the sender disconnects the playback loop
        let mut stop_tx = self.stop_tx.lock();
        let was_playing = stop_tx.take().is_some();
        self.playing.store(false, Ordering::SeqCst);
        drop(stop_tx);
        if was_playing {
            info!("Alarm stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// One-shot playback of a named sound. A looping alarm keeps sounding;
    /// only `stop()` or the preview workflow silence it.
    pub fn play_oneshot(&self, name: &str) {
        self.spawn_oneshot(name);
    }

    /// One-shot preview of a named sound. Stops any looping alarm first;
    /// "None" just stops.
    pub fn play_selected_sound(&self, name: &str) {
        self.stop();
        if name == "None" {
            return;
        }
        self.spawn_oneshot(name);
    }

    fn spawn_oneshot(&self, name: &str) {
        let path = self.sound_dir.join(name);
        let player = self.player.clone();
        let name = name.to_string();

        let spawned = thread::Builder::new()
            .name("alarm-oneshot".to_string())
            .spawn(move || {
                if let Err(e) = player.play_once(&path) {
                    warn!("Sound {name} failed: {e:#}");
                }
            });
        if let Err(e) = spawned {
            warn!("Could not spawn one-shot thread: {e}");
        }
    }
}
