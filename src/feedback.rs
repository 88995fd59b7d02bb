//! Fire-and-forget notifications from the appliance: sound cues, frames to
//! display, labels and telemetry. Implementations must not block for long
//! and never report failures back.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use lighthouse_camera::still;
use lighthouse_types::ImageFrame;
use tracing::{debug, info, warn};

use crate::audio::VoicePlayer;

const CUE_THREAD_NAME: &str = "lighthouse-cues";

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub category: String,
    pub action: String,
    pub label: String,
    pub measure: Option<i64>,
}

impl TelemetryEvent {
    pub fn new(category: &str, action: &str, label: &str) -> Self {
        Self {
            category: category.to_string(),
            action: action.to_string(),
            label: label.to_string(),
            measure: None,
        }
    }

    pub fn with_measure(mut self, measure: i64) -> Self {
        self.measure = Some(measure);
        self
    }
}

pub trait FeedbackSink: Send + Sync {
    fn play_sound_named(&self, _name: &str) {}

    fn received_frame(&self, _label: &str, _frame: &ImageFrame) {}

    fn show_label(&self, _text: &str) {}

    fn record_telemetry(&self, _event: TelemetryEvent) {}

    /// A RECORD or IDENTIFY run finished, whatever its outcome.
    fn operation_complete(&self) {}

    fn item_recorded(&self, _id: &str) {}

    fn cannot_take_picture(&self) {}
}

/// Writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl FeedbackSink for LogFeedback {
    fn play_sound_named(&self, name: &str) {
        info!(cue = name, "sound cue");
    }

    fn received_frame(&self, label: &str, frame: &ImageFrame) {
        debug!(label, width = frame.width(), height = frame.height(), "frame");
    }

    fn show_label(&self, text: &str) {
        info!(text, "label");
    }

    fn record_telemetry(&self, event: TelemetryEvent) {
        debug!(
            category = %event.category,
            action = %event.action,
            label = %event.label,
            measure = event.measure,
            "telemetry"
        );
    }

    fn operation_complete(&self) {
        debug!("operation complete");
    }

    fn item_recorded(&self, id: &str) {
        info!(id, "item recorded");
    }

    fn cannot_take_picture(&self) {
        warn!("cannot take picture");
    }
}

/// Feedback for the running appliance: logs like [`LogFeedback`], plays cue
/// files `<sounds_dir>/<name>.wav` and dumps received frames as PNG files.
///
/// Cues are queued to a dedicated player thread, so the caller never waits
/// for a cue to finish. Dropping the feedback drains the queue.
pub struct ApplianceFeedback {
    log: LogFeedback,
    sounds_dir: Option<PathBuf>,
    dump_dir: Option<PathBuf>,
    cues: Option<Sender<PathBuf>>,
    player_thread: Option<JoinHandle<()>>,
    dumped: AtomicU64,
}

impl ApplianceFeedback {
    pub fn new(
        player: Box<dyn VoicePlayer>,
        sounds_dir: Option<PathBuf>,
        dump_dir: Option<PathBuf>,
        volume: f32,
    ) -> io::Result<Self> {
        if let Some(dir) = dump_dir.as_ref() {
            if let Err(err) = fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %err, "cannot create frame dump directory");
            }
        }
        let (cues, queue) = mpsc::channel();
        let player_thread = thread::Builder::new()
            .name(CUE_THREAD_NAME.to_string())
            .spawn(move || play_cues(player, queue, volume))?;
        Ok(Self {
            log: LogFeedback,
            sounds_dir,
            dump_dir,
            cues: Some(cues),
            player_thread: Some(player_thread),
            dumped: AtomicU64::new(0),
        })
    }
}

fn play_cues(mut player: Box<dyn VoicePlayer>, queue: Receiver<PathBuf>, volume: f32) {
    for path in queue {
        if let Err(err) = player.play_file(&path, volume) {
            warn!(path = %path.display(), error = %err, "failed to play cue");
        }
    }
    debug!("cue player finished");
}

impl Drop for ApplianceFeedback {
    fn drop(&mut self) {
        drop(self.cues.take());
        if let Some(thread) = self.player_thread.take() {
            if thread.join().is_err() {
                warn!("cue player thread panicked");
            }
        }
    }
}

impl FeedbackSink for ApplianceFeedback {
    fn play_sound_named(&self, name: &str) {
        self.log.play_sound_named(name);
        let Some(dir) = self.sounds_dir.as_ref() else {
            return;
        };
        let path = dir.join(format!("{name}.wav"));
        if !path.exists() {
            debug!(path = %path.display(), "no sound file for cue");
            return;
        }
        let Some(cues) = self.cues.as_ref() else {
            return;
        };
        if cues.send(path).is_err() {
            warn!(cue = name, "cue player is gone");
        }
    }

    fn received_frame(&self, label: &str, frame: &ImageFrame) {
        self.log.received_frame(label, frame);
        let Some(dir) = self.dump_dir.as_ref() else {
            return;
        };
        let index = self.dumped.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{index:05}-{label}.png"));
        if let Err(err) = still::save_png(frame, &path) {
            warn!(path = %path.display(), error = %err, "failed to dump frame");
        }
    }

    fn show_label(&self, text: &str) {
        self.log.show_label(text);
    }

    fn record_telemetry(&self, event: TelemetryEvent) {
        self.log.record_telemetry(event);
    }

    fn operation_complete(&self) {
        self.log.operation_complete();
    }

    fn item_recorded(&self, id: &str) {
        self.log.item_recorded(id);
    }

    fn cannot_take_picture(&self) {
        self.log.cannot_take_picture();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use tempfile::tempdir;

    use super::*;
    use crate::audio::AudioResult;

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        played: Arc<Mutex<Vec<(PathBuf, f32)>>>,
    }

    impl VoicePlayer for RecordingPlayer {
        fn play_file(&mut self, path: &Path, volume: f32) -> AudioResult<()> {
            self.played.lock().unwrap().push((path.to_path_buf(), volume));
            Ok(())
        }
    }

    #[test]
    fn cues_play_existing_sound_files() {
        let sounds = tempdir().unwrap();
        fs::write(sounds.path().join("beep.wav"), b"RIFF").unwrap();
        let player = RecordingPlayer::default();
        let feedback = ApplianceFeedback::new(
            Box::new(player.clone()),
            Some(sounds.path().to_path_buf()),
            None,
            0.5,
        )
        .unwrap();
        feedback.play_sound_named("beep");
        feedback.play_sound_named("missing");
        drop(feedback);
        let played = player.played.lock().unwrap();
        assert_eq!(played.as_slice(), &[(sounds.path().join("beep.wav"), 0.5)]);
    }

    /// Holds every playback until released.
    struct GatedPlayer {
        started: Sender<PathBuf>,
        release: Receiver<()>,
    }

    impl VoicePlayer for GatedPlayer {
        fn play_file(&mut self, path: &Path, _volume: f32) -> AudioResult<()> {
            self.started.send(path.to_path_buf()).unwrap();
            self.release.recv().unwrap();
            Ok(())
        }
    }

    #[test]
    fn cues_do_not_wait_for_playback() {
        let sounds = tempdir().unwrap();
        fs::write(sounds.path().join("shutter.wav"), b"RIFF").unwrap();
        fs::write(sounds.path().join("beep.wav"), b"RIFF").unwrap();
        let (started_tx, started) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        let feedback = ApplianceFeedback::new(
            Box::new(GatedPlayer {
                started: started_tx,
                release: release_rx,
            }),
            Some(sounds.path().to_path_buf()),
            None,
            1.0,
        )
        .unwrap();

        // Both calls return while the first cue is still playing.
        feedback.play_sound_named("shutter");
        feedback.play_sound_named("beep");
        assert_eq!(started.recv().unwrap(), sounds.path().join("shutter.wav"));

        release.send(()).unwrap();
        assert_eq!(started.recv().unwrap(), sounds.path().join("beep.wav"));
        release.send(()).unwrap();
        drop(feedback);
        assert!(started.recv().is_err());
    }

    #[test]
    fn frames_are_dumped_in_order() {
        let dump = tempdir().unwrap();
        let feedback = ApplianceFeedback::new(
            Box::new(RecordingPlayer::default()),
            None,
            Some(dump.path().to_path_buf()),
            1.0,
        )
        .unwrap();
        let frame = ImageFrame::from_owned(2, 2, vec![9; 16]).unwrap();
        feedback.received_frame("TakePicture", &frame);
        feedback.received_frame("match", &frame);
        assert!(dump.path().join("00000-TakePicture.png").exists());
        assert!(dump.path().join("00001-match.png").exists());
    }
}
