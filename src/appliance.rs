//! RECORD and IDENTIFY as run on the loop thread.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lighthouse_camera::still;
use lighthouse_matching::{ImageDescription, ImageMatcher};
use lighthouse_types::ImageFrame;
use lighthouse_vision::{BackgroundIsolator, render_matches};
use tracing::{debug, info, warn};

use crate::audio::{DEFAULT_MAX_DURATION, VoicePlayer, VoiceRecorder};
use crate::capture::{CameraSource, CaptureError, CaptureOrchestrator, DEFAULT_DWELL};
use crate::event_loop::{CancelToken, RecordDelegate, RecordError, TaskHandler};
use crate::feedback::FeedbackSink;

pub const CUE_NOTHING_RECOGNIZED: &str = "nothing-recognized";
pub const CUE_NO_ITEM: &str = "no-item";
pub const CUE_AFTER_THE_TONE: &str = "after-the-tone";
pub const CUE_BEEP: &str = "beep";
pub const CUE_NO_SOUND: &str = "no-sound";
pub const CUE_REGISTERED: &str = "registered";

pub const DEFAULT_VOICE_ATTEMPTS: u32 = 3;
pub const DEFAULT_VOLUME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub max_attempts: u32,
    pub max_duration: Duration,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_VOICE_ATTEMPTS,
            max_duration: DEFAULT_MAX_DURATION,
            volume: DEFAULT_VOLUME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplianceOptions {
    pub voice: VoiceSettings,
    pub dwell: Duration,
    pub save_source_image: bool,
    pub isolator: BackgroundIsolator,
}

impl Default for ApplianceOptions {
    fn default() -> Self {
        Self {
            voice: VoiceSettings::default(),
            dwell: DEFAULT_DWELL,
            save_source_image: true,
            isolator: BackgroundIsolator::default(),
        }
    }
}

/// The devices the appliance talks to.
pub struct Collaborators {
    pub camera: Box<dyn CameraSource>,
    pub recorder: Box<dyn VoiceRecorder>,
    pub player: Box<dyn VoicePlayer>,
    pub feedback: Arc<dyn FeedbackSink>,
}

enum Stopped {
    Aborted,
    Failed(RecordError),
}

pub struct Appliance {
    matcher: Arc<ImageMatcher>,
    capture: CaptureOrchestrator,
    recorder: Box<dyn VoiceRecorder>,
    player: Box<dyn VoicePlayer>,
    feedback: Arc<dyn FeedbackSink>,
    voice: VoiceSettings,
    save_source_image: bool,
}

impl Appliance {
    pub fn new(
        matcher: Arc<ImageMatcher>,
        collaborators: Collaborators,
        options: ApplianceOptions,
    ) -> Self {
        let Collaborators {
            camera,
            recorder,
            player,
            feedback,
        } = collaborators;
        let capture = CaptureOrchestrator::new(
            camera,
            options.isolator,
            options.dwell,
            Arc::clone(&feedback),
        );
        Self {
            matcher,
            capture,
            recorder,
            player,
            feedback,
            voice: options.voice,
            save_source_image: options.save_source_image,
        }
    }

    fn cue(&self, name: &str) {
        self.feedback.play_sound_named(name);
    }

    fn record_item(&mut self, cancel: &CancelToken) -> Result<ImageFrame, Stopped> {
        let frame = self
            .capture
            .acquire_for_record(cancel)
            .map_err(|err| match err {
                CaptureError::Aborted => Stopped::Aborted,
                _ => Stopped::Failed(RecordError::CouldNotCapture),
            })?;

        let description = match self.matcher.get_description(&frame) {
            Ok(description) => description,
            Err(err) => {
                warn!(error = %err, "cannot describe captured object");
                self.cue(CUE_NOTHING_RECOGNIZED);
                return Err(Stopped::Failed(RecordError::CouldNotExtractDescription));
            }
        };
        let id = description.id().to_string();
        let layout = self.matcher.layout().clone();
        if let Err(err) = layout.ensure_entry_dir(&id) {
            warn!(id = %id, error = %err, "cannot create catalog entry");
            return Err(Stopped::Failed(RecordError::CouldNotRecordVoiceLabel));
        }

        self.cue(CUE_AFTER_THE_TONE);
        let stored = self
            .record_voice_label(&layout.voice_label_path(&id), cancel)
            .and_then(|()| self.store(description));
        let stored = match stored {
            Ok(stored) => stored,
            Err(stop) => {
                if let Err(err) = layout.remove_entry_dir(&id) {
                    warn!(id = %id, error = %err, "cannot remove abandoned catalog entry");
                }
                return Err(stop);
            }
        };

        if self.save_source_image {
            let path = layout.source_image_path(stored.id());
            if let Err(err) = still::save_png(&frame, &path) {
                warn!(path = %path.display(), error = %err, "cannot save source image");
            }
        }
        self.cue(CUE_REGISTERED);
        self.feedback.item_recorded(stored.id());
        info!(id = %stored.id(), keypoints = stored.keypoints().len(), "item recorded");
        Ok(frame)
    }

    fn record_voice_label(&mut self, path: &Path, cancel: &CancelToken) -> Result<(), Stopped> {
        for attempt in 1..=self.voice.max_attempts {
            if cancel.is_cancelled() {
                return Err(Stopped::Aborted);
            }
            self.cue(CUE_BEEP);
            let result = self.recorder.record_to_file(path, self.voice.max_duration);
            self.cue(CUE_BEEP);
            match result {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(attempt, "voice label was silent"),
                Err(err) => warn!(attempt, error = %err, "voice recording failed"),
            }
            self.cue(CUE_NO_SOUND);
        }
        Err(Stopped::Failed(RecordError::CouldNotRecordVoiceLabel))
    }

    fn store(&self, description: ImageDescription) -> Result<Arc<ImageDescription>, Stopped> {
        if let Err(err) = self.matcher.persist(&description) {
            warn!(id = %description.id(), error = %err, "cannot persist description");
            return Err(Stopped::Failed(RecordError::CouldNotRecordVoiceLabel));
        }
        Ok(self.matcher.add_to_db(description))
    }

    fn identify_item(&mut self, cancel: &CancelToken) {
        let frame = match self.capture.acquire_for_identify(cancel) {
            Ok(frame) => frame,
            Err(_) => return,
        };
        let query = match self.matcher.get_description(&frame) {
            Ok(query) => query,
            Err(err) => {
                debug!(error = %err, "cannot describe query");
                self.cue(CUE_NOTHING_RECOGNIZED);
                return;
            }
        };
        let matches = self.matcher.find_matches(&query);
        let Some(best) = matches.first() else {
            info!("no catalog item matched");
            self.cue(CUE_NO_ITEM);
            return;
        };
        info!(
            id = %best.description.id(),
            score = best.score,
            matches = matches.len(),
            "item identified"
        );
        self.feedback
            .show_label(&format!("{} ({:.1})", best.description.id(), best.score));

        let layout = self.matcher.layout();
        let voice = layout.voice_label_path(best.description.id());
        if let Err(err) = self.player.play_file(&voice, self.voice.volume) {
            warn!(path = %voice.display(), error = %err, "cannot play voice label");
        }

        let source = layout.source_image_path(best.description.id());
        if !source.exists() {
            debug!(path = %source.display(), "no source image to render matches against");
            return;
        }
        match still::load_frame(&source) {
            Ok(candidate) => {
                let pairs: Vec<(usize, usize)> = self
                    .matcher
                    .good_matches(&query, &best.description)
                    .iter()
                    .map(|m| (m.query_index, m.candidate_index))
                    .collect();
                let rendered = render_matches(
                    &frame,
                    query.keypoints(),
                    &candidate,
                    best.description.keypoints(),
                    &pairs,
                );
                self.feedback.received_frame("match", &rendered);
            }
            Err(err) => warn!(path = %source.display(), error = %err, "cannot load source image"),
        }
    }
}

impl TaskHandler for Appliance {
    fn record(&mut self, delegate: RecordDelegate, cancel: &CancelToken) {
        match self.record_item(cancel) {
            Ok(frame) => delegate.succeed(frame),
            Err(Stopped::Aborted) => debug!("record superseded"),
            Err(Stopped::Failed(err)) => {
                warn!(code = err.code(), error = %err, "record failed");
                delegate.fail(err);
            }
        }
        self.feedback.operation_complete();
    }

    fn identify(&mut self, cancel: &CancelToken) {
        self.identify_item(cancel);
        self.feedback.operation_complete();
    }
}
