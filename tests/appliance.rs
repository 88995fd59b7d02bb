use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lighthouse::appliance::{CUE_NO_ITEM, CUE_NO_SOUND, CUE_REGISTERED};
use lighthouse::audio::{AudioResult, VoicePlayer, VoiceRecorder};
use lighthouse::capture::CameraSource;
use lighthouse::feedback::FeedbackSink;
use lighthouse::{ApplianceOptions, Collaborators, Lighthouse, RecordError};
use lighthouse_camera::{Backend, CameraResult, Configuration, FrameStream};
use lighthouse_matching::{CatalogLayout, ImageMatcher, MatchingSettings};
use lighthouse_types::ImageFrame;
use tempfile::{TempDir, tempdir};

const TIMEOUT: Duration = Duration::from_secs(60);

/// Opens a mock camera whose object texture comes from the next queued seed.
struct SeededCamera {
    seeds: VecDeque<u64>,
}

impl CameraSource for SeededCamera {
    fn open(&mut self) -> CameraResult<FrameStream> {
        let seed = self.seeds.pop_front().unwrap_or(99);
        let config = Configuration {
            backend: Backend::Mock,
            mock_seed: seed,
            ..Configuration::default()
        };
        config.create_provider(Backend::Mock)?.open()
    }
}

struct ScriptedRecorder {
    voiced: bool,
    attempts: Arc<Mutex<usize>>,
}

impl VoiceRecorder for ScriptedRecorder {
    fn record_to_file(&mut self, path: &Path, _max_duration: Duration) -> AudioResult<bool> {
        *self.attempts.lock().unwrap() += 1;
        if self.voiced {
            std::fs::write(path, b"RIFF")?;
        }
        Ok(self.voiced)
    }
}

#[derive(Clone, Default)]
struct ScriptedPlayer {
    played: Arc<Mutex<Vec<PathBuf>>>,
}

impl VoicePlayer for ScriptedPlayer {
    fn play_file(&mut self, path: &Path, _volume: f32) -> AudioResult<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

struct Observed {
    cues: Mutex<Vec<String>>,
    labels: Mutex<Vec<String>>,
    frames: Mutex<Vec<String>>,
    completed: Mutex<Sender<()>>,
}

impl FeedbackSink for Observed {
    fn play_sound_named(&self, name: &str) {
        self.cues.lock().unwrap().push(name.to_string());
    }

    fn received_frame(&self, label: &str, _frame: &ImageFrame) {
        self.frames.lock().unwrap().push(label.to_string());
    }

    fn show_label(&self, text: &str) {
        self.labels.lock().unwrap().push(text.to_string());
    }

    fn operation_complete(&self) {
        let _ = self.completed.lock().unwrap().send(());
    }
}

struct Harness {
    _data: TempDir,
    layout: CatalogLayout,
    lighthouse: Lighthouse,
    feedback: Arc<Observed>,
    player: ScriptedPlayer,
    attempts: Arc<Mutex<usize>>,
    completed: Receiver<()>,
}

impl Harness {
    fn new(seeds: &[u64], voiced: bool) -> Self {
        let data = tempdir().unwrap();
        let layout = CatalogLayout::new(data.path());
        let (matcher, _) = ImageMatcher::open(MatchingSettings::default(), layout.clone()).unwrap();
        let (tx, completed) = mpsc::channel();
        let feedback = Arc::new(Observed {
            cues: Mutex::default(),
            labels: Mutex::default(),
            frames: Mutex::default(),
            completed: Mutex::new(tx),
        });
        let player = ScriptedPlayer::default();
        let attempts = Arc::new(Mutex::new(0));
        let collaborators = Collaborators {
            camera: Box::new(SeededCamera {
                seeds: seeds.iter().copied().collect(),
            }),
            recorder: Box::new(ScriptedRecorder {
                voiced,
                attempts: Arc::clone(&attempts),
            }),
            player: Box::new(player.clone()),
            feedback: feedback.clone(),
        };
        let lighthouse =
            Lighthouse::start(Arc::new(matcher), collaborators, ApplianceOptions::default())
                .unwrap();
        Self {
            _data: data,
            layout,
            lighthouse,
            feedback,
            player,
            attempts,
            completed,
        }
    }

    fn record(&self) -> Result<ImageFrame, RecordError> {
        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();
        self.lighthouse.start_record(
            move |frame| tx.send(Ok(frame)).unwrap(),
            move |err| err_tx.send(Err(err)).unwrap(),
        );
        let result = rx.recv_timeout(TIMEOUT).unwrap();
        self.completed.recv_timeout(TIMEOUT).unwrap();
        result
    }

    fn identify(&self) {
        self.lighthouse.start_identify();
        self.completed.recv_timeout(TIMEOUT).unwrap();
    }

    fn cues(&self) -> Vec<String> {
        self.feedback.cues.lock().unwrap().clone()
    }
}

#[test]
fn identify_with_empty_catalog_reports_no_item() {
    let harness = Harness::new(&[1], true);
    harness.identify();
    let cues = harness.cues();
    assert_eq!(cues.last().map(String::as_str), Some(CUE_NO_ITEM));
    assert!(harness.player.played.lock().unwrap().is_empty());
    assert!(harness.lighthouse.catalog_ids().is_empty());
}

#[test]
fn recorded_object_is_identified_over_another() {
    let harness = Harness::new(&[11, 22, 11], true);
    harness.record().unwrap();
    let first = harness.lighthouse.catalog_ids();
    assert_eq!(first.len(), 1);
    let first_id = first[0].clone();
    harness.record().unwrap();
    assert_eq!(harness.lighthouse.catalog_ids().len(), 2);

    let entry = harness.layout.entry_dir(&first_id);
    assert!(harness.layout.description_path(&first_id).exists());
    assert!(harness.layout.voice_label_path(&first_id).exists());
    assert!(harness.layout.source_image_path(&first_id).exists());
    assert!(entry.is_dir());

    harness.identify();
    let played = harness.player.played.lock().unwrap().clone();
    assert_eq!(played, vec![harness.layout.voice_label_path(&first_id)]);
    let labels = harness.feedback.labels.lock().unwrap().clone();
    assert!(labels[0].starts_with(&first_id));
    let frames = harness.feedback.frames.lock().unwrap().clone();
    assert_eq!(frames.last().map(String::as_str), Some("match"));
    assert_eq!(
        harness.cues().iter().filter(|c| c.as_str() == CUE_REGISTERED).count(),
        2
    );
}

#[test]
fn unrecorded_object_is_not_identified() {
    let harness = Harness::new(&[11, 33], true);
    harness.record().unwrap();
    assert_eq!(harness.lighthouse.catalog_ids().len(), 1);

    harness.identify();
    assert_eq!(harness.cues().last().map(String::as_str), Some(CUE_NO_ITEM));
    assert!(harness.player.played.lock().unwrap().is_empty());
    assert!(harness.feedback.labels.lock().unwrap().is_empty());
}

#[test]
fn silent_voice_label_abandons_the_entry() {
    let harness = Harness::new(&[5], false);
    let err = harness.record().unwrap_err();
    assert_eq!(err, RecordError::CouldNotRecordVoiceLabel);
    assert_eq!(err.code(), 2);
    assert_eq!(*harness.attempts.lock().unwrap(), 3);
    assert_eq!(
        harness.cues().iter().filter(|c| c.as_str() == CUE_NO_SOUND).count(),
        3
    );
    assert!(harness.lighthouse.catalog_ids().is_empty());
    assert!(harness.layout.entry_dirs().unwrap().is_empty());
}

#[test]
fn recorded_items_are_reloaded_from_disk() {
    let harness = Harness::new(&[7], true);
    harness.record().unwrap();
    let id = harness.lighthouse.catalog_ids().remove(0);
    let stored = harness.lighthouse.descriptor_by_id(&id).unwrap();

    let (reopened, summary) =
        ImageMatcher::open(MatchingSettings::default(), harness.layout.clone()).unwrap();
    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(*reopened.get_description_by_id(&id).unwrap(), *stored);
}

#[test]
fn wait_round_trips_through_the_loop() {
    let mut harness = Harness::new(&[], true);
    let (tx, rx) = mpsc::channel();
    harness.lighthouse.wait(41, move |value| tx.send(value + 1).unwrap());
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 42);
    harness.lighthouse.shutdown();
    assert!(!harness.lighthouse.is_running());
}
