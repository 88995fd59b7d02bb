//! Voice label recording and playback through external audio commands.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Raw capture format: 16 kHz, mono, signed 16-bit little-endian.
pub const SAMPLE_RATE: u32 = 16_000;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

pub const BUFFER_DURATION: Duration = Duration::from_millis(100);
pub const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -22.0;
pub const DEFAULT_TRAILING_SILENCE: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(5000);

pub const DEFAULT_RECORD_COMMAND: &str = "arecord -q -t raw -f S16_LE -r 16000 -c 1";
pub const DEFAULT_PLAY_COMMAND: &str =
    "ffplay -nodisp -autoexit -loglevel quiet -volume {volume} {file}";

// Level reported for a buffer of digital silence.
const FLOOR_DB: f32 = -120.0;

pub type AudioResult<T> = Result<T, AudioError>;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio command is empty")]
    EmptyCommand,

    #[error("audio command '{program}' failed: {message}")]
    Command { program: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub trait VoiceRecorder: Send {
    /// Records a voice label into `path`. Returns `false` when nothing
    /// louder than the silence threshold was heard; no file is written then.
    fn record_to_file(&mut self, path: &Path, max_duration: Duration) -> AudioResult<bool>;
}

pub trait VoicePlayer: Send {
    /// Plays an audio file to completion. `volume` ranges from 0 to 1.
    fn play_file(&mut self, path: &Path, volume: f32) -> AudioResult<()>;
}

pub fn bytes_in_duration(duration: Duration) -> usize {
    let samples = (SAMPLE_RATE as u128 * duration.as_millis() / 1000) as usize;
    samples * CHANNELS as usize * (BITS_PER_SAMPLE as usize / 8)
}

/// RMS level of a PCM buffer in dBFS.
pub fn level_dbfs(pcm: &[u8]) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for bytes in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / 32768.0;
        sum += sample * sample;
        count += 1;
    }
    if count == 0 || sum == 0.0 {
        return FLOOR_DB;
    }
    let rms = (sum / count as f64).sqrt();
    (20.0 * rms.log10()).max(FLOOR_DB as f64) as f32
}

/// Wraps raw PCM into a canonical 44-byte-header WAV file.
pub fn wav_bytes(pcm: &[u8]) -> Vec<u8> {
    let byte_rate = SAMPLE_RATE * CHANNELS as u32 * BITS_PER_SAMPLE as u32 / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let data_size = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

/// Decides when a recording is over from per-buffer levels.
#[derive(Debug, Clone)]
pub struct SilenceGate {
    threshold_db: f32,
    trailing_silence: Duration,
    max_duration: Duration,
    elapsed: Duration,
    quiet: Duration,
    heard: bool,
}

impl SilenceGate {
    pub fn new(threshold_db: f32, trailing_silence: Duration, max_duration: Duration) -> Self {
        Self {
            threshold_db,
            trailing_silence,
            max_duration,
            elapsed: Duration::ZERO,
            quiet: Duration::ZERO,
            heard: false,
        }
    }

    /// Feeds one buffer; returns `true` while recording should go on.
    pub fn push(&mut self, level_db: f32, length: Duration) -> bool {
        self.elapsed += length;
        if level_db > self.threshold_db {
            self.heard = true;
            self.quiet = Duration::ZERO;
        } else {
            self.quiet += length;
        }
        if self.elapsed >= self.max_duration {
            return false;
        }
        !(self.heard && self.quiet >= self.trailing_silence)
    }

    pub fn heard(&self) -> bool {
        self.heard
    }
}

/// Reads 100 ms buffers from `source` until the gate closes or the source
/// ends. Returns the captured PCM and whether anything was heard.
pub fn capture_voice(source: &mut impl Read, mut gate: SilenceGate) -> io::Result<(Vec<u8>, bool)> {
    let chunk = bytes_in_duration(BUFFER_DURATION);
    let mut pcm = Vec::new();
    let mut buffer = vec![0u8; chunk];
    loop {
        let filled = read_full(source, &mut buffer)?;
        if filled == 0 {
            break;
        }
        let data = &buffer[..filled];
        pcm.extend_from_slice(data);
        let length = Duration::from_millis((filled * BUFFER_DURATION.as_millis() as usize / chunk) as u64);
        if !gate.push(level_dbfs(data), length) || filled < chunk {
            break;
        }
    }
    Ok((pcm, gate.heard()))
}

fn read_full(source: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match source.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Records with a command that streams raw PCM to stdout and plays with a
/// command that accepts `{file}` and `{volume}` (0-100) placeholders.
#[derive(Debug, Clone)]
pub struct CommandAudio {
    pub record_command: String,
    pub play_command: String,
    pub silence_threshold_db: f32,
    pub trailing_silence: Duration,
}

impl Default for CommandAudio {
    fn default() -> Self {
        Self {
            record_command: DEFAULT_RECORD_COMMAND.to_string(),
            play_command: DEFAULT_PLAY_COMMAND.to_string(),
            silence_threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
            trailing_silence: DEFAULT_TRAILING_SILENCE,
        }
    }
}

fn split_command(command: &str) -> AudioResult<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next().ok_or(AudioError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

fn stop_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl VoiceRecorder for CommandAudio {
    fn record_to_file(&mut self, path: &Path, max_duration: Duration) -> AudioResult<bool> {
        let (program, args) = split_command(&self.record_command)?;
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| AudioError::Command {
                program: program.clone(),
                message: err.to_string(),
            })?;
        let Some(mut stdout) = child.stdout.take() else {
            stop_child(&mut child);
            return Err(AudioError::Command {
                program,
                message: "no stdout".into(),
            });
        };
        let gate = SilenceGate::new(self.silence_threshold_db, self.trailing_silence, max_duration);
        let captured = capture_voice(&mut stdout, gate);
        stop_child(&mut child);
        let (pcm, heard) = captured?;
        debug!(bytes = pcm.len(), heard, "voice capture finished");
        if heard {
            fs::write(path, wav_bytes(&pcm))?;
        }
        Ok(heard)
    }
}

impl VoicePlayer for CommandAudio {
    fn play_file(&mut self, path: &Path, volume: f32) -> AudioResult<()> {
        let volume = ((volume.clamp(0.0, 1.0) * 100.0).round() as u32).to_string();
        let file = path.to_string_lossy();
        let (program, args) = split_command(&self.play_command)?;
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.replace("{file}", &file).replace("{volume}", &volume))
            .collect();
        let status = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| AudioError::Command {
                program: program.clone(),
                message: err.to_string(),
            })?;
        if !status.success() {
            warn!(program = %program, %status, "playback command failed");
            return Err(AudioError::Command {
                program,
                message: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}
