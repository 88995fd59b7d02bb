use std::env;
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use lighthouse_camera::{Backend, CameraResult, Configuration};
use lighthouse_matching::MatchingSettings;
use serde::Deserialize;

use crate::appliance::{ApplianceOptions, VoiceSettings};
use crate::audio::CommandAudio;
use crate::capture::DEFAULT_DWELL;
use crate::cli::{CliArgs, CliSources};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<String>,
    matching: Option<MatchingFileConfig>,
    camera: Option<CameraFileConfig>,
    voice: Option<VoiceFileConfig>,
    feedback: Option<FeedbackFileConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct MatchingFileConfig {
    number_of_features: Option<u32>,
    min_number_of_features: Option<u32>,
    matching_score_threshold: Option<f32>,
    ratio_test_k: Option<f32>,
    histogram_weight: Option<f32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct CameraFileConfig {
    backend: Option<String>,
    input: Option<String>,
    fallback_clip: Option<String>,
    device_command: Option<String>,
    device_width: Option<u32>,
    device_height: Option<u32>,
    channel_capacity: Option<usize>,
    dwell_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct VoiceFileConfig {
    max_attempts: Option<u32>,
    max_duration_ms: Option<u64>,
    volume: Option<f32>,
    record_command: Option<String>,
    play_command: Option<String>,
    silence_threshold_db: Option<f32>,
    trailing_silence_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
struct FeedbackFileConfig {
    sounds_dir: Option<String>,
    dump_frames: Option<String>,
    save_source_image: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CameraSettings {
    pub backend: Option<Backend>,
    pub input: Option<PathBuf>,
    pub fallback_clip: Option<PathBuf>,
    pub device_command: Option<String>,
    pub device_width: Option<u32>,
    pub device_height: Option<u32>,
    pub channel_capacity: Option<NonZeroUsize>,
}

#[derive(Debug)]
pub struct EffectiveSettings {
    pub data_dir: PathBuf,
    pub matching: MatchingSettings,
    pub camera: CameraSettings,
    pub appliance: ApplianceOptions,
    pub audio: CommandAudio,
    pub sounds_dir: Option<PathBuf>,
    pub dump_frames: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
}

impl EffectiveSettings {
    /// Camera configuration from the environment with configured values
    /// layered on top.
    pub fn camera_configuration(&self) -> CameraResult<Configuration> {
        let mut config = Configuration::from_env()?;
        let camera = &self.camera;
        if let Some(backend) = camera.backend {
            config.backend = backend;
        }
        if let Some(input) = camera.input.clone() {
            config.input = Some(input);
        }
        if let Some(clip) = camera.fallback_clip.clone() {
            config.fallback_clip = Some(clip);
        }
        if let Some(command) = camera.device_command.clone() {
            config.device_command = command;
        }
        if let Some(width) = camera.device_width {
            config.device_width = width;
        }
        if let Some(height) = camera.device_height {
            config.device_height = height;
        }
        if camera.channel_capacity.is_some() {
            config.channel_capacity = camera.channel_capacity;
        }
        Ok(config)
    }
}

const DEFAULT_DATA_DIR_NAME: &str = "Data";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        return read_config(path).map(|config| (config, Some(path.to_path_buf())));
    }

    let candidates = [project_config_path(), default_config_path()];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            let config = read_config(&path)?;
            return Ok((config, Some(path)));
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));
    let base = config_dir.as_deref();

    let FileConfig {
        data_dir: file_data_dir,
        matching: file_matching,
        camera: file_camera,
        voice: file_voice,
        feedback: file_feedback,
    } = file;
    let file_matching = file_matching.unwrap_or_default();
    let file_camera = file_camera.unwrap_or_default();
    let file_voice = file_voice.unwrap_or_default();
    let file_feedback = file_feedback.unwrap_or_default();

    let data_dir = match cli.data_dir.clone() {
        Some(dir) => expand_pathbuf(dir),
        None => normalize_string(file_data_dir)
            .and_then(|dir| resolve_path_from_config(dir, base))
            .or_else(default_data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR_NAME)),
    };

    let mut matching = MatchingSettings {
        number_of_features: cli.features,
        min_number_of_features: cli.min_features,
        matching_score_threshold: cli.threshold,
        ..MatchingSettings::default()
    };
    if !sources.features_from_cli {
        if let Some(value) = file_matching.number_of_features {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    path: config_path,
                    field: "matching.number_of_features",
                    value: value.to_string(),
                });
            }
            matching.number_of_features = value;
        }
    }
    if !sources.min_features_from_cli {
        if let Some(value) = file_matching.min_number_of_features {
            matching.min_number_of_features = value;
        }
    }
    if !sources.threshold_from_cli {
        if let Some(value) = file_matching.matching_score_threshold {
            matching.matching_score_threshold = value;
        }
    }
    if let Some(value) = file_matching.ratio_test_k {
        matching.ratio_test_k = value;
    }
    if let Some(value) = file_matching.histogram_weight {
        matching.histogram_weight = value;
    }
    if let Err(err) = matching.validate() {
        return Err(ConfigError::InvalidValue {
            path: config_path,
            field: "matching",
            value: err.to_string(),
        });
    }

    let backend = match normalize_string(cli.backend.clone())
        .or_else(|| normalize_string(file_camera.backend.clone()))
    {
        Some(value) => Some(parse_backend(&value, config_path.as_ref())?),
        None => None,
    };
    let input = match cli.input.clone() {
        Some(path) => Some(expand_pathbuf(path)),
        None => normalize_string(file_camera.input.clone())
            .and_then(|value| resolve_path_from_config(value, base)),
    };
    let fallback_clip = match cli.fallback_clip.clone() {
        Some(path) => Some(expand_pathbuf(path)),
        None => normalize_string(file_camera.fallback_clip.clone())
            .and_then(|value| resolve_path_from_config(value, base)),
    };
    let channel_capacity = match file_camera.channel_capacity {
        Some(value) => Some(NonZeroUsize::new(value).ok_or_else(|| {
            ConfigError::InvalidValue {
                path: config_path.clone(),
                field: "camera.channel_capacity",
                value: value.to_string(),
            }
        })?),
        None => None,
    };
    let camera = CameraSettings {
        backend,
        input,
        fallback_clip,
        device_command: normalize_string(file_camera.device_command),
        device_width: file_camera.device_width,
        device_height: file_camera.device_height,
        channel_capacity,
    };

    let mut voice = VoiceSettings::default();
    if let Some(value) = file_voice.max_attempts {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                path: config_path,
                field: "voice.max_attempts",
                value: value.to_string(),
            });
        }
        voice.max_attempts = value;
    }
    if let Some(value) = file_voice.max_duration_ms {
        voice.max_duration = Duration::from_millis(value);
    }
    if let Some(value) = file_voice.volume {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::InvalidValue {
                path: config_path,
                field: "voice.volume",
                value: value.to_string(),
            });
        }
        voice.volume = value;
    }

    let mut audio = CommandAudio::default();
    if let Some(command) = normalize_string(file_voice.record_command) {
        audio.record_command = command;
    }
    if let Some(command) = normalize_string(file_voice.play_command) {
        audio.play_command = command;
    }
    if let Some(value) = file_voice.silence_threshold_db {
        audio.silence_threshold_db = value;
    }
    if let Some(value) = file_voice.trailing_silence_ms {
        audio.trailing_silence = Duration::from_millis(value);
    }

    let appliance = ApplianceOptions {
        voice,
        dwell: file_camera
            .dwell_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DWELL),
        save_source_image: file_feedback.save_source_image.unwrap_or(true),
        ..ApplianceOptions::default()
    };

    let sounds_dir = match cli.sounds_dir.clone() {
        Some(dir) => Some(expand_pathbuf(dir)),
        None => normalize_string(file_feedback.sounds_dir)
            .and_then(|value| resolve_path_from_config(value, base)),
    };
    let dump_frames = match cli.dump_frames.clone() {
        Some(dir) => Some(expand_pathbuf(dir)),
        None => normalize_string(file_feedback.dump_frames)
            .and_then(|value| resolve_path_from_config(value, base)),
    };

    Ok(EffectiveSettings {
        data_dir,
        matching,
        camera,
        appliance,
        audio,
        sounds_dir,
        dump_frames,
        config_dir,
    })
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "lighthouse", "lighthouse")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("rs", "lighthouse", "lighthouse")
        .map(|dirs| dirs.data_dir().join(DEFAULT_DATA_DIR_NAME))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join("config.toml"))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

fn parse_backend(value: &str, path: Option<&PathBuf>) -> Result<Backend, ConfigError> {
    Backend::from_str(value).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field: "camera.backend",
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::cli::try_parse_cli_from;

    fn resolve_with(contents: &str, extra: &[&str]) -> Result<EffectiveSettings, ConfigError> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        let mut argv = vec!["lighthouse".to_string(), "--config".to_string()];
        argv.push(path.display().to_string());
        argv.extend(extra.iter().map(|s| s.to_string()));
        let (cli, sources) = try_parse_cli_from(argv).unwrap();
        let settings = resolve_settings(&cli, &sources)?;
        assert_eq!(settings.config_dir.as_deref(), Some(dir.path()));
        Ok(settings)
    }

    #[test]
    fn file_values_fill_in_defaults() {
        let settings = resolve_with(
            r#"
data_dir = "catalog"

[matching]
matching_score_threshold = 30.0
histogram_weight = 0.0

[camera]
backend = "Mock"
dwell_ms = 250

[voice]
max_attempts = 5
"#,
            &[],
        )
        .unwrap();
        assert!(settings.data_dir.ends_with("catalog"));
        assert!(settings.data_dir.is_absolute());
        assert_eq!(settings.matching.matching_score_threshold, 30.0);
        assert_eq!(settings.matching.histogram_weight, 0.0);
        assert_eq!(settings.matching.number_of_features, 500);
        assert_eq!(settings.camera.backend, Some(Backend::Mock));
        assert_eq!(settings.appliance.dwell, Duration::from_millis(250));
        assert_eq!(settings.appliance.voice.max_attempts, 5);
        assert!(settings.appliance.save_source_image);
    }

    #[test]
    fn command_line_wins_over_file() {
        let settings = resolve_with(
            "[matching]\nmatching_score_threshold = 30.0\n",
            &["--threshold", "12", "--backend", "clip"],
        )
        .unwrap();
        assert_eq!(settings.matching.matching_score_threshold, 12.0);
        assert_eq!(settings.camera.backend, Some(Backend::Clip));
    }

    #[test]
    fn invalid_values_name_the_field() {
        let err = resolve_with("[matching]\nratio_test_k = 1.5\n", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "matching", .. }));
        let err = resolve_with("[matching]\nhistogram_weight = 40.0\n", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "matching", .. }));
        let err = resolve_with("[camera]\nbackend = \"webcam\"\n", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "camera.backend", .. }));
        let err = resolve_with("[voice]\nmax_attempts = 0\n", &[]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "voice.max_attempts", .. }));
    }

    #[test]
    fn missing_override_is_reported() {
        let (cli, sources) =
            try_parse_cli_from(["lighthouse", "--config", "/nonexistent/lighthouse.toml"]).unwrap();
        assert!(matches!(
            resolve_settings(&cli, &sources),
            Err(ConfigError::NotFound { .. })
        ));
    }
}
