use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use lighthouse_matching::settings::{
    DEFAULT_MATCHING_SCORE_THRESHOLD, DEFAULT_MIN_NUMBER_OF_FEATURES, DEFAULT_NUMBER_OF_FEATURES,
};

#[derive(Debug, Default)]
pub struct CliSources {
    pub features_from_cli: bool,
    pub min_features_from_cli: bool,
    pub threshold_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            features_from_cli: value_from_cli(matches, "features"),
            min_features_from_cli: value_from_cli(matches, "min_features"),
            threshold_from_cli: value_from_cli(matches, "threshold"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

pub fn try_parse_cli_from<I, T>(args: I) -> Result<(CliArgs, CliSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = CliArgs::command().try_get_matches_from(args)?;
    let args = CliArgs::from_arg_matches(&matches)?;
    let sources = CliSources::from_matches(&matches);
    Ok((args, sources))
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Run the appliance, reading record/identify/stop/quit from stdin
    Run,
    /// Describe an image file and print its keypoint count
    Extract {
        image: PathBuf,
    },
    /// Score an image file against the catalog
    Match {
        image: PathBuf,
    },
    /// Print one catalog entry
    Show {
        id: String,
    },
    /// List catalog ids
    List,
}

#[derive(Debug, Parser)]
#[command(
    name = "lighthouse",
    about = "Learn objects from two photos and a spoken label, then recognize them",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Directory holding one sub-directory per recorded item
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Camera backend: device, clip or mock
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Directory of still images played by the clip backend
    #[arg(long = "input")]
    pub input: Option<PathBuf>,

    /// Clip used when no camera can be opened
    #[arg(long = "fallback-clip")]
    pub fallback_clip: Option<PathBuf>,

    /// Directory with <cue>.wav sound files
    #[arg(long = "sounds-dir")]
    pub sounds_dir: Option<PathBuf>,

    /// Write every frame sent to the display into this directory
    #[arg(long = "dump-frames")]
    pub dump_frames: Option<PathBuf>,

    /// Maximum number of keypoints per picture
    #[arg(
        long = "features",
        id = "features",
        default_value_t = DEFAULT_NUMBER_OF_FEATURES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub features: u32,

    /// Pictures with fewer keypoints are rejected
    #[arg(
        long = "min-features",
        id = "min_features",
        default_value_t = DEFAULT_MIN_NUMBER_OF_FEATURES
    )]
    pub min_features: u32,

    /// Minimum score for a catalog item to be reported
    #[arg(
        long = "threshold",
        id = "threshold",
        default_value_t = DEFAULT_MATCHING_SCORE_THRESHOLD
    )]
    pub threshold: f32,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}
