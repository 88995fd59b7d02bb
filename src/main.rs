use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use lighthouse::audio::CommandAudio;
use lighthouse::cli::{CliCommand, parse_cli};
use lighthouse::feedback::ApplianceFeedback;
use lighthouse::settings::{ConfigError, EffectiveSettings, resolve_settings};
use lighthouse::{Collaborators, Lighthouse};
use lighthouse_camera::{CameraError, still};
use lighthouse_matching::{CatalogLayout, ImageMatcher, MatchingError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Matching(#[from] MatchingError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("event loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lighthouse=info")),
        )
        .with_writer(io::stderr)
        .init();

    let (cli, sources) = parse_cli();
    let command = cli.command.clone().unwrap_or(CliCommand::Run);
    let result = match resolve_settings(&cli, &sources) {
        Ok(settings) => run(command, settings).await,
        Err(err) => Err(err.into()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, settings: EffectiveSettings) -> Result<(), AppError> {
    let layout = CatalogLayout::new(&settings.data_dir);
    let (matcher, summary) = ImageMatcher::open(settings.matching, layout)?;
    info!(
        data_dir = %settings.data_dir.display(),
        loaded = summary.loaded,
        skipped = summary.skipped,
        "catalog opened"
    );
    match command {
        CliCommand::Run => run_appliance(Arc::new(matcher), settings).await,
        CliCommand::Extract { image } => {
            let frame = still::load_frame(&image)?;
            let description = matcher.get_description(&frame)?;
            println!(
                "{}: {} keypoints, {} histogram bins",
                image.display(),
                description.keypoints().len(),
                description.histogram().len()
            );
            Ok(())
        }
        CliCommand::Match { image } => {
            let frame = still::load_frame(&image)?;
            let query = matcher.get_description(&frame)?;
            let matches = matcher.find_matches(&query);
            if matches.is_empty() {
                println!("no match");
            }
            for scored in matches {
                println!("{:8.2}  {}", scored.score, scored.description.id());
            }
            Ok(())
        }
        CliCommand::Show { id } => {
            let description = matcher.get_description_by_id(&id)?;
            let layout = matcher.layout();
            println!("id:          {}", description.id());
            println!("keypoints:   {}", description.keypoints().len());
            println!("histogram:   {} bins", description.histogram().len());
            println!(
                "voice label: {}",
                present(&layout.voice_label_path(description.id()))
            );
            println!(
                "image:       {}",
                present(&layout.source_image_path(description.id()))
            );
            Ok(())
        }
        CliCommand::List => {
            for id in matcher.ids() {
                println!("{id}");
            }
            Ok(())
        }
    }
}

fn present(path: &std::path::Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        "missing".to_string()
    }
}

async fn run_appliance(
    matcher: Arc<ImageMatcher>,
    settings: EffectiveSettings,
) -> Result<(), AppError> {
    let camera = settings.camera_configuration()?;
    let feedback = Arc::new(ApplianceFeedback::new(
        Box::new(settings.audio.clone()),
        settings.sounds_dir.clone(),
        settings.dump_frames.clone(),
        settings.appliance.voice.volume,
    )?);
    let audio: CommandAudio = settings.audio.clone();
    let collaborators = Collaborators {
        camera: Box::new(camera),
        recorder: Box::new(audio.clone()),
        player: Box::new(audio),
        feedback,
    };
    let mut lighthouse = Lighthouse::start(matcher, collaborators, settings.appliance)?;
    println!("commands: record, identify, stop, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "record" => lighthouse.start_record(
                        |frame| info!(width = frame.width(), height = frame.height(), "record finished"),
                        |err| warn!(code = err.code(), "record failed: {err}"),
                    ),
                    "identify" => lighthouse.start_identify(),
                    "stop" => lighthouse.stop(),
                    "quit" | "exit" => break,
                    other => println!("unknown command '{other}'"),
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || lighthouse.shutdown()).await?;
    Ok(())
}
