//! gen-digest - Turn a day's newsletters into a chaptered audio digest and deliver it

mod audio;
mod cleanup;
mod config;
mod pipeline;
mod source;
mod text;
mod tts;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::DigestConfig;
use delivery_client::{DeliveryClient, HttpTransport};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use audio::FfmpegEncoder;
use cleanup::{ArchiveArtifacts, ArtifactCleaner, RemoveArtifacts};
use pipeline::{DigestPipeline, PipelineSettings};
use source::DirectorySource;
use tts::VoiceSelector;

/// Archive used by `upload` when none is configured.
const DEFAULT_UPLOAD_ARCHIVE: &str = "archive_mp3";

#[derive(Parser, Debug)]
#[command(name = "gen-digest")]
#[command(about = "Turn a day's newsletters into a chaptered audio digest and deliver it", long_about = None)]
#[command(version)]
struct Args {
    /// Date to build (YYYY-MM-DD); repeat for several. Defaults to yesterday.
    #[arg(long = "date", value_name = "YYYY-MM-DD")]
    dates: Vec<NaiveDate>,

    /// Rebuild and upload even if the digest already exists remotely
    #[arg(long)]
    force: bool,

    /// Path to voice reference audio for voice cloning
    #[arg(long)]
    voice: Option<PathBuf>,

    /// Per-file upload ceiling in megabytes
    #[arg(long)]
    max_part_mb: Option<f64>,

    /// Directory holding one sub-directory of newsletters per date
    #[arg(long)]
    inbox: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload an existing MP3, splitting it when it is too large
    Upload {
        /// Path to the MP3 file
        file: PathBuf,

        /// Title to upload under (default: "Manual Upload: <file name>")
        #[arg(long)]
        title: Option<String>,

        /// Where split parts are written
        #[arg(long)]
        archive_dir: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice reference
    SetVoice {
        /// Path to voice reference audio
        path: PathBuf,
    },
    /// Set the audiobook API base URL
    SetApiUrl {
        /// e.g. https://example.com/api/v1
        url: String,
    },
    /// Set the newsletter inbox directory
    SetInbox {
        /// Directory with one sub-directory per date
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

async fn run(args: Args) -> Result<ExitCode> {
    match &args.command {
        Some(Commands::Config { action }) => {
            handle_config_command(action)?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Upload {
            file,
            title,
            archive_dir,
        }) => {
            return run_upload(file, title.as_deref(), archive_dir.clone(), &args).await;
        }
        None => {}
    }

    run_digest(&args).await
}

/// Load config and apply command-line overrides.
fn load_config(args: &Args) -> Result<DigestConfig> {
    let mut config = DigestConfig::load().context("Failed to load configuration")?;
    if let Some(voice) = &args.voice {
        config.reference_voice = Some(voice.clone());
    }
    if let Some(max_part_mb) = args.max_part_mb {
        config.max_part_size_mb = max_part_mb;
    }
    if let Some(inbox) = &args.inbox {
        config.inbox_dir = Some(inbox.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_delivery_client(config: &DigestConfig) -> Result<DeliveryClient> {
    let transport =
        HttpTransport::new(&config.delivery).context("Failed to set up the delivery client")?;
    Ok(DeliveryClient::new(Box::new(transport)))
}

fn require_ffmpeg() -> Result<()> {
    if !FfmpegEncoder::is_available() {
        anyhow::bail!("ffmpeg and ffprobe are required but were not found on PATH");
    }
    Ok(())
}

fn yesterday() -> Result<NaiveDate> {
    Local::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .context("Could not compute yesterday's date")
}

async fn run_digest(args: &Args) -> Result<ExitCode> {
    let config = load_config(args)?;

    let dates = if args.dates.is_empty() {
        vec![yesterday()?]
    } else {
        args.dates.clone()
    };
    debug!("Dates: {:?}", dates);

    let delivery = build_delivery_client(&config)?;
    require_ffmpeg()?;

    let voice = VoiceSelector::select(config.reference_voice.as_deref(), &config.default_speaker);
    let synthesizer = tts::create_backend(
        config.device.as_deref(),
        &config.language,
        config.python_site_packages.as_deref(),
    )
    .context("Failed to initialize the speech engine")?;
    info!("Speech engine ready on {}", synthesizer.device());

    let cleaner: Box<dyn ArtifactCleaner> = match &config.archive_dir {
        Some(dir) => Box::new(ArchiveArtifacts::new(dir)),
        None => Box::new(RemoveArtifacts),
    };

    let pipeline = DigestPipeline::new(
        synthesizer,
        Box::new(FfmpegEncoder::new()),
        delivery,
        Box::new(DirectorySource::new(config.inbox_dir()?)),
        cleaner,
        voice,
        PipelineSettings::from_config(&config),
    );

    let reports = pipeline.run_batch(&dates, !args.force).await;

    eprintln!();
    for report in &reports {
        eprintln!("{}: {}", report.date, report.outcome);
    }

    if reports.iter().any(|r| r.failed()) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn run_upload(
    file: &Path,
    title: Option<&str>,
    archive_dir: Option<PathBuf>,
    args: &Args,
) -> Result<ExitCode> {
    let config = load_config(args)?;
    let delivery = build_delivery_client(&config)?;
    require_ffmpeg()?;

    let archive_dir = archive_dir
        .or(config.archive_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ARCHIVE));

    let parts = pipeline::upload_existing(
        file,
        title,
        config.max_part_size_mb,
        &archive_dir,
        &FfmpegEncoder::new(),
        &delivery,
    )
    .await?;

    eprintln!("Uploaded {} part(s) of {}", parts, file.display());
    Ok(ExitCode::SUCCESS)
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = DigestConfig::load()?;
            println!("Configuration file: {:?}", DigestConfig::config_path()?);
            println!();
            match &config.reference_voice {
                Some(voice) => println!("reference_voice = \"{}\"", voice.display()),
                None => println!("reference_voice = (none)"),
            }
            println!("default_speaker = \"{}\"", config.default_speaker);
            println!("language = \"{}\"", config.language);
            match &config.device {
                Some(device) => println!("device = \"{}\"", device),
                None => println!("device = (auto-detect)"),
            }
            println!("max_chunk_chars = {}", config.max_chunk_chars);
            println!("max_chunk_tokens = {}", config.max_chunk_tokens);
            println!("max_part_size_mb = {}", config.max_part_size_mb);
            println!("inbox_dir = \"{}\"", config.inbox_dir()?.display());
            println!("work_dir = \"{}\"", config.work_dir().display());
            match &config.archive_dir {
                Some(dir) => println!("archive_dir = \"{}\"", dir.display()),
                None => println!("archive_dir = (delete after upload)"),
            }
            println!();
            println!("[delivery]");
            if config.delivery.api_url.is_empty() {
                println!("api_url = (not set)");
            } else {
                println!("api_url = \"{}\"", config.delivery.api_url);
            }
            let key_source = match &config.delivery.api_key {
                Some(_) => "(set)".to_string(),
                None => format!("(from ${})", delivery_client::config::API_KEY_ENV_VAR),
            };
            println!("api_key = {}", key_source);
            println!("timeout_secs = {}", config.delivery.timeout_secs);
        }
        ConfigAction::SetVoice { path } => {
            let mut config = DigestConfig::load()?;
            config.reference_voice = Some(path.clone());
            config.save()?;
            println!("Default voice reference set to: {}", path.display());
        }
        ConfigAction::SetApiUrl { url } => {
            let mut config = DigestConfig::load()?;
            config.delivery.api_url = url.trim_end_matches('/').to_string();
            config.save()?;
            println!("API URL set to: {}", config.delivery.api_url);
        }
        ConfigAction::SetInbox { path } => {
            let mut config = DigestConfig::load()?;
            config.inbox_dir = Some(path.clone());
            config.save()?;
            println!("Inbox directory set to: {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_dates() {
        let args = Args::parse_from([
            "gen-digest",
            "--date",
            "2024-05-01",
            "--date",
            "2024-05-02",
            "--force",
        ]);
        assert_eq!(
            args.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            ]
        );
        assert!(args.force);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(Args::try_parse_from(["gen-digest", "--date", "May 1"]).is_err());
    }

    #[test]
    fn test_parse_upload() {
        let args = Args::parse_from(["gen-digest", "upload", "show.mp3", "--title", "Show"]);
        match args.command {
            Some(Commands::Upload { file, title, .. }) => {
                assert_eq!(file, PathBuf::from("show.mp3"));
                assert_eq!(title.as_deref(), Some("Show"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_yesterday_is_before_today() {
        assert!(yesterday().unwrap() < Local::now().date_naive());
    }
}
