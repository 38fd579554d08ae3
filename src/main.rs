use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use village_voice::media::mime_from_extension;
use village_voice::{
    create_router, AppState, Blob, CaptureDevice, Config, DirectoryUploader, NoCaptureDevice,
    ObjectUrlRegistry, SessionServices, Uploader, WavFileCapture,
};

#[derive(Parser)]
#[command(name = "village-voice", about = "Voice recordings for village stories")]
struct Cli {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/village-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Record from a WAV file standing in for the microphone, then upload
    Record {
        /// WAV file replayed as the capture device
        input: PathBuf,
        /// Seconds to record before stopping
        #[arg(long, default_value_t = 3)]
        seconds: u64,
    },
    /// Attach an audio file to a fresh session and print its snapshot
    Attach {
        file: PathBuf,
        /// MIME type; guessed from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "village_voice=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Record { input, seconds } => record(cfg, input, seconds).await,
        Command::Attach { file, mime } => attach(cfg, file, mime).await,
    }
}

fn services(cfg: &Config, capture: Arc<dyn CaptureDevice>) -> SessionServices {
    SessionServices {
        config: cfg.session_config(),
        capture,
        references: Arc::new(ObjectUrlRegistry::new()),
    }
}

fn uploader(cfg: &Config) -> Arc<dyn Uploader> {
    Arc::new(DirectoryUploader::new(
        &cfg.storage.recordings_path,
        &cfg.storage.public_base_url,
    ))
}

async fn serve(cfg: Config) -> Result<()> {
    let capture: Arc<dyn CaptureDevice> = match &cfg.audio.capture_source {
        Some(path) => Arc::new(WavFileCapture::new(path, cfg.audio.chunk_bytes)),
        None => Arc::new(NoCaptureDevice),
    };
    info!("Capture device: {}", capture.name());

    let state = AppState::new(
        services(&cfg, capture),
        uploader(&cfg),
        &cfg.storage.recordings_path,
    );
    state.spawn_reaper(Duration::from_secs(cfg.service.http.session_ttl_secs.max(1)));
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

async fn record(cfg: Config, input: PathBuf, seconds: u64) -> Result<()> {
    let capture = Arc::new(WavFileCapture::new(&input, cfg.audio.chunk_bytes));
    let services = services(&cfg, capture);
    let session = services.open("cli-record");

    session.start_capture().await?;
    info!("Recording for {} seconds from {}", seconds, input.display());

    tokio::time::sleep(recording_wait(services.config.tick_interval, seconds)?).await;

    let snapshot = session.stop_capture().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let (recording, _) = session
        .take_for_submission()
        .await?
        .context("Recording was not kept")?;

    let url = uploader(&cfg).upload(&recording).await?;
    println!("{}", url);

    Ok(())
}

/// Stop just after the last tick so the elapsed time reads `seconds`
fn recording_wait(tick: Duration, seconds: u64) -> Result<Duration> {
    let ticks = u32::try_from(seconds).context("--seconds is too large")?;
    tick.checked_mul(ticks)
        .and_then(|wait| wait.checked_add(tick / 2))
        .context("--seconds is too large")
}

async fn attach(cfg: Config, file: PathBuf, mime: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mime = mime.unwrap_or_else(|| mime_from_extension(&file).to_string());
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());

    let services = services(&cfg, Arc::new(NoCaptureDevice));
    let session = services.open("cli-attach");
    let snapshot = session.supply_file(Blob::new(name, mime, bytes)).await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    session.discard().await?;

    Ok(())
}
