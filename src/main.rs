use anyhow::Result;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use vidfetch::cli::{Cli, Commands};
use vidfetch::core::{config, init_logger, log_startup_configuration};
use vidfetch::download::formats::{FormatOption, VideoInfoResponse};
use vidfetch::download::{MediaFetcher, ProgressBus, SessionRegistry, WorkerPool, YtDlpFetcher};
use vidfetch::web::{start_web_server, WebState};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, binding the listener).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from worker tasks instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env must be loaded before any config value is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH, &config::LOG_LEVEL)?;

    match cli.command {
        Some(Commands::Serve {
            host,
            port,
            download_dir,
        }) => run_server(host, port, download_dir).await,
        Some(Commands::Info { url, json }) => run_cli_info(url, json).await,
        None => run_server(None, None, None).await,
    }
}

/// Build the coordinator and serve the web front-end
async fn run_server(host: Option<String>, port: Option<u16>, download_dir: Option<String>) -> Result<()> {
    let host = host.unwrap_or_else(|| config::WEB_HOST.clone());
    let port = port.unwrap_or(*config::WEB_PORT);
    let download_paths = match download_dir {
        Some(dir) => vec![PathBuf::from(shellexpand::tilde(&dir).into_owned())],
        None => config::default_download_paths(),
    };
    let static_dir = PathBuf::from(config::STATIC_DIR.as_str());

    if let Some(default_dir) = download_paths.first() {
        log_startup_configuration(default_dir, &static_dir);
        if let Err(e) = tokio::fs::create_dir_all(default_dir).await {
            log::warn!("Could not create download dir {}: {}", default_dir.display(), e);
        }
    }

    let fetcher = Arc::new(YtDlpFetcher::new());
    match fetcher.version().await {
        Some(version) => log::info!("yt-dlp version:  {}", version),
        None => log::warn!("yt-dlp is not available, lookups and downloads will fail"),
    }
    if let Err(e) = fetcher.check_tools().await {
        log::warn!("{} (merging and conversion will fail)", e);
    }

    let bus = Arc::new(ProgressBus::new());
    let registry = Arc::new(SessionRegistry::new(bus));
    let pool = Arc::new(WorkerPool::new(fetcher, registry, *config::WORKER_POOL_SIZE));

    let state = WebState::new(pool, download_paths, static_dir);
    start_web_server(&host, port, state).await
}

/// Print the format table of a video
async fn run_cli_info(url: String, json: bool) -> Result<()> {
    let fetcher = YtDlpFetcher::new();
    let info = fetcher.lookup(&url).await?;
    let response = VideoInfoResponse::from_info(&info);

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Title:    {}", response.title);
    println!("Duration: {}", response.duration);
    print_section("Video + audio", &response.formats.combined);
    print_section("Video only", &response.formats.video);
    print_section("Audio only", &response.formats.audio);
    Ok(())
}

fn print_section(title: &str, options: &[FormatOption]) {
    println!("\n{} ({})", title, options.len());
    for option in options {
        println!(
            "  {:<16} {:<5} {:<12} {:>10}  {}/{}",
            option.format_id, option.ext, option.quality_label, option.filesize, option.vcodec, option.acodec
        );
    }
}
