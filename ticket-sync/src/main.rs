use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ticket_sync::alert::{LogNotifier, Muted, Notifier};
use ticket_sync::cache::DiskCache;
use ticket_sync::config::{Config, ConfigError};
use ticket_sync::google::{
    AuthError, CalendarConfig, ClientSecrets, CredentialManager, GoogleCalendar, GoogleDrive,
    InstalledAppFlow, SCOPES, TokenStore,
};
use ticket_sync::model::{GeminiClient, GeminiConfig};
use ticket_sync::schedule::{RailRadarClient, ScheduleClientConfig, ScheduleLookup};
use ticket_sync::sync::{CalendarSync, EventSettings};
use ticket_sync::ticket::{GenericExtractor, PdfText, StructuredExtractor, TicketParser};
use ticket_sync::watch::{Orchestrator, TicketPipeline, TicketWatcher, WatchError};

/// Watch a folder of travel tickets and add each journey to Google Calendar.
#[derive(Debug, Parser)]
#[command(name = "ticket-sync", version)]
struct Args {
    /// Configuration file (default: ~/.config/travel-ticket-calendar/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process the tickets already in the folder, then exit
    #[arg(long)]
    once: bool,

    /// Log filter, e.g. "debug" or "ticket_sync=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

/// Errors that end the process.
#[derive(Debug, thiserror::Error)]
enum FatalError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Google sign-in setup: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging(None, args.log_level.as_deref());
            error!(error = %e, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_folder.as_deref(), args.log_level.as_deref());
    info!(config = %config_path.display(), "starting ticket-sync");

    match run(&args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            eprintln!("ticket-sync: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to the day's file in `log_folder` when configured, else to stderr.
fn init_logging(log_folder: Option<&Path>, level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let Some(folder) = log_folder else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return;
    };

    let log_path = folder.join(chrono::Local::now().format("log_%d_%m_%Y.txt").to_string());
    let opened = std::fs::create_dir_all(folder).and_then(|()| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    });
    match opened {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            warn!(
                path = %log_path.display(),
                error = %e,
                "cannot open log file, logging to stderr"
            );
        }
    }
}

async fn run(args: &Args, config: Config) -> Result<(), FatalError> {
    let policy = config.retry_policy();
    let colors = config.traveler_colors();

    let cache = DiskCache::new(&config.cache_config());
    let swept = cache.sweep_expired();
    if swept > 0 {
        info!(swept, "removed expired cache entries");
    }

    // Schedule and model credentials are read on first use.
    let schedule_timeout = config.schedule_request_timeout.to_duration().as_secs().max(1);
    let schedule = ScheduleLookup::new(
        RailRadarClient::new(
            ScheduleClientConfig::new(&config.schedule_credentials_path)
                .with_timeout(schedule_timeout),
        ),
        cache.scoped("schedules"),
        policy,
    );
    let model = GeminiClient::new(GeminiConfig::new(&config.model_credentials_path));
    let generic = GenericExtractor::new(
        model,
        cache.scoped("responses"),
        policy,
        config.model_candidates(),
        colors.clone(),
    );
    let parser = TicketParser::new(
        PdfText,
        StructuredExtractor::new(schedule, colors),
        generic,
    );

    let scopes: Vec<String> = SCOPES.iter().map(|s| s.to_string()).collect();
    let secrets = ClientSecrets::load(&config.google_credentials_path)?;
    let flow = InstalledAppFlow::new(secrets, scopes.clone())?
        .with_calendar_name(&config.calendar_id)
        .with_sign_in_timeout(config.sign_in_timeout.to_duration());
    let calendar = Arc::new(GoogleCalendar::new(CalendarConfig::new(&config.calendar_id)));
    let drive = Arc::new(GoogleDrive::new());
    let store = TokenStore::new(&config.google_token_path);
    let credentials = CredentialManager::new(flow, store, scopes)
        .with_dependent(calendar.clone())
        .with_dependent(drive.clone());
    // A declined sign-in ends the run before any ticket is touched.
    credentials.sign_in().await?;
    let settings = EventSettings {
        reminders: config.reminder_offsets(),
        reminder_method: config.reminder_method,
    };
    let sync = CalendarSync::new(calendar, drive, Arc::new(credentials), settings, policy);

    let notifier: Arc<dyn Notifier> = if config.notifications {
        Arc::new(LogNotifier)
    } else {
        Arc::new(Muted)
    };
    let ticket_folder = resolve_folder(&config.ticket_folder);
    let done_folder = config.done_folder.as_deref().map(|done| {
        if let Err(e) = std::fs::create_dir_all(done) {
            warn!(path = %done.display(), error = %e, "cannot create done folder");
        }
        resolve_folder(done)
    });
    let pipeline = TicketPipeline::new(parser, sync);
    let orchestrator = Orchestrator::new(pipeline, &ticket_folder, notifier)
        .with_done_folder(done_folder)
        .with_transfer_timing(
            config.file_transfer_timeout.to_duration(),
            config.file_transfer_poll_interval.to_duration(),
        );

    if args.once {
        let summary = orchestrator.backfill().await?;
        info!(?summary, "done");
        return Ok(());
    }

    // Start watching before the backfill so nothing arriving meanwhile is missed.
    let (_watcher, mut arrivals) = TicketWatcher::start(&ticket_folder, orchestrator.filter())?;
    let summary = orchestrator.run(&mut arrivals, shutdown_signal()).await?;
    info!(?summary, "stopped");
    Ok(())
}

/// Watch events carry absolute paths; compare like with like.
fn resolve_folder(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
