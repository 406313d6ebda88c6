// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use apiary_application::{
    run_listener, AutosnatchSwitch, FilterEngine, SnatchCoordinator, SnatchHistory,
};
use apiary_config::{load as load_config, AppConfig, DownloadsConfig, TrackerConfig};
use apiary_domain::{SnatchOrigin, TorrentId};
use apiary_gazelle::GazelleClient;
use apiary_infrastructure::{init_database, SnatchHistoryRepository, SqliteSnatchHistoryRepository};
use apiary_irc::IrcSettings;
use apiary_notify::{LogNotificationSink, NotificationSink};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ANNOUNCE_QUEUE: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "apiary", version, about = "Autosnatcher for Gazelle music trackers")]
struct Cli {
    /// TOML configuration file; APIARY_ environment variables override it.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Listen to every configured announce channel (the default).
    Run,
    /// Snatch one torrent by ID, bypassing filters.
    Snatch {
        /// Configured tracker name.
        tracker: String,
        torrent_id: TorrentId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.telemetry.log_level);
    log_config(&config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Snatch {
            tracker,
            torrent_id,
        } => {
            let path = snatch(&config, &tracker, torrent_id).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// The subscriber only exists once the configuration is known, so the load
/// summary is logged from here.
fn log_config(config: &AppConfig) {
    info!(
        target: "cli",
        trackers = config.trackers.len(),
        autosnatch = config.autosnatch.len(),
        filters = config.filters.len(),
        log_level = %config.telemetry.log_level,
        "configuration loaded"
    );
}

async fn run(config: AppConfig) -> Result<()> {
    if config.autosnatch.is_empty() {
        warn!(target: "cli", "no autosnatch section configured, nothing to listen to");
        return Ok(());
    }

    let history = open_history(&config).await?;
    let notifier: Arc<dyn NotificationSink> = Arc::new(LogNotificationSink);
    let watch_dir = watch_dir(&config.downloads)?;

    let mut tasks = JoinSet::new();
    // The switches must outlive the listeners reading them.
    let mut switches = Vec::new();

    for autosnatch in &config.autosnatch {
        let tracker = config
            .tracker(&autosnatch.tracker)
            .with_context(|| format!("unknown tracker {}", autosnatch.tracker))?;
        let client = build_client(tracker, &config.downloads)?;
        // The listener logs in again on the first announce if this fails.
        if let Err(e) = client.login().await {
            warn!(target: "cli", tracker = %tracker.name, error = %e, "initial login failed");
        }

        let coordinator = Arc::new(SnatchCoordinator::new(
            Arc::new(client),
            FilterEngine::new(
                &tracker.name,
                config.filters_for(&tracker.name),
                autosnatch.blacklisted_uploaders.clone(),
            ),
            history.clone(),
            notifier.clone(),
            watch_dir.clone(),
        ));
        info!(
            target: "cli",
            tracker = %tracker.name,
            filters = coordinator.engine().filters().len(),
            enabled = autosnatch.enabled,
            "starting announce listener"
        );

        let switch = AutosnatchSwitch::new(autosnatch.enabled);
        let (tx, rx) = mpsc::channel(ANNOUNCE_QUEUE);
        let state = switch.state();
        tasks.spawn(async move {
            run_listener(coordinator, state, rx).await;
        });

        let settings = IrcSettings::from_config(autosnatch, tracker.user.clone());
        let name = tracker.name.clone();
        tasks.spawn(async move {
            if let Err(e) = apiary_irc::run(settings, tx).await {
                error!(target: "cli", tracker = %name, error = %e, "announce connection ended");
            }
        });
        switches.push(switch);
    }

    tokio::select! {
        signal = shutdown_signal() => signal?,
        _ = async { while tasks.join_next().await.is_some() {} } => {
            warn!(target: "cli", "all announce listeners stopped");
        }
    }

    tasks.shutdown().await;
    drop(switches);
    Ok(())
}

async fn snatch(config: &AppConfig, tracker_name: &str, torrent_id: TorrentId) -> Result<PathBuf> {
    let tracker = config
        .tracker(tracker_name)
        .with_context(|| format!("unknown tracker {}", tracker_name))?;
    let client = build_client(tracker, &config.downloads)?;
    client.login().await?;

    let history = open_history(config).await?;
    let coordinator = SnatchCoordinator::new(
        Arc::new(client),
        FilterEngine::new(&tracker.name, Vec::new(), Vec::new()),
        history,
        Arc::new(LogNotificationSink),
        watch_dir(&config.downloads)?,
    );
    let snatch = coordinator
        .snatch_by_id(torrent_id, SnatchOrigin::Manual)
        .await?;
    Ok(snatch.path)
}

async fn open_history(config: &AppConfig) -> Result<SnatchHistory> {
    let pool = init_database(&config.database).await?;
    let repository: Arc<dyn SnatchHistoryRepository> =
        Arc::new(SqliteSnatchHistoryRepository::new(pool));
    Ok(SnatchHistory::new(repository))
}

/// One client, and so one rate limiter, per configured tracker.
fn build_client(tracker: &TrackerConfig, downloads: &DownloadsConfig) -> Result<GazelleClient> {
    let mut builder = GazelleClient::builder(&tracker.name, &tracker.url)
        .credentials(&tracker.user, &tracker.password)
        .rate_limit(tracker.api_calls, Duration::from_secs(tracker.api_period_secs));
    if let Some(dir) = &downloads.tmp_dir {
        builder = builder.tmp_dir(dir.clone());
    }
    Ok(builder.build()?)
}

fn watch_dir(downloads: &DownloadsConfig) -> Result<PathBuf> {
    downloads
        .watch_dir
        .as_deref()
        .map(Path::to_path_buf)
        .context("downloads.watch_dir is not configured")
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = interrupt.recv() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!(target: "cli", "shutdown signal received");
    Ok(())
}
