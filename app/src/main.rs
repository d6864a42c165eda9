/// sto-grab - terminal front end for finding and downloading s.to HLS streams.
///
/// Paste an episode URL, let a browser sniff the player's `.m3u8` request, then download
/// every collected manifest with yt-dlp, one after another.
mod controller;
mod keyboard;
mod link_detector;
mod state;
mod ui;

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event};
use ratatui::DefaultTerminal;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use sto_downloader::YtDlp;
use sto_shared::config::AppConfig;
use sto_shared::events::{self as app_events, EventReceiver};

use controller::Controller;
use state::AppState;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(&config)?;

    info!("=== sto-grab starting ===");
    info!("Config: {:?}", config);

    let db_pool = open_database(&config).await;

    let (events_tx, events_rx) = app_events::channel();
    let mut state = AppState::new(config.download.download_dir.clone());
    let mut controller = Controller::new(config.clone(), db_pool, events_tx);
    state.restore_links(controller.saved_links().await);
    check_tools(&config, &mut state);

    let mut terminal = ratatui::init();
    let result = run(&mut terminal, &mut state, &mut controller, events_rx).await;
    ratatui::restore();

    controller.shutdown().await;
    if let Err(e) = &result {
        error!("UI loop failed: {:#}", e);
    }
    info!("=== sto-grab stopped ===");
    result
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Cannot open log file {}", config.log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sto_app=info".parse()?)
                .add_directive("sto_shared=info".parse()?)
                .add_directive("sto_sniffer=info".parse()?)
                .add_directive("sto_downloader=info".parse()?),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Persistence is optional: without a database the app still works, it just forgets.
async fn open_database(config: &AppConfig) -> Option<SqlitePool> {
    let database_url = config.database_url();
    info!("Database: {}", database_url);
    match sto_shared::db::create_pool(&database_url).await {
        Ok(pool) => {
            if let Err(e) = sto_shared::db::run_migrations(&pool).await {
                error!("DB migration error: {}", e);
                return None;
            }
            Some(pool)
        }
        Err(e) => {
            error!("Failed to connect to database: {}. Running without persistence.", e);
            None
        }
    }
}

/// Warn up front about missing external tools.
fn check_tools(config: &AppConfig, state: &mut AppState) {
    match sto_sniffer::chrome::resolve_chrome(config.browser.chrome_path.as_deref()) {
        Some(path) => info!("Browser: {:?}", path),
        None => {
            warn!("No Chrome/Chromium executable found");
            state.set_status("⚠️ No Chrome/Chromium found. Set STO_CHROME_PATH.");
        }
    }
    if let Err(e) = YtDlp::locate(&config.download) {
        warn!("yt-dlp unavailable: {}", e);
        state.set_status(format!("⚠️ {e}. Install yt-dlp or set STO_YTDLP_BIN."));
    }
}

async fn run(
    terminal: &mut DefaultTerminal,
    state: &mut AppState,
    controller: &mut Controller,
    mut events: EventReceiver,
) -> anyhow::Result<()> {
    while !state.exit {
        terminal.draw(|frame| ui::render(frame, state))?;

        let now = Instant::now();
        while let Ok(event) = events.try_recv() {
            for effect in state.apply(event, now) {
                controller.handle(effect);
            }
        }
        state.tick(now);

        if event::poll(FRAME_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = keyboard::map_key(key, state.mode) {
                    for effect in keyboard::handle_action(state, action) {
                        controller.handle(effect);
                    }
                }
            }
        }
    }
    Ok(())
}
