//! Terminal dashboard for dustroute that keeps a bin overload map and collection route fresh.

mod app;
mod config;
mod input;
mod logging;
mod ui;

use std::{
    future, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration as StdDuration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dustroute_core::{
    plugin::SourceRegistry,
    render::MapDocument,
    scheduler::{CycleOutcome, RefreshScheduler, Trigger},
    service::DustrouteService,
};
use dustroute_provider_osrm as osrm;
use dustroute_provider_simulated as simulated;
use dustroute_provider_telemetry as telemetry;
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tokio::{signal, sync::mpsc::UnboundedReceiver};
use tracing::{error, info, warn};

use crate::app::App;
use crate::config::Config;
use crate::input::Action;
use crate::logging::{LogTarget, init_tracing};

#[derive(Debug, Parser)]
#[command(author, version, about = "Overloaded waste bins on a map, with a collection route")]
struct Cli {
    /// Run a single refresh cycle, write the map, and exit
    #[arg(long, conflicts_with = "headless")]
    once: bool,

    /// Refresh periodically without the terminal UI until Ctrl-C
    #[arg(long)]
    headless: bool,

    /// Map output path (overrides DUSTROUTE_MAP_OUTPUT)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let interactive = !cli.once && !cli.headless;
    let log_target = if interactive {
        LogTarget::File(config.log_file.clone())
    } else {
        LogTarget::Stderr
    };
    init_tracing(&config.log_level, log_target)?;

    let map_path = cli.output.unwrap_or_else(|| config.map_output.clone());

    // HTTP + service setup
    let client = Client::builder()
        .user_agent("dustroute/0.1")
        .timeout(config.request_timeout())
        .build()?;

    let mut plugins = vec![simulated::plugin(config.simulation_seed)];
    if let Some(url) = &config.telemetry_url {
        plugins.push(telemetry::plugin(client.clone(), url.clone()));
    }
    let registry = SourceRegistry::new(plugins);
    let source_id = config.source_id();
    let bins = registry.bin_port(&source_id).with_context(|| {
        let known: Vec<String> = registry
            .sources()
            .into_iter()
            .map(|meta| meta.id.0)
            .collect();
        format!(
            "Bin source '{source_id}' is not available (configured: {})",
            known.join(", ")
        )
    })?;

    let router = osrm::router(client, config.osrm_settings());
    let service = Arc::new(DustrouteService::new(
        bins,
        router,
        config.route_settings()?,
    ));
    info!(source = %service.source().name, map = %map_path.display(), "service ready");

    if cli.once {
        return run_once(&service, &map_path).await;
    }

    let (scheduler, receiver) = RefreshScheduler::new(Arc::clone(&service));

    if cli.headless {
        run_headless(scheduler, receiver, config.refresh_interval(), &map_path).await;
        return Ok(());
    }

    // App state
    let app = App::new(
        service.source().name.clone(),
        map_path,
        config.refresh_interval(),
    );

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app, scheduler, receiver);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_once(service: &DustrouteService, map_path: &Path) -> Result<()> {
    let report = service.refresh().await?;
    let written = MapDocument::from_report(&report)
        .write_to(map_path)
        .with_context(|| format!("Failed to write map to {}", map_path.display()))?;
    info!(path = %written.display(), all_clear = report.is_all_clear(), "map written");
    Ok(())
}

async fn run_headless(
    mut scheduler: RefreshScheduler,
    mut receiver: UnboundedReceiver<CycleOutcome>,
    period: StdDuration,
    map_path: &Path,
) {
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => warn!("Received shutdown signal"),
            Err(err) => {
                error!(%err, "Failed to listen for Ctrl-C");
                future::pending::<()>().await;
            }
        }
    };

    scheduler
        .run_periodic(&mut receiver, period, shutdown, |result| match result {
            Ok(report) => match MapDocument::from_report(&report).write_to(map_path) {
                Ok(path) => info!(path = %path.display(), "map written"),
                Err(err) => error!(%err, "map write failed"),
            },
            Err(err) => error!(%err, "refresh failed"),
        })
        .await;

    info!("Shutting down gracefully");
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut scheduler: RefreshScheduler,
    mut receiver: UnboundedReceiver<CycleOutcome>,
) -> Result<()> {
    // First tick fires immediately
    let mut next_tick = Instant::now();

    loop {
        while let Ok(outcome) = receiver.try_recv() {
            if let Some(result) = scheduler.accept(outcome) {
                app.apply(result);
            }
        }

        if Instant::now() >= next_tick {
            app.note_trigger(scheduler.trigger(Trigger::Periodic));
            next_tick = Instant::now() + app.refresh_interval;
        }
        app.is_loading = scheduler.is_in_flight();

        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            match input::handle_key_event(key, &mut app) {
                Action::Quit => break,
                Action::None => {}
                Action::Refresh => {
                    app.note_trigger(scheduler.trigger(Trigger::Manual));
                    next_tick = Instant::now() + app.refresh_interval;
                }
            }
        }
    }

    scheduler.cancel();
    Ok(())
}
