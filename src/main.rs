//! uacnet - network orchestration console for a site access controller
//!
//! Binds physical ports to network profiles, renders netplan and CoovaChilli
//! artifacts for them, and keeps the WireGuard and SoftEther peer configs in
//! sync with the peer store.

mod app;
mod config;
mod controller;
mod error;
mod form;
mod logging;
mod model;
mod peers;
mod ports;
mod profiles;
mod store;
mod synth;
mod system;
mod ui;

use std::io;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use app::App;
use config::Settings;
use controller::Controller;
use ui::{
    activity::ActivityPanel,
    header::{render_header, render_key_hints, render_separator, render_tabs},
    overlays::{render_overlay, render_pending},
    tables::render_view,
};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();
    let log_path = logging::init(&settings.log_file());

    // Writing under /etc needs root; dry runs and test roots do not.
    if !is_root() && !settings.dry_run_apply {
        eprintln!("Warning: not running as root; writes under /etc will likely fail.");
        tracing::warn!("started without root privileges");
    }
    tracing::info!(
        state_dir = %settings.state_dir.display(),
        host_root = %settings.host_fs_root.display(),
        "starting uacnet"
    );

    // Set up panic hook to restore terminal on panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let controller = Arc::new(Controller::new(settings));

    // Run the app
    let result = run_app(App::new(controller, log_path)).await;

    // Restore terminal on exit
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    result
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

async fn run_app(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    app.refresh();

    // Main loop using tokio for non-blocking event polling
    let mut interval = tokio::time::interval(Duration::from_millis(50));

    loop {
        // Poll for async operation results
        app.poll_async_results();

        // Draw UI
        terminal.draw(|frame| {
            let size = frame.area();

            // Calculate log panel height based on expansion state
            let log_height = if app.logs_expanded { 12 } else { 4 };

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1),          // Header
                    Constraint::Length(1),          // Tabs
                    Constraint::Length(1),          // Separator
                    Constraint::Min(10),            // Active view
                    Constraint::Length(log_height), // Logs (collapsed/expanded)
                    Constraint::Length(1),          // Help
                ])
                .split(size);

            render_header(frame, chunks[0], &app);
            render_tabs(frame, chunks[1], &app);
            render_separator(frame, chunks[2]);

            render_view(frame, chunks[3], &app);
            render_overlay(frame, chunks[3], &app);

            if let Some(pending_op) = &app.pending_op {
                render_pending(frame, chunks[3], pending_op.display(), app.pending_elapsed());
            }

            frame.render_widget(ActivityPanel::new(&app.logs, app.logs_expanded), chunks[4]);
            render_key_hints(frame, chunks[5], app.help_text());
        })?;

        // Handle events with non-blocking poll
        interval.tick().await;
        if event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    // Global quit on Ctrl+C
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(event::KeyModifiers::CONTROL)
                    {
                        break;
                    }

                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit && app.pending_op.is_none() {
            break;
        }
    }

    tracing::info!("exiting");
    Ok(())
}
