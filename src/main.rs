use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use atlas::ai::{spawn_completion, Completer, GenaiCompleter};
use atlas::app::App;
use atlas::cli::Cli;
use atlas::config::{self, Config};
use atlas::event::{Event, EventHandler};
use atlas::handler::handle_key_events;
use atlas::logging::init_logging;
use atlas::storage::ConversationStore;
use atlas::tui::Tui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = match cli.log_file.clone() {
        Some(path) => path,
        None => config::default_log_path()?,
    };
    init_logging(&log_path, &cli.log_level).context("Failed to set up logging")?;

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    if config::ensure_config_exists(&config_path)? {
        eprintln!(
            "Created an example config at {}; add your providers there.",
            config_path.display()
        );
    }
    let config = Config::load(&config_path).context("Failed to load config")?;
    let history_dir = match cli.history_dir.clone() {
        Some(path) => path,
        None => config::default_history_dir()?,
    };

    // Create an application.
    let mut app = App::new(config, ConversationStore::new(history_dir))
        .context("Failed to start session")?;
    let completer: Arc<dyn Completer> = Arc::new(GenaiCompleter);
    let timeout = Duration::from_secs(cli.timeout);

    // Initialize the terminal user interface.
    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    let events = EventHandler::new(250);
    let mut tui = Tui::new(terminal, events);
    tui.init().context("Failed to initialize terminal")?;
    tracing::info!("session started");

    // Start the main loop.
    while app.running {
        // Render the user interface.
        tui.draw(&mut app)
            .context("Failed to render user interface")?;
        // Handle events.
        match tui
            .events
            .next()
            .await
            .context("Unable to get next event")?
        {
            Event::Tick => app.tick(),
            Event::Key(key_event) => handle_key_events(key_event, &mut app),
            Event::Completion(outcome) => app.apply_completion(outcome),
            Event::Mouse(_) | Event::Resize(_, _) => {}
        }

        // Spawn the request queued by a submit, if any.
        if let Some(job) = app.take_queued_job() {
            spawn_completion(completer.clone(), job, timeout, tui.events.sender());
        }
    }

    app.save_current();

    // Exit the user interface.
    tui.exit().context("Failed during application shutdown")?;
    tracing::info!("session ended");
    Ok(())
}
