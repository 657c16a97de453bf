use charity_map::{
    api::{EventClient, EventSource},
    app::{App, Command},
    config::Config,
    events::{Event, EventHandler},
    location::{self, AddressSearch},
    logging, ui,
};
use color_eyre::Result;
use crossterm::{
    cursor::{Hide, Show},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc, time::{Duration, Instant}};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging(logging::LOG_DIR)?;
    install_panic_hook();
    color_eyre::install()?;

    let config = Config::load();
    let timeout = Duration::from_secs(config.api.timeout_seconds);
    let client = Arc::new(EventClient::new(config.api.base_url.clone(), timeout)?);
    let search = Arc::new(AddressSearch::new(config.api.search_url.clone(), timeout)?);
    info!("Using event API at {}", config.api.base_url);

    // Ready state, then the terminal
    let mut app = App::new(config)?;
    let mut terminal = setup_terminal()?;
    let mut event_handler = EventHandler::new(250);

    let startup = app.startup(Instant::now());
    for command in startup {
        dispatch(command, &app, &client, &search, &event_handler.tx);
    }

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        let Some(event) = event_handler.next().await else {
            break;
        };
        let command = match event {
            Event::Tick => app.on_tick(Instant::now()),
            Event::Input(key) => app.handle_key(key),
            Event::EventsLoaded { ticket, result } => {
                app.on_events_loaded(ticket, result);
                None
            }
            Event::LocationResolved { ticket, result } => {
                app.on_location_resolved(ticket, result);
                None
            }
            Event::SearchResults { query, result } => {
                app.on_search_results(query, result);
                None
            }
        };
        if let Some(command) = command {
            dispatch(command, &app, &client, &search, &event_handler.tx);
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Runs a command on a background task; its result comes back as an [`Event`].
fn dispatch(
    command: Command,
    app: &App,
    client: &Arc<EventClient>,
    search: &Arc<AddressSearch>,
    tx: &UnboundedSender<Event>,
) {
    let tx = tx.clone();
    match command {
        Command::FetchEvents(ticket) => {
            let client = Arc::clone(client);
            tokio::spawn(async move {
                let result = client.fetch_events().await;
                let _ = tx.send(Event::EventsLoaded { ticket, result });
            });
        }
        Command::ResolveLocation(ticket) => {
            let config = app.config.location.clone();
            tokio::spawn(async move {
                let result = location::current_location(&config).await;
                let _ = tx.send(Event::LocationResolved { ticket, result });
            });
        }
        Command::SearchAddress(query) => {
            let search = Arc::clone(search);
            tokio::spawn(async move {
                let result = search.search(&query).await;
                let _ = tx.send(Event::SearchResults { query, result });
            });
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    terminal.show_cursor()?;
    leave_terminal()?;
    Ok(())
}

fn leave_terminal() -> io::Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(io::stdout(), LeaveAlternateScreen, Show)
}

/// Restores the terminal before the panic report is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        leave_terminal().ok();
        original_hook(panic_info);
    }));
}
