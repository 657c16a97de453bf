//! Event types and the main event loop driver.
//!
//! This module defines the [`Event`] enum (keyboard input, ticks, and the
//! results of the asynchronous fetch/location/search tasks) and the
//! [`EventHandler`], which runs a background task that polls crossterm for key
//! events and emits periodic [`Event::Tick`]s. Spawned tasks post their
//! results through [`EventHandler::tx`]; the main loop receives everything via
//! [`EventHandler::next`] and is the only place that touches the view model.

use crate::error::{FetchError, LocationUnavailable};
use crate::geo::Coordinate;
use crate::models::{AddressCandidate, EventRecord};
use crate::view_model::RequestTicket;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
pub enum Event {
    /// Periodic tick used for refresh scheduling.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// Result of an event collection fetch.
    EventsLoaded {
        ticket: RequestTicket,
        result: Result<Vec<EventRecord>, FetchError>,
    },
    /// Result of a user location lookup.
    LocationResolved {
        ticket: RequestTicket,
        result: Result<Coordinate, LocationUnavailable>,
    },
    /// Result of an address search typed by the user.
    SearchResults {
        query: String,
        result: Result<Vec<AddressCandidate>, FetchError>,
    },
}

/// Multiplexes terminal input, ticks and task results into a single stream.
///
/// The sender ([`tx`](EventHandler::tx)) can be cloned into spawned tasks,
/// while the receiver is consumed by [`next`](EventHandler::next) in the main
/// loop.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The spawned task polls crossterm with a timeout of `tick_rate_ms`. It
    /// stops, logging the cause, if the terminal can no longer be read; the
    /// main loop then sees [`next`](EventHandler::next) keep serving task
    /// results until every sender is gone.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            if event_tx.send(Event::Input(key)).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        break;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
