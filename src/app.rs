use crate::config::Config;
use crate::error::{FetchError, LocationUnavailable};
use crate::geo::Coordinate;
use crate::map::{MapAdapter, Viewport};
use crate::models::{AddressCandidate, EventId, EventRecord};
use crate::view_model::{ProximitySnapshot, ProximityViewModel, RequestTicket, Row};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const STATUS_TTL: Duration = Duration::from_secs(6);
const RADIUS_STEP_MILES: f64 = 5.0;

// Which pane receives navigation keys
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum Focus {
    #[default]
    List,
    Map,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing an address to search for.
    Search { query: String },
    /// Choosing one of the returned candidates.
    Candidates,
}

#[derive(Debug, PartialEq, Clone)]
pub enum LocationState {
    Resolving,
    Known(Coordinate),
    Unavailable(String),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub at: Instant,
}

/// Work the main loop has to run off the UI task.
#[derive(Debug, PartialEq)]
pub enum Command {
    FetchEvents(RequestTicket),
    ResolveLocation(RequestTicket),
    SearchAddress(String),
}

/// List pane state. The selection is kept by event id so it follows the same
/// event when a recomputation reorders the rows.
pub struct ListView {
    snapshot: Arc<ProximitySnapshot>,
    selected: Option<EventId>,
}

impl ListView {
    fn new(snapshot: Arc<ProximitySnapshot>) -> Self {
        let selected = snapshot.row(0).map(|r| r.event.id);
        Self { snapshot, selected }
    }

    pub fn snapshot(&self) -> &Arc<ProximitySnapshot> {
        &self.snapshot
    }

    pub fn selected_id(&self) -> Option<EventId> {
        self.selected
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected.and_then(|id| self.snapshot.position_of(id))
    }

    pub fn selected_row(&self) -> Option<Row<'_>> {
        self.selected_index().and_then(|i| self.snapshot.row(i))
    }

    fn refresh(&mut self, snapshot: &Arc<ProximitySnapshot>) {
        let previous_index = self.selected_index().unwrap_or(0);
        self.snapshot = Arc::clone(snapshot);
        let still_listed = self
            .selected
            .is_some_and(|id| self.snapshot.position_of(id).is_some());
        if !still_listed {
            let len = self.snapshot.len();
            self.selected = if len == 0 {
                None
            } else {
                self.snapshot
                    .row(previous_index.min(len - 1))
                    .map(|r| r.event.id)
            };
        }
    }

    fn select_offset(&mut self, forward: bool) {
        let len = self.snapshot.len();
        if len == 0 {
            return;
        }
        let next = match self.selected_index() {
            Some(i) if forward => (i + 1) % len,
            Some(i) => i.checked_sub(1).unwrap_or(len - 1),
            None => 0,
        };
        self.selected = self.snapshot.row(next).map(|r| r.event.id);
    }
}

pub struct App {
    pub config: Config,
    pub focus: Focus,
    pub input_mode: InputMode,
    pub view_model: ProximityViewModel,
    pub list: Rc<RefCell<ListView>>,
    pub map: Rc<RefCell<MapAdapter>>,
    pub location: LocationState,
    pub candidates: Vec<AddressCandidate>,
    pub candidate_index: usize,
    pub status: Option<StatusMessage>,
    pub should_quit: bool,

    // Fetch telemetry
    pub last_update: Option<Instant>,
    pub last_update_success: bool,
    last_fetch_started: Option<Instant>,
    fetch_in_flight: Option<RequestTicket>,
}

impl App {
    pub fn new(config: Config) -> color_eyre::Result<Self> {
        let mut view_model = ProximityViewModel::new(config.location.radius_miles)?;

        let initial_center = Coordinate::new(config.location.manual_lat, config.location.manual_lng)
            .unwrap_or_else(|e| {
                warn!("Manual location is invalid ({}); centering map on 0,0", e);
                Coordinate::NULL_ISLAND
            });
        let map = Rc::new(RefCell::new(MapAdapter::new(Viewport {
            center: initial_center,
            zoom: config.map.default_zoom.min(crate::map::MAX_ZOOM),
        })));
        let list = Rc::new(RefCell::new(ListView::new(view_model.snapshot())));

        let list_sink = Rc::clone(&list);
        view_model.subscribe(move |snapshot| list_sink.borrow_mut().refresh(snapshot));
        let map_sink = Rc::clone(&map);
        view_model.subscribe(move |snapshot| {
            map_sink.borrow_mut().reconcile(snapshot);
        });

        Ok(Self {
            config,
            focus: Focus::List,
            input_mode: InputMode::Normal,
            view_model,
            list,
            map,
            location: LocationState::Resolving,
            candidates: Vec::new(),
            candidate_index: 0,
            status: None,
            should_quit: false,
            last_update: None,
            last_update_success: false,
            last_fetch_started: None,
            fetch_in_flight: None,
        })
    }

    /// Commands to run once at startup.
    pub fn startup(&mut self, now: Instant) -> Vec<Command> {
        vec![self.refresh_events(now), self.resolve_location()]
    }

    fn refresh_events(&mut self, now: Instant) -> Command {
        let ticket = self.view_model.begin_events_request();
        self.last_fetch_started = Some(now);
        self.fetch_in_flight = Some(ticket);
        Command::FetchEvents(ticket)
    }

    /// True while the latest fetch has not reported back.
    fn fetch_pending(&self) -> bool {
        self.fetch_in_flight
            .is_some_and(|t| self.view_model.is_latest_events_request(t))
    }

    fn resolve_location(&mut self) -> Command {
        self.location = LocationState::Resolving;
        Command::ResolveLocation(self.view_model.begin_location_request())
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            at: Instant::now(),
        });
    }

    pub fn on_tick(&mut self, now: Instant) -> Option<Command> {
        if self
            .status
            .as_ref()
            .is_some_and(|s| now.duration_since(s.at) >= STATUS_TTL)
        {
            self.status = None;
        }

        // Scheduled refreshes never supersede a running fetch; `r` still can.
        if self.fetch_pending() {
            return None;
        }
        let interval = Duration::from_secs(self.config.api.poll_interval_seconds.max(1));
        let due = self
            .last_fetch_started
            .map_or(true, |started| now.duration_since(started) >= interval);
        due.then(|| self.refresh_events(now))
    }

    pub fn on_events_loaded(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<EventRecord>, FetchError>,
    ) {
        if self.fetch_in_flight == Some(ticket) {
            self.fetch_in_flight = None;
        }
        match result {
            Ok(events) => {
                let count = events.len();
                if self.view_model.complete_events(ticket, events) {
                    info!("Loaded {} events", count);
                    self.last_update = Some(Instant::now());
                    self.last_update_success = true;
                }
            }
            Err(e) => {
                if self.view_model.is_latest_events_request(ticket) {
                    warn!("Event fetch failed: {}", e);
                    self.last_update_success = false;
                    self.set_status(format!("Could not load events: {e}. Press r to retry."), StatusLevel::Error);
                }
            }
        }
    }

    pub fn on_location_resolved(
        &mut self,
        ticket: RequestTicket,
        result: Result<Coordinate, LocationUnavailable>,
    ) {
        let state = match &result {
            Ok(at) => LocationState::Known(*at),
            Err(e) => LocationState::Unavailable(e.reason.clone()),
        };
        if self.view_model.complete_location(ticket, result) {
            if let LocationState::Unavailable(reason) = &state {
                self.set_status(
                    format!("Location unavailable ({reason}); showing all events unsorted"),
                    StatusLevel::Error,
                );
            }
            self.location = state;
        }
    }

    pub fn on_search_results(
        &mut self,
        query: String,
        result: Result<Vec<AddressCandidate>, FetchError>,
    ) {
        match result {
            Ok(candidates) if candidates.is_empty() => {
                self.input_mode = InputMode::Normal;
                self.set_status(format!("No matches for '{query}'"), StatusLevel::Info);
            }
            Ok(candidates) => {
                self.candidates = candidates;
                self.candidate_index = 0;
                self.input_mode = InputMode::Candidates;
            }
            Err(e) => {
                self.input_mode = InputMode::Normal;
                self.set_status(format!("Address search failed: {e}"), StatusLevel::Error);
            }
        }
    }

    pub fn selected_event(&self) -> Option<EventRecord> {
        self.list.borrow().selected_row().map(|r| r.event.clone())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }

        match std::mem::take(&mut self.input_mode) {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Search { query } => self.handle_search_key(key, query),
            InputMode::Candidates => {
                self.handle_candidate_key(key);
                None
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => match self.focus {
                Focus::List => self.list.borrow_mut().select_offset(true),
                Focus::Map => self.map.borrow_mut().zoom_out(),
            },
            KeyCode::Up | KeyCode::Char('k') => match self.focus {
                Focus::List => self.list.borrow_mut().select_offset(false),
                Focus::Map => self.map.borrow_mut().zoom_in(),
            },
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::List => Focus::Map,
                    Focus::Map => Focus::List,
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.map.borrow_mut().zoom_in(),
            KeyCode::Char('-') => self.map.borrow_mut().zoom_out(),
            KeyCode::Char(']') => self.adjust_radius(RADIUS_STEP_MILES),
            KeyCode::Char('[') => self.adjust_radius(-RADIUS_STEP_MILES),
            KeyCode::Char('r') => return Some(self.refresh_events(Instant::now())),
            KeyCode::Char('l') => return Some(self.resolve_location()),
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search {
                    query: String::new(),
                }
            }
            _ => {}
        }
        None
    }

    fn handle_search_key(&mut self, key: KeyEvent, mut query: String) -> Option<Command> {
        match key.code {
            KeyCode::Esc => None,
            KeyCode::Enter if !query.trim().is_empty() => {
                self.set_status(format!("Searching for '{}'...", query.trim()), StatusLevel::Info);
                Some(Command::SearchAddress(query.trim().to_string()))
            }
            KeyCode::Backspace => {
                query.pop();
                self.input_mode = InputMode::Search { query };
                None
            }
            KeyCode::Char(c) => {
                query.push(c);
                self.input_mode = InputMode::Search { query };
                None
            }
            _ => {
                self.input_mode = InputMode::Search { query };
                None
            }
        }
    }

    fn handle_candidate_key(&mut self, key: KeyEvent) {
        let len = self.candidates.len();
        match key.code {
            KeyCode::Esc => self.candidates.clear(),
            KeyCode::Down | KeyCode::Char('j') if len > 0 => {
                self.candidate_index = (self.candidate_index + 1) % len;
                self.input_mode = InputMode::Candidates;
            }
            KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                self.candidate_index = self.candidate_index.checked_sub(1).unwrap_or(len - 1);
                self.input_mode = InputMode::Candidates;
            }
            KeyCode::Enter => {
                if let Some(chosen) = self.candidates.get(self.candidate_index).cloned() {
                    info!("Using '{}' as the user location", chosen.display_name);
                    self.view_model.set_user_location(Some(chosen.coordinate));
                    self.location = LocationState::Known(chosen.coordinate);
                    self.set_status(format!("Location set to {}", chosen.display_name), StatusLevel::Info);
                }
                self.candidates.clear();
            }
            _ => self.input_mode = InputMode::Candidates,
        }
    }

    fn adjust_radius(&mut self, delta: f64) {
        let next = (self.view_model.radius_miles() + delta).max(0.0);
        if let Err(e) = self.view_model.set_radius(next) {
            self.set_status(e.to_string(), StatusLevel::Error);
        }
    }
}
