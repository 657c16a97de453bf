//! Reactive proximity state shared by the list and the map.
//!
//! [`ProximityViewModel`] owns the latest user position and event collection.
//! Every input change recomputes a new [`ProximitySnapshot`] and hands the
//! same `Arc` to every subscriber, so the two views can never disagree on
//! ordering or distances.
//!
//! Inputs that arrive asynchronously go through request tickets: a result is
//! applied only if no newer request or direct update for the same input has
//! happened since its ticket was issued.

use crate::error::{LocationUnavailable, ValidationError};
use crate::geo::Coordinate;
use crate::models::{AnnotatedEvent, EventId, EventRecord};
use crate::proximity::{compute, validate_radius, ProximityQuery};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the views render.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// User position known: radius-filtered, sorted by distance.
    Ranked {
        origin: Coordinate,
        radius_miles: f64,
        events: Vec<AnnotatedEvent>,
    },
    /// User position unknown: every event in source order, no distances.
    Unranked { events: Vec<EventRecord> },
}

/// One list row, uniform over both listing modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row<'a> {
    pub event: &'a EventRecord,
    pub distance_miles: Option<f64>,
}

/// Read-only output of one recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximitySnapshot {
    generation: u64,
    listing: Listing,
}

impl ProximitySnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            listing: Listing::Unranked { events: Vec::new() },
        }
    }

    /// Increments on every recomputation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn user(&self) -> Option<Coordinate> {
        match &self.listing {
            Listing::Ranked { origin, .. } => Some(*origin),
            Listing::Unranked { .. } => None,
        }
    }

    pub fn is_ranked(&self) -> bool {
        matches!(self.listing, Listing::Ranked { .. })
    }

    pub fn len(&self) -> usize {
        match &self.listing {
            Listing::Ranked { events, .. } => events.len(),
            Listing::Unranked { events } => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> Box<dyn Iterator<Item = Row<'_>> + '_> {
        match &self.listing {
            Listing::Ranked { events, .. } => Box::new(events.iter().map(|a| Row {
                event: &a.event,
                distance_miles: Some(a.distance_miles),
            })),
            Listing::Unranked { events } => Box::new(events.iter().map(|event| Row {
                event,
                distance_miles: None,
            })),
        }
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows().nth(index)
    }

    pub fn ids(&self) -> Vec<EventId> {
        self.rows().map(|r| r.event.id).collect()
    }

    pub fn position_of(&self, id: EventId) -> Option<usize> {
        self.rows().position(|r| r.event.id == id)
    }
}

/// Identifies one asynchronous request for an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&Arc<ProximitySnapshot>)>;

pub struct ProximityViewModel {
    radius_miles: f64,
    user: Option<Coordinate>,
    events: Vec<EventRecord>,
    snapshot: Arc<ProximitySnapshot>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    events_seq: u64,
    location_seq: u64,
}

impl ProximityViewModel {
    pub fn new(radius_miles: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            radius_miles: validate_radius(radius_miles)?,
            user: None,
            events: Vec::new(),
            snapshot: Arc::new(ProximitySnapshot::empty()),
            listeners: Vec::new(),
            next_subscription: 0,
            events_seq: 0,
            location_seq: 0,
        })
    }

    pub fn snapshot(&self) -> Arc<ProximitySnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn radius_miles(&self) -> f64 {
        self.radius_miles
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.user
    }

    /// Registers a listener called after every recomputation.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&Arc<ProximitySnapshot>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Replaces the user position. `None` means the location is unknown and
    /// switches the listing to the unranked fallback.
    pub fn set_user_location(&mut self, coordinate: Option<Coordinate>) {
        self.location_seq += 1;
        self.apply_location(coordinate);
    }

    /// Replaces the whole event collection.
    pub fn set_events(&mut self, events: Vec<EventRecord>) {
        self.events_seq += 1;
        self.apply_events(events);
    }

    pub fn set_radius(&mut self, radius_miles: f64) -> Result<(), ValidationError> {
        self.radius_miles = validate_radius(radius_miles)?;
        info!("Search radius set to {} mi", self.radius_miles);
        self.recompute();
        Ok(())
    }

    pub fn begin_events_request(&mut self) -> RequestTicket {
        self.events_seq += 1;
        RequestTicket(self.events_seq)
    }

    /// Applies fetched events if `ticket` is still the latest events request.
    /// Returns whether the result was applied.
    pub fn complete_events(&mut self, ticket: RequestTicket, events: Vec<EventRecord>) -> bool {
        if !self.is_latest_events_request(ticket) {
            debug!(
                "Discarding stale events result (ticket {}, latest {})",
                ticket.0, self.events_seq
            );
            return false;
        }
        self.apply_events(events);
        true
    }

    pub fn is_latest_events_request(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.events_seq
    }

    pub fn begin_location_request(&mut self) -> RequestTicket {
        self.location_seq += 1;
        RequestTicket(self.location_seq)
    }

    /// Applies a resolved user position if `ticket` is still the latest
    /// location request. A failed lookup falls back to the unranked listing.
    pub fn complete_location(
        &mut self,
        ticket: RequestTicket,
        result: Result<Coordinate, LocationUnavailable>,
    ) -> bool {
        if ticket.0 != self.location_seq {
            debug!(
                "Discarding stale location result (ticket {}, latest {})",
                ticket.0, self.location_seq
            );
            return false;
        }
        let coordinate = match result {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("{}. Showing all events without distance ordering.", e);
                None
            }
        };
        self.apply_location(coordinate);
        true
    }

    fn apply_location(&mut self, coordinate: Option<Coordinate>) {
        self.user = coordinate;
        self.recompute();
    }

    fn apply_events(&mut self, events: Vec<EventRecord>) {
        self.events = events;
        self.recompute();
    }

    fn recompute(&mut self) {
        let listing = match self.user {
            Some(origin) => {
                // The radius was validated when it was set.
                let events = match ProximityQuery::new(origin, self.radius_miles, self.events.clone()) {
                    Ok(query) => compute(&query),
                    Err(e) => {
                        warn!("Skipping proximity ranking: {}", e);
                        Vec::new()
                    }
                };
                Listing::Ranked {
                    origin,
                    radius_miles: self.radius_miles,
                    events,
                }
            }
            None => Listing::Unranked {
                events: self.events.clone(),
            },
        };

        let snapshot = Arc::new(ProximitySnapshot {
            generation: self.snapshot.generation + 1,
            listing,
        });
        debug!(
            "Recomputed snapshot {} ({} rows, ranked: {})",
            snapshot.generation,
            snapshot.len(),
            snapshot.is_ranked()
        );
        self.snapshot = Arc::clone(&snapshot);

        for (_, listener) in self.listeners.iter_mut() {
            listener(&snapshot);
        }
    }
}
