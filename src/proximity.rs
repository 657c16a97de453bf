//! Distance annotation, radius cutoff and ordering of events around a user.

use crate::error::ValidationError;
use crate::geo::{distance, Coordinate};
use crate::models::{AnnotatedEvent, EventRecord};

pub const DEFAULT_RADIUS_MILES: f64 = 20.0;

/// Validates a radius in miles. Zero is allowed and keeps only events at the
/// user's exact position.
pub fn validate_radius(radius_miles: f64) -> Result<f64, ValidationError> {
    if radius_miles.is_finite() && radius_miles >= 0.0 {
        Ok(radius_miles)
    } else {
        Err(ValidationError::InvalidRadius(radius_miles))
    }
}

/// Everything a single proximity computation depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityQuery {
    user: Coordinate,
    radius_miles: f64,
    events: Vec<EventRecord>,
}

impl ProximityQuery {
    pub fn new(
        user: Coordinate,
        radius_miles: f64,
        events: Vec<EventRecord>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            user,
            radius_miles: validate_radius(radius_miles)?,
            events,
        })
    }

    pub fn with_default_radius(user: Coordinate, events: Vec<EventRecord>) -> Self {
        Self {
            user,
            radius_miles: DEFAULT_RADIUS_MILES,
            events,
        }
    }

    pub fn user(&self) -> Coordinate {
        self.user
    }

    pub fn radius_miles(&self) -> f64 {
        self.radius_miles
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }
}

/// Annotates, filters and sorts the query's events.
///
/// Unresolved events are dropped, then everything farther than the radius.
/// The result is ordered by distance with ties broken by ascending id.
pub fn compute(query: &ProximityQuery) -> Vec<AnnotatedEvent> {
    let mut ranked: Vec<AnnotatedEvent> = query
        .events
        .iter()
        .filter_map(|event| {
            let at = event.coordinate?;
            let distance_miles = distance(query.user, at);
            (distance_miles <= query.radius_miles).then(|| AnnotatedEvent {
                event: event.clone(),
                distance_miles,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_miles
            .total_cmp(&b.distance_miles)
            .then_with(|| a.event.id.cmp(&b.event.id))
    });
    ranked
}
