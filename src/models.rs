use crate::error::ValidationError;
use crate::geo::Coordinate;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub type EventId = i64;

/// A charity event as owned by the event API. Read-only to the proximity core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    pub host: String,
    pub date: NaiveDate,
    pub location_label: String,
    /// `None` while the address has not been resolved to a position.
    pub coordinate: Option<Coordinate>,
    pub description: String,
    pub contact_info: Option<String>,
    pub owner_id: Option<i64>,
}

/// An [`EventRecord`] with its distance from the user. Rebuilt on every
/// recomputation, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedEvent {
    pub event: EventRecord,
    pub distance_miles: f64,
}

impl AnnotatedEvent {
    pub fn id(&self) -> EventId {
        self.event.id
    }
}

/// Wire shape of an event as served by `GET /events`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    pub id: EventId,
    pub name: String,
    pub host: String,
    pub date: NaiveDate,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub contact_info: Option<String>,
    pub user_id: Option<i64>,
}

// A record whose stored position is out of range keeps its place in the
// unfiltered listing but is treated as unresolved.
impl From<ApiEvent> for EventRecord {
    fn from(raw: ApiEvent) -> Self {
        let coordinate = match (raw.latitude, raw.longitude) {
            (Some(lat), Some(lng)) => match Coordinate::new(lat, lng) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("Event {} has an invalid position: {}", raw.id, e);
                    None
                }
            },
            (None, None) => None,
            _ => {
                warn!("Event {} has a partial position; treating as unresolved", raw.id);
                None
            }
        };

        Self {
            id: raw.id,
            name: raw.name,
            host: raw.host,
            date: raw.date,
            location_label: raw.location,
            coordinate,
            description: raw.description.unwrap_or_default(),
            contact_info: raw.contact_info,
            owner_id: raw.user_id,
        }
    }
}

/// One result from the address search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressCandidate {
    pub display_name: String,
    pub coordinate: Coordinate,
}

/// An event being created or edited by an organization.
///
/// The host is never part of the draft: the server fills it in from the
/// session's organization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub location_label: String,
    pub coordinate: Option<Coordinate>,
    pub description: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

impl EventDraft {
    /// Pre-fills a draft for editing an existing event.
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            name: record.name.clone(),
            date: Some(record.date),
            location_label: record.location_label.clone(),
            coordinate: record.coordinate,
            description: record.description.clone(),
            contact_info: record.contact_info.clone(),
        }
    }

    /// Adopts a search result as the event's location.
    pub fn select_location(&mut self, candidate: &AddressCandidate) {
        self.location_label = candidate.display_name.clone();
        self.coordinate = Some(candidate.coordinate);
    }

    /// Typing a new address invalidates any previously selected position.
    pub fn set_location_text(&mut self, text: impl Into<String>) {
        self.location_label = text.into();
        self.coordinate = None;
    }

    /// Checks the draft and produces the request body.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingField`] for an empty name, label or date, and
    /// [`ValidationError::LocationNotSelected`] when no candidate was chosen.
    pub fn to_payload(&self) -> Result<EventPayload, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        let date = self.date.ok_or(ValidationError::MissingField { field: "date" })?;
        if self.location_label.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "location" });
        }
        let coordinate = self.coordinate.ok_or(ValidationError::LocationNotSelected)?;

        let description = if self.description.trim().is_empty() {
            "No description provided.".to_string()
        } else {
            self.description.clone()
        };

        Ok(EventPayload {
            name: self.name.trim().to_string(),
            date,
            location: self.location_label.clone(),
            latitude: coordinate.lat(),
            longitude: coordinate.lng(),
            description,
            contact_info: self.contact_info.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}
