//! Nearby charity events, ranked by great-circle distance and shown as a
//! synchronized list and map.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod geo;
pub mod location;
pub mod logging;
pub mod map;
pub mod models;
pub mod proximity;
pub mod ui;
pub mod view_model;

pub use error::{FetchError, LocationUnavailable, ValidationError};
pub use geo::{distance, Coordinate};
pub use models::{AnnotatedEvent, EventRecord};
pub use proximity::{compute, ProximityQuery};
pub use view_model::{ProximitySnapshot, ProximityViewModel};
