//! Error types shared by the proximity engine and its collaborators.

use thiserror::Error;

/// Malformed input to the geometry or proximity layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("radius {0} must be a finite, non-negative number of miles")]
    InvalidRadius(f64),

    #[error("an address candidate must be selected before the event can be submitted")]
    LocationNotSelected,

    #[error("{field} is required")]
    MissingField { field: &'static str },
}

/// The user's position could not be determined. Recovered locally by the
/// view model, which falls back to the unranked listing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("location unavailable: {reason}")]
pub struct LocationUnavailable {
    pub reason: String,
}

impl LocationUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A request to the event API or the address search provider failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl FetchError {
    /// True when the server rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Status { status: 401, .. })
    }
}
