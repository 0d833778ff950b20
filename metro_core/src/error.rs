//! Error types for layout loading and validation.

use crate::track::TrackId;
use thiserror::Error;

/// Problems found while turning a `MetroLayout` into live agents.
///
/// None of these are fatal: the orchestrator logs them, drops or empties the
/// offending entities and keeps simulating with the reduced topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A track, its points or a per-track table is absent
    #[error("Configuration missing for {track}: {what}")]
    ConfigurationMissing { track: TrackId, what: String },

    /// An index refers past the end of the list it points into
    #[error("Invalid {what} index {index} on {track}")]
    InvalidIndex {
        track: TrackId,
        what: String,
        index: usize,
    },

    /// A value outside its usable range, replaced by the nearest usable one
    #[error("Invalid {what} on {track}: {value}")]
    InvalidValue {
        track: TrackId,
        what: String,
        value: String,
    },

    /// A track key that is not one of the known lines
    #[error("Unknown track: {0}")]
    UnknownTrack(String),
}

impl LayoutError {
    /// Creates a missing-configuration error.
    pub fn missing(track: TrackId, what: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            track,
            what: what.into(),
        }
    }

    /// Creates an out-of-range value error.
    pub fn invalid_value(track: TrackId, what: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidValue {
            track,
            what: what.into(),
            value: value.to_string(),
        }
    }

    /// Creates an out-of-range index error.
    pub fn invalid_index(track: TrackId, what: impl Into<String>, index: usize) -> Self {
        Self::InvalidIndex {
            track,
            what: what.into(),
            index,
        }
    }
}
