//! Domain types for SwingLab.

pub mod outcome;
pub mod setup;
pub mod snapshot;
pub mod status;

pub use outcome::Outcome;
pub use setup::{EventModifier, Rings, Setup, SignalQualityField, Validity};
pub use snapshot::{Snapshot, SnapshotItem};
pub use status::OutcomeStatus;

/// Returns the trimmed value if it is present and non-blank.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
