//! Domain core for `arc`: a hierarchy of outcomes and actions kept in a
//! line-per-record store.
//!
//! Every operation works on an [`ItemSet`] snapshot loaded by the caller and
//! leaves file I/O, the clock, the acting identity, the session token and the
//! random source to the caller as well.

use time::{OffsetDateTime, UtcOffset};

mod archive;
mod convert;
mod error;
mod ids;
mod item;
mod lifecycle;
mod ordering;
mod queries;
mod record;
mod set;
mod tactical;

#[cfg(test)]
mod testutil;

pub use archive::ArchiveSelection;
pub use convert::Conversion;
pub use error::{ArcError, TacticalConflict};
pub use ids::{generate_id, generate_suffix, generate_unique_id, MAX_ID_ATTEMPTS};
pub use item::{
    normalize_title, ActionState, Brief, Item, ItemId, ItemKind, Kind, Prefix, Status,
    DEFAULT_ORDER, DEFAULT_PREFIX,
};
pub use lifecycle::{
    is_activity_title, Completion, ItemEdit, NewItem, NewKind, ParentChange, Stamp, WaitRecord,
};
pub use ordering::SiblingPool;
pub use queries::{
    activity_log, ActivityEvent, ActivityVerb, ListFilter, ListView, OutcomeView, StatusSummary,
    DEFAULT_LOG_LIMIT,
};
pub use set::ItemSet;
pub use tactical::{
    parse_steps, NoStepsFound, SessionToken, StepReport, StepSource, Tactical, WorkStatus,
};

/// Parses an RFC 3339 timestamp and requires it to be in UTC.
///
/// # Errors
/// Returns [`ArcError::Validation`] for malformed input or a non-UTC offset.
pub fn parse_rfc3339_utc(value: &str) -> Result<OffsetDateTime, ArcError> {
    let parsed = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|err| ArcError::Validation(format!("invalid RFC3339 timestamp: {err}")))?;

    if parsed.offset() != UtcOffset::UTC {
        return Err(ArcError::Validation(
            "timestamp must use UTC offset Z".to_string(),
        ));
    }

    Ok(parsed)
}

/// Formats a timestamp as RFC 3339 UTC, e.g. `2026-02-07T12:00:00Z`.
///
/// # Errors
/// Returns [`ArcError::Validation`] if the value cannot be formatted.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, ArcError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| ArcError::Validation(format!("failed to format RFC3339 timestamp: {err}")))
}

/// Current UTC time truncated to whole seconds.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc().to_offset(UtcOffset::UTC);
    now.replace_nanosecond(0).unwrap_or(now)
}
