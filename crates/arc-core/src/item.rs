use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ArcError;
use crate::tactical::Tactical;

/// Rank given to legacy records that were written without an `order`.
pub const DEFAULT_ORDER: u32 = 999;

pub const DEFAULT_PREFIX: &str = "arc";

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ItemId(String);

impl ItemId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ItemId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Project id prefix, e.g. `arc` in `arc-gabdur`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Prefix(String);

impl Prefix {
    /// Validates a prefix token.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] when the prefix is empty or contains
    /// anything other than ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self, ArcError> {
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ArcError::validation(format!(
                "Prefix must be alphanumeric (no spaces or hyphens), got '{raw}'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Wraps a prefix read back from disk. Stored prefixes are not
    /// re-validated; they only ever feed id generation and lookup.
    #[must_use]
    pub fn from_stored(raw: &str) -> Self {
        Self(raw.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn qualify(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.0)
    }

    #[must_use]
    pub fn is_prefix_of(&self, id: &str) -> bool {
        id.strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self(DEFAULT_PREFIX.to_string())
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Done,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Discriminant of [`ItemKind`], used where only the variant matters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Outcome,
    Action,
}

impl Kind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outcome => "outcome",
            Self::Action => "action",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "outcome" => Some(Self::Outcome),
            "action" => Some(Self::Action),
            _ => None,
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The why/what/done handoff contract carried by every item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Brief {
    #[serde(default)]
    pub why: String,
    #[serde(default)]
    pub what: String,
    #[serde(default)]
    pub done: String,
}

impl Brief {
    /// Builds a brief, requiring all three fields to be non-blank.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] listing every missing field.
    pub fn new(why: &str, what: &str, done: &str) -> Result<Self, ArcError> {
        let brief = Self {
            why: why.trim().to_string(),
            what: what.trim().to_string(),
            done: done.trim().to_string(),
        };
        brief.validate()?;
        Ok(brief)
    }

    /// # Errors
    /// Returns [`ArcError::Validation`] when any subfield is blank.
    pub fn validate(&self) -> Result<(), ArcError> {
        let missing: Vec<&str> = [("why", &self.why), ("what", &self.what), ("done", &self.done)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ArcError::validation(format!(
                "Brief required. Missing: {}",
                missing
                    .iter()
                    .map(|name| format!("brief.{name}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }
}

/// Fields that only exist on actions.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ActionState {
    pub parent: Option<ItemId>,
    pub waiting_for: Option<String>,
    pub tactical: Option<Tactical>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ItemKind {
    Outcome,
    Action(ActionState),
}

impl ItemKind {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Outcome => Kind::Outcome,
            Self::Action(_) => Kind::Action,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub brief: Option<Brief>,
    pub status: Status,
    pub order: u32,
    pub created_at: Option<String>,
    pub created_by: Option<String>,
    pub done_at: Option<String>,
    pub archived_at: Option<String>,
    pub kind: ItemKind,
    /// Fields this version does not know about, kept verbatim.
    pub extra: Map<String, Value>,
}

impl Item {
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind.kind()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    #[must_use]
    pub fn action(&self) -> Option<&ActionState> {
        match &self.kind {
            ItemKind::Action(state) => Some(state),
            ItemKind::Outcome => None,
        }
    }

    pub fn action_mut(&mut self) -> Option<&mut ActionState> {
        match &mut self.kind {
            ItemKind::Action(state) => Some(state),
            ItemKind::Outcome => None,
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<&ItemId> {
        self.action().and_then(|state| state.parent.as_ref())
    }

    #[must_use]
    pub fn waiting_for(&self) -> Option<&str> {
        self.action().and_then(|state| state.waiting_for.as_deref())
    }

    #[must_use]
    pub fn tactical(&self) -> Option<&Tactical> {
        self.action().and_then(|state| state.tactical.as_ref())
    }

    /// Open and not blocked on anything.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.is_open() && self.waiting_for().is_none()
    }

    /// Full validation applied before any mutation is written back.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] when the title is blank, the brief
    /// is missing or incomplete, or the order is zero. Attribution fields
    /// are optional so older records stay editable.
    pub fn validate_strict(&self) -> Result<(), ArcError> {
        if self.title.trim().is_empty() {
            return Err(ArcError::validation(format!(
                "{}: title cannot be empty",
                self.id
            )));
        }
        let Some(brief) = &self.brief else {
            return Err(ArcError::validation(format!(
                "{}: missing required field: brief",
                self.id
            )));
        };
        brief
            .validate()
            .map_err(|err| ArcError::validation(format!("{}: {err}", self.id)))?;
        if self.order == 0 {
            return Err(ArcError::validation(format!(
                "{}: order must be positive, got 0",
                self.id
            )));
        }
        Ok(())
    }
}

/// Collapses all whitespace runs (including newlines) to single spaces.
///
/// # Errors
/// Returns [`ArcError::Validation`] when nothing is left after trimming.
pub fn normalize_title(raw: &str) -> Result<String, ArcError> {
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return Err(ArcError::validation("Title cannot be empty"));
    }
    Ok(title)
}
