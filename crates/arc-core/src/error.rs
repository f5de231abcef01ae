use crate::item::ItemId;
use crate::tactical::SessionToken;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ArcError {
    #[error("Item '{0}' not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Invariant(String),
    #[error(transparent)]
    TacticalConflict(#[from] TacticalConflict),
    #[error("{id} is an outcome. Tactical steps are for actions{hint}")]
    NotAnAction { id: ItemId, hint: String },
    #[error("Steps in progress on {id} (step {next_step}). Use force to restart")]
    StepsInProgress { id: ItemId, next_step: usize },
    #[error("No steps in progress for session {session}. Start a checklist with `work <id>` first")]
    NoActiveTactical { session: SessionToken },
    #[error("Failed to generate unique id after {attempts} attempts")]
    IdSpaceExhausted { attempts: u32 },
}

/// Ownership violations on a tactical checklist.
#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TacticalConflict {
    /// The target action's active checklist belongs to a different session.
    #[error("{item} has active steps from another session ({owner})")]
    OwnedByOtherSession { item: ItemId, owner: SessionToken },
    /// The caller's session already runs a checklist on another action.
    #[error("{active} has active steps in session {session}. Complete it, wait it, or clear it first")]
    SessionBusy {
        active: ItemId,
        session: SessionToken,
    },
}

impl ArcError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}
