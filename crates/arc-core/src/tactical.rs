use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{ArcError, TacticalConflict};
use crate::item::{Item, ItemId, Kind};
use crate::lifecycle::mark_done;
use crate::set::ItemSet;

const OUTCOME_HINT_LIMIT: usize = 5;

/// Identifies the working context that owns an active checklist.
///
/// Two tokens are the same owner exactly when their strings are equal.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

impl SessionToken {
    /// # Errors
    /// Returns [`ArcError::Validation`] for a blank token.
    pub fn new(value: impl Into<String>) -> Result<Self, ArcError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ArcError::validation("Session token cannot be empty"));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionToken {
    type Error = ArcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionToken> for String {
    fn from(value: SessionToken) -> Self {
        value.0
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checklist persisted on an action.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Tactical {
    pub steps: Vec<String>,
    #[serde(default)]
    pub current: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionToken>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tactical {
    #[must_use]
    pub fn new(steps: Vec<String>, session: SessionToken) -> Self {
        Self {
            steps,
            current: 0,
            session: Some(session),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current < self.steps.len()
    }

    /// Unscoped checklists from older records belong to whoever asks.
    #[must_use]
    pub fn claimable_by(&self, session: &SessionToken) -> bool {
        self.session.as_ref().map_or(true, |owner| owner == session)
    }

    #[must_use]
    pub fn owned_by(&self, session: &SessionToken) -> bool {
        self.session.as_ref() == Some(session)
    }

    #[must_use]
    pub fn current_step(&self) -> Option<&str> {
        self.steps.get(self.current).map(String::as_str)
    }
}

/// The text held no `1.` / `1)` style markers.
#[derive(Debug, Clone, Copy, thiserror::Error, Eq, PartialEq)]
#[error("no numbered steps found")]
pub struct NoStepsFound;

fn step_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    MARKER.get_or_init(|| Regex::new(r"\d+[.)]\s").expect("step marker pattern is valid"))
}

/// Splits free text into numbered steps.
///
/// Grammar: a marker is one or more digits followed by `.` or `)` and a
/// space, starting the text or preceded by whitespace (so `v2.0` is not a
/// marker). A step is the text after a marker up to the next marker or the
/// end. Whitespace, newlines included, is collapsed first; blank steps are
/// dropped.
///
/// # Errors
/// Returns [`NoStepsFound`] when no non-blank step can be extracted.
pub fn parse_steps(text: &str) -> Result<Vec<String>, NoStepsFound> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let markers: Vec<(usize, usize)> = step_marker()
        .find_iter(&normalized)
        .filter(|found| found.start() == 0 || normalized[..found.start()].ends_with(' '))
        .map(|found| (found.start(), found.end()))
        .collect();

    let mut steps = Vec::with_capacity(markers.len());
    for (index, (_, body_start)) in markers.iter().enumerate() {
        let body_end = markers
            .get(index + 1)
            .map_or(normalized.len(), |(next_start, _)| *next_start);
        let step = normalized[*body_start..body_end].trim();
        if !step.is_empty() {
            steps.push(step.to_string());
        }
    }

    if steps.is_empty() {
        Err(NoStepsFound)
    } else {
        Ok(steps)
    }
}

/// Where `work` takes its checklist from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StepSource {
    Explicit(Vec<String>),
    /// Parse the numbered list in the action's `brief.what`.
    FromBrief,
}

/// Result of advancing a checklist by one step.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StepReport {
    Advanced {
        id: ItemId,
        finished: String,
        next: String,
        current: usize,
        total: usize,
    },
    /// The final step was finished and the action is now done.
    Completed {
        id: ItemId,
        finished: String,
        total: usize,
        unblocked: Vec<ItemId>,
    },
}

/// Snapshot of the caller's active checklist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WorkStatus {
    pub id: ItemId,
    pub title: String,
    pub tactical: Tactical,
}

fn is_live_checklist(item: &Item) -> Option<&Tactical> {
    if !item.is_open() {
        return None;
    }
    item.tactical().filter(|tactical| tactical.is_active())
}

impl ItemSet {
    /// The open action whose checklist is active for `session`.
    ///
    /// A checklist tagged with this session wins over an unscoped one.
    #[must_use]
    pub fn active_tactical(&self, session: &SessionToken) -> Option<&Item> {
        let mut legacy = None;
        for item in self.iter() {
            let Some(tactical) = is_live_checklist(item) else {
                continue;
            };
            if tactical.owned_by(session) {
                return Some(item);
            }
            if legacy.is_none() && tactical.session.is_none() {
                legacy = Some(item);
            }
        }
        legacy
    }

    /// Starts (or restarts) a checklist on an action for `session`.
    ///
    /// # Errors
    /// Fails without touching the snapshot when the id does not resolve, the
    /// target is an outcome or already done, another session owns the
    /// action's checklist, this session already runs a different checklist,
    /// progress exists and `force` is false, or no steps are available.
    pub fn start_work(
        &mut self,
        raw_id: &str,
        source: StepSource,
        session: &SessionToken,
        force: bool,
    ) -> Result<Tactical, ArcError> {
        let item = self.require(raw_id)?;
        let id = item.id.clone();

        if item.kind() == Kind::Outcome {
            return Err(ArcError::NotAnAction {
                hint: self.outcome_hint(&id),
                id,
            });
        }
        if item.is_done() {
            return Err(ArcError::validation(format!("{id} is already complete")));
        }
        item.validate_strict()?;

        if let Some(existing) = item.tactical().filter(|tactical| tactical.is_active()) {
            if !existing.claimable_by(session) {
                if let Some(owner) = &existing.session {
                    return Err(TacticalConflict::OwnedByOtherSession {
                        item: id,
                        owner: owner.clone(),
                    }
                    .into());
                }
            }
        }

        if let Some(active) = self.active_tactical(session) {
            if active.id != id {
                return Err(TacticalConflict::SessionBusy {
                    active: active.id.clone(),
                    session: session.clone(),
                }
                .into());
            }
        }

        if let Some(existing) = item.tactical().filter(|tactical| tactical.is_active()) {
            if existing.current > 0 && !force {
                return Err(ArcError::StepsInProgress {
                    next_step: existing.current + 1,
                    id,
                });
            }
        }

        let steps = match source {
            StepSource::Explicit(steps) => {
                let steps: Vec<String> = steps
                    .into_iter()
                    .map(|step| step.trim().to_string())
                    .filter(|step| !step.is_empty())
                    .collect();
                if steps.is_empty() {
                    return Err(ArcError::validation(format!(
                        "No steps given for {id}. Provide steps explicitly"
                    )));
                }
                steps
            }
            StepSource::FromBrief => {
                let what = item.brief.as_ref().map_or("", |brief| brief.what.as_str());
                parse_steps(what).map_err(|_| {
                    ArcError::validation(format!(
                        "No numbered steps in {id} brief.what. Provide steps explicitly"
                    ))
                })?
            }
        };

        let tactical = Tactical::new(steps, session.clone());
        let item = self.require_mut(&id)?;
        if let Some(state) = item.action_mut() {
            state.tactical = Some(tactical.clone());
        }
        tracing::info!(item_id = %id, session = %session, steps = tactical.steps.len(), "started checklist");
        Ok(tactical)
    }

    /// Finishes the current step of the session's checklist.
    ///
    /// # Errors
    /// Returns [`ArcError::NoActiveTactical`] when the session has nothing
    /// in progress.
    pub fn advance_step(
        &mut self,
        session: &SessionToken,
        now: OffsetDateTime,
    ) -> Result<StepReport, ArcError> {
        let id = self
            .active_tactical(session)
            .map(|item| item.id.clone())
            .ok_or_else(|| ArcError::NoActiveTactical {
                session: session.clone(),
            })?;

        let item = self.require_mut(&id)?;
        let Some(tactical) = item.action_mut().and_then(|state| state.tactical.as_mut()) else {
            return Err(ArcError::NoActiveTactical {
                session: session.clone(),
            });
        };
        let finished = tactical.steps[tactical.current].clone();
        tactical.current += 1;
        let current = tactical.current;
        let total = tactical.steps.len();
        let next = tactical.current_step().map(str::to_string);
        tracing::info!(item_id = %id, session = %session, current, total, "advanced checklist");

        match next {
            Some(next) => Ok(StepReport::Advanced {
                id,
                finished,
                next,
                current,
                total,
            }),
            None => {
                let unblocked = mark_done(self, &id, now)?;
                Ok(StepReport::Completed {
                    id,
                    finished,
                    total,
                    unblocked,
                })
            }
        }
    }

    /// Drops the session's active checklist, leaving status untouched.
    /// Returns `None` when the session had nothing active.
    pub fn clear_work(&mut self, session: &SessionToken) -> Option<ItemId> {
        let id = self.active_tactical(session)?.id.clone();
        let item = self.get_mut(&id)?;
        if let Some(state) = item.action_mut() {
            state.tactical = None;
        }
        tracing::info!(item_id = %id, session = %session, "cleared checklist");
        Some(id)
    }

    #[must_use]
    pub fn work_status(&self, session: &SessionToken) -> Option<WorkStatus> {
        let item = self.active_tactical(session)?;
        let tactical = item.tactical()?.clone();
        Some(WorkStatus {
            id: item.id.clone(),
            title: item.title.clone(),
            tactical,
        })
    }

    fn outcome_hint(&self, outcome: &ItemId) -> String {
        let open: Vec<String> = self
            .children_of(outcome)
            .into_iter()
            .filter(|child| child.is_open())
            .take(OUTCOME_HINT_LIMIT)
            .map(|child| child.id.to_string())
            .collect();
        if open.is_empty() {
            String::new()
        } else {
            format!(". Open actions: {}", open.join(", "))
        }
    }
}
