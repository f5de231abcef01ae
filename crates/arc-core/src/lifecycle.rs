use std::collections::HashSet;

use rand::Rng;
use serde_json::Map;
use time::OffsetDateTime;

use crate::error::ArcError;
use crate::format_rfc3339;
use crate::ids::generate_unique_id;
use crate::item::{normalize_title, ActionState, Brief, Item, ItemId, ItemKind, Kind, Status};
use crate::ordering::SiblingPool;
use crate::set::ItemSet;

/// Leading words that describe activity rather than an end state.
const ACTIVITY_VERBS: &[&str] = &[
    "add",
    "build",
    "configure",
    "create",
    "decide",
    "deploy",
    "document",
    "fix",
    "implement",
    "improve",
    "investigate",
    "migrate",
    "refactor",
    "remove",
    "replace",
    "set up",
    "update",
    "upgrade",
    "write",
];

/// What `new` should create.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NewKind {
    Outcome,
    /// An action under the given outcome, or standalone when `None`.
    Action { parent: Option<String> },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NewItem {
    pub title: String,
    pub brief: Brief,
    pub kind: NewKind,
}

/// Who is acting and when.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Stamp {
    pub actor: String,
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Completion {
    Completed { id: ItemId, unblocked: Vec<ItemId> },
    /// Completing a done item is a successful no-op.
    AlreadyDone { id: ItemId },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParentChange {
    Attach(String),
    Detach,
}

/// Any subset of editable fields; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ItemEdit {
    pub title: Option<String>,
    pub why: Option<String>,
    pub what: Option<String>,
    pub done: Option<String>,
    pub parent: Option<ParentChange>,
    pub order: Option<u32>,
}

impl ItemEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.why.is_none()
            && self.what.is_none()
            && self.done.is_none()
            && self.parent.is_none()
            && self.order.is_none()
    }
}

/// Outcome of a `wait` call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WaitRecord {
    pub id: ItemId,
    pub waiting_for: String,
    /// The reason looks like an id but names no known item.
    pub dangling: bool,
}

/// `true` for titles such as "Fix login" that describe work instead of a
/// finished state.
#[must_use]
pub fn is_activity_title(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    ACTIVITY_VERBS.iter().any(|verb| {
        lower
            .strip_prefix(verb)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
    })
}

/// A single `word-word` token, the shape of a generated id.
fn looks_like_id(value: &str) -> bool {
    match value.split_once('-') {
        Some((head, tail)) => {
            !head.is_empty()
                && !tail.is_empty()
                && head.chars().all(|c| c.is_ascii_alphanumeric())
                && tail.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Marks `id` done and clears `waiting_for` on every item waiting on exactly
/// this id. Shared by `done` and by finishing the last checklist step.
pub(crate) fn mark_done(
    set: &mut ItemSet,
    id: &ItemId,
    now: OffsetDateTime,
) -> Result<Vec<ItemId>, ArcError> {
    let done_at = format_rfc3339(now)?;
    let item = set.require_mut(id)?;
    item.status = Status::Done;
    item.done_at = Some(done_at);

    let mut unblocked = Vec::new();
    for other in set.iter_mut() {
        if let Some(state) = other.action_mut() {
            if state.waiting_for.as_deref() == Some(id.as_str()) {
                state.waiting_for = None;
                unblocked.push(other.id.clone());
            }
        }
    }
    tracing::info!(item_id = %id, unblocked = unblocked.len(), "completed item");
    Ok(unblocked)
}

impl ItemSet {
    fn outcome_parent(&self, raw: &str) -> Result<ItemId, ArcError> {
        let parent = self.require(raw)?;
        if parent.kind() != Kind::Outcome {
            return Err(ArcError::invariant(format!(
                "Parent {} is an action. Actions can only belong to outcomes",
                parent.id
            )));
        }
        Ok(parent.id.clone())
    }

    /// Creates an item, assigning a fresh id and the next rank in its pool.
    ///
    /// `reserved` holds ids that are taken outside this snapshot (archived
    /// items).
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] for a blank title or brief field,
    /// [`ArcError::NotFound`] or [`ArcError::Invariant`] for a bad parent,
    /// and [`ArcError::IdSpaceExhausted`] when no free id is found.
    pub fn create<R: Rng + ?Sized>(
        &mut self,
        new: NewItem,
        stamp: &Stamp,
        reserved: &HashSet<String>,
        rng: &mut R,
    ) -> Result<ItemId, ArcError> {
        let title = normalize_title(&new.title)?;
        let brief = Brief::new(&new.brief.why, &new.brief.what, &new.brief.done)?;

        let (kind, pool) = match new.kind {
            NewKind::Outcome => {
                if is_activity_title(&title) {
                    tracing::warn!(
                        title = %title,
                        "outcome title describes an activity; consider describing the achieved state"
                    );
                }
                (ItemKind::Outcome, SiblingPool::Outcomes)
            }
            NewKind::Action { parent: Some(raw) } => {
                let parent = self.outcome_parent(&raw)?;
                (
                    ItemKind::Action(ActionState {
                        parent: Some(parent.clone()),
                        ..ActionState::default()
                    }),
                    SiblingPool::Children(parent),
                )
            }
            NewKind::Action { parent: None } => (
                ItemKind::Action(ActionState::default()),
                SiblingPool::Standalone,
            ),
        };

        let mut taken: HashSet<String> = self.iter().map(|item| item.id.to_string()).collect();
        taken.extend(reserved.iter().cloned());
        let id = ItemId::new(generate_unique_id(self.prefix(), &taken, rng)?);

        let item = Item {
            id: id.clone(),
            title,
            brief: Some(brief),
            status: Status::Open,
            order: self.next_order(&pool),
            created_at: Some(format_rfc3339(stamp.at)?),
            created_by: Some(stamp.actor.clone()),
            done_at: None,
            archived_at: None,
            kind,
            extra: Map::new(),
        };
        item.validate_strict()?;
        self.insert(item);
        tracing::info!(item_id = %id, "created item");
        Ok(id)
    }

    /// Completes an item. An action's checklist is dropped.
    ///
    /// # Errors
    /// Returns [`ArcError::NotFound`] when the id does not resolve.
    pub fn complete(&mut self, raw_id: &str, now: OffsetDateTime) -> Result<Completion, ArcError> {
        let item = self.require(raw_id)?;
        let id = item.id.clone();
        if item.is_done() {
            return Ok(Completion::AlreadyDone { id });
        }
        let unblocked = mark_done(self, &id, now)?;
        if let Some(state) = self.require_mut(&id)?.action_mut() {
            state.tactical = None;
        }
        Ok(Completion::Completed { id, unblocked })
    }

    /// Blocks an action on another item or on free text, dropping any
    /// checklist in flight.
    ///
    /// # Errors
    /// Returns [`ArcError::Invariant`] for an outcome and
    /// [`ArcError::Validation`] for a blank reason or a self-wait.
    pub fn wait(&mut self, raw_id: &str, reason: &str) -> Result<WaitRecord, ArcError> {
        let item = self.require(raw_id)?;
        let id = item.id.clone();
        if item.kind() == Kind::Outcome {
            return Err(ArcError::invariant(format!(
                "{id} is an outcome. Only actions can wait"
            )));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ArcError::validation("Wait reason cannot be empty"));
        }

        let (waiting_for, dangling) = match self.find(reason) {
            Some(target) if target.id == id => {
                return Err(ArcError::validation(format!("{id} cannot wait for itself")));
            }
            Some(target) => (target.id.to_string(), false),
            None => (reason.to_string(), looks_like_id(reason)),
        };
        if dangling {
            tracing::warn!(
                item_id = %id,
                waiting_for = %waiting_for,
                "wait target looks like an id but no such item exists; it will not auto-clear"
            );
        }

        if let Some(state) = self.require_mut(&id)?.action_mut() {
            state.waiting_for = Some(waiting_for.clone());
            state.tactical = None;
        }
        Ok(WaitRecord {
            id,
            waiting_for,
            dangling,
        })
    }

    /// Clears `waiting_for`. A no-op on outcomes and unblocked actions.
    ///
    /// # Errors
    /// Returns [`ArcError::NotFound`] when the id does not resolve.
    pub fn unwait(&mut self, raw_id: &str) -> Result<ItemId, ArcError> {
        let id = self.resolve(raw_id)?;
        if let Some(state) = self.require_mut(&id)?.action_mut() {
            state.waiting_for = None;
        }
        Ok(id)
    }

    /// Returns a done item to open.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] when the item is not done.
    pub fn reopen(&mut self, raw_id: &str) -> Result<ItemId, ArcError> {
        let id = self.resolve(raw_id)?;
        let item = self.require_mut(&id)?;
        if item.is_open() {
            return Err(ArcError::validation(format!("{id} is not done")));
        }
        item.status = Status::Open;
        item.done_at = None;
        Ok(id)
    }

    /// Applies an edit. The edited record is validated in full before any
    /// change lands in the snapshot.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] for an empty edit, blank values or an
    /// invalid order, and [`ArcError::Invariant`] when giving an outcome a
    /// parent or pointing at a parent that is not an outcome.
    pub fn edit(&mut self, raw_id: &str, edit: ItemEdit) -> Result<ItemId, ArcError> {
        if edit.is_empty() {
            return Err(ArcError::validation(
                "Nothing to edit. Pass at least one field to change",
            ));
        }
        let mut draft = self.require(raw_id)?.clone();
        let id = draft.id.clone();

        if let Some(title) = &edit.title {
            draft.title = normalize_title(title)?;
        }
        let brief = draft.brief.get_or_insert_with(Brief::default);
        for (name, value, slot) in [
            ("why", &edit.why, &mut brief.why),
            ("what", &edit.what, &mut brief.what),
            ("done", &edit.done, &mut brief.done),
        ] {
            if let Some(value) = value {
                let value = value.trim();
                if value.is_empty() {
                    return Err(ArcError::validation(format!(
                        "{id}: brief.{name} cannot be empty"
                    )));
                }
                *slot = value.to_string();
            }
        }
        if matches!(edit.order, Some(0)) {
            return Err(ArcError::validation("Order must be a positive integer, got 0"));
        }

        let new_parent = match &edit.parent {
            None => None,
            Some(_) if draft.kind() == Kind::Outcome => {
                return Err(ArcError::invariant(format!(
                    "{id} is an outcome. Outcomes cannot have a parent"
                )));
            }
            Some(ParentChange::Detach) => Some(None),
            Some(ParentChange::Attach(raw)) => Some(Some(self.outcome_parent(raw)?)),
        };
        draft.validate_strict()?;

        self.insert(draft);
        if let Some(parent) = new_parent {
            self.reparent(&id, parent)?;
        }
        if let Some(order) = edit.order {
            self.reorder(&id, order)?;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Prefix;
    use crate::testutil::{action, brief, fixed_now, must_err, must_ok, must_some, outcome};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stamp() -> Stamp {
        Stamp {
            actor: "tester".to_string(),
            at: fixed_now(),
        }
    }

    fn new_item(title: &str, kind: NewKind) -> NewItem {
        NewItem {
            title: title.to_string(),
            brief: brief(),
            kind,
        }
    }

    fn create(set: &mut ItemSet, title: &str, kind: NewKind, seed: u64) -> ItemId {
        let mut rng = StdRng::seed_from_u64(seed);
        must_ok(set.create(new_item(title, kind), &stamp(), &HashSet::new(), &mut rng))
    }

    fn set_waiting(set: &mut ItemSet, id: &str, reason: &str) {
        if let Some(state) = set.get_mut(&ItemId::new(id)).and_then(Item::action_mut) {
            state.waiting_for = Some(reason.to_string());
        }
    }

    #[test]
    fn first_outcome_and_child_start_at_order_one() {
        let mut set = ItemSet::new(Prefix::default());
        let outcome_id = create(&mut set, "Users can log in", NewKind::Outcome, 1);
        let action_id = create(
            &mut set,
            "Wire the form",
            NewKind::Action {
                parent: Some(outcome_id.to_string()),
            },
            2,
        );

        let outcome = must_some(set.get(&outcome_id));
        let action = must_some(set.get(&action_id));
        assert_eq!(outcome.order, 1);
        assert_eq!(action.order, 1);
        assert_eq!(action.parent(), Some(&outcome_id));
        assert_eq!(action.created_at.as_deref(), Some("2026-02-07T12:00:00Z"));
        assert_eq!(action.created_by.as_deref(), Some("tester"));
    }

    #[test]
    fn create_normalizes_title_and_requires_brief() {
        let mut set = ItemSet::new(Prefix::default());
        let id = create(&mut set, "Users\n  can   log in", NewKind::Outcome, 1);
        assert_eq!(must_some(set.get(&id)).title, "Users can log in");

        let mut rng = StdRng::seed_from_u64(1);
        let mut incomplete = new_item("Anything", NewKind::Outcome);
        incomplete.brief.done = "  ".to_string();
        let err = must_err(set.create(incomplete, &stamp(), &HashSet::new(), &mut rng));
        assert_eq!(err.to_string(), "Brief required. Missing: brief.done");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn create_under_action_or_unknown_parent_fails() {
        let mut set = ItemSet::from_items(Prefix::default(), [action("arc-act", None, 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        let err = must_err(set.create(
            new_item("x", NewKind::Action { parent: Some("act".to_string()) }),
            &stamp(),
            &HashSet::new(),
            &mut rng,
        ));
        assert!(matches!(err, ArcError::Invariant(_)));
        let err = must_err(set.create(
            new_item("x", NewKind::Action { parent: Some("nope".to_string()) }),
            &stamp(),
            &HashSet::new(),
            &mut rng,
        ));
        assert_eq!(err.to_string(), "Item 'nope' not found");
    }

    #[test]
    fn create_avoids_reserved_ids() {
        let mut set = ItemSet::new(Prefix::default());
        let mut probe = StdRng::seed_from_u64(9);
        let archived = crate::ids::generate_id(set.prefix(), &mut probe);
        let reserved: HashSet<String> = [archived.clone()].into_iter().collect();

        let mut rng = StdRng::seed_from_u64(9);
        let id = must_ok(set.create(new_item("Ship", NewKind::Outcome), &stamp(), &reserved, &mut rng));
        assert_ne!(id.as_str(), archived);
    }

    #[test]
    fn activity_titles_are_detected() {
        assert!(is_activity_title("Fix the login page"));
        assert!(is_activity_title("Set up CI"));
        assert!(is_activity_title("deploy"));
        assert!(!is_activity_title("Fixtures are reproducible"));
        assert!(!is_activity_title("Users can log in"));
    }

    #[test]
    fn completing_unblocks_exact_waiters_only() {
        let mut set = ItemSet::from_items(
            Prefix::default(),
            [
                action("arc-one", None, 1),
                action("arc-two", None, 2),
                action("arc-three", None, 3),
            ],
        );
        set_waiting(&mut set, "arc-one", "arc-two");
        set_waiting(&mut set, "arc-three", "external review of arc-two");

        let completion = must_ok(set.complete("two", fixed_now()));
        assert_eq!(
            completion,
            Completion::Completed {
                id: ItemId::new("arc-two"),
                unblocked: vec![ItemId::new("arc-one")],
            }
        );
        assert!(must_some(set.find("arc-one")).waiting_for().is_none());
        assert_eq!(
            must_some(set.find("arc-three")).waiting_for(),
            Some("external review of arc-two")
        );
        let done = must_some(set.find("arc-two"));
        assert_eq!(done.done_at.as_deref(), Some("2026-02-07T12:00:00Z"));
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let mut set = ItemSet::from_items(Prefix::default(), [action("arc-one", None, 1)]);
        must_ok(set.complete("arc-one", fixed_now()));
        let before = must_some(set.find("arc-one")).clone();
        let again = must_ok(set.complete("arc-one", fixed_now()));
        assert_eq!(again, Completion::AlreadyDone { id: ItemId::new("arc-one") });
        assert_eq!(must_some(set.find("arc-one")), &before);
    }

    #[test]
    fn wait_stores_canonical_id_and_clears_checklist() {
        let mut set = ItemSet::from_items(
            Prefix::default(),
            [action("arc-one", None, 1), action("arc-two", None, 2)],
        );
        if let Some(state) = set.get_mut(&ItemId::new("arc-one")).and_then(Item::action_mut) {
            state.tactical = Some(crate::tactical::Tactical::new(
                vec!["x".to_string()],
                must_ok(crate::tactical::SessionToken::new("s1")),
            ));
        }
        let record = must_ok(set.wait("one", "two"));
        assert_eq!(record.waiting_for, "arc-two");
        assert!(!record.dangling);
        let item = must_some(set.find("arc-one"));
        assert_eq!(item.waiting_for(), Some("arc-two"));
        assert!(item.tactical().is_none());

        must_ok(set.complete("arc-two", fixed_now()));
        assert!(must_some(set.find("arc-one")).waiting_for().is_none());
    }

    #[test]
    fn wait_flags_dangling_ids_and_keeps_free_text() {
        let mut set = ItemSet::from_items(Prefix::default(), [action("arc-one", None, 1)]);
        assert!(must_ok(set.wait("arc-one", "arc-ghost")).dangling);
        let record = must_ok(set.wait("arc-one", "legal sign-off from Dana"));
        assert!(!record.dangling);
        assert_eq!(record.waiting_for, "legal sign-off from Dana");
    }

    #[test]
    fn wait_rejects_outcomes_self_and_blank() {
        let mut set = ItemSet::from_items(
            Prefix::default(),
            [outcome("arc-out", 1), action("arc-one", None, 1)],
        );
        assert!(matches!(set.wait("arc-out", "x"), Err(ArcError::Invariant(_))));
        assert!(matches!(set.wait("arc-one", "one"), Err(ArcError::Validation(_))));
        assert!(matches!(set.wait("arc-one", "  "), Err(ArcError::Validation(_))));
    }

    #[test]
    fn unwait_is_unconditional() {
        let mut set = ItemSet::from_items(
            Prefix::default(),
            [outcome("arc-out", 1), action("arc-one", None, 1)],
        );
        set_waiting(&mut set, "arc-one", "vendor");
        must_ok(set.unwait("arc-one"));
        assert!(must_some(set.find("arc-one")).waiting_for().is_none());
        must_ok(set.unwait("arc-one"));
        must_ok(set.unwait("arc-out"));
    }

    #[test]
    fn reopen_clears_done_state() {
        let mut set = ItemSet::from_items(Prefix::default(), [action("arc-one", None, 1)]);
        assert!(set.reopen("arc-one").is_err());
        must_ok(set.complete("arc-one", fixed_now()));
        must_ok(set.reopen("arc-one"));
        let item = must_some(set.find("arc-one"));
        assert_eq!(item.status, Status::Open);
        assert!(item.done_at.is_none());
    }

    #[test]
    fn edit_changes_fields_and_reparents() {
        let mut set = ItemSet::from_items(
            Prefix::default(),
            [
                outcome("arc-out", 1),
                outcome("arc-other", 2),
                action("arc-a1", Some("arc-out"), 1),
                action("arc-a2", Some("arc-out"), 2),
                action("arc-b1", Some("arc-other"), 1),
                action("arc-b2", Some("arc-other"), 2),
            ],
        );
        must_ok(set.edit(
            "a1",
            ItemEdit {
                title: Some("Renamed".to_string()),
                why: Some("New reason".to_string()),
                parent: Some(ParentChange::Attach("other".to_string())),
                order: Some(1),
                ..ItemEdit::default()
            },
        ));
        let item = must_some(set.find("arc-a1"));
        assert_eq!(item.title, "Renamed");
        assert_eq!(must_some(item.brief.as_ref()).why, "New reason");
        assert_eq!(item.parent(), Some(&ItemId::new("arc-other")));
        assert_eq!(item.order, 1);
        assert_eq!(must_some(set.find("arc-b1")).order, 2);
        assert_eq!(must_some(set.find("arc-b2")).order, 3);
        assert_eq!(must_some(set.find("arc-a2")).order, 1);
    }

    #[test]
    fn edit_rejects_bad_input_without_mutation() {
        let mut set = ItemSet::from_items(
            Prefix::default(),
            [outcome("arc-out", 1), action("arc-one", None, 1)],
        );
        let before = set.clone();
        assert!(set.edit("arc-one", ItemEdit::default()).is_err());
        assert!(set
            .edit(
                "arc-one",
                ItemEdit {
                    title: Some("ok".to_string()),
                    what: Some(" ".to_string()),
                    ..ItemEdit::default()
                }
            )
            .is_err());
        assert!(matches!(
            set.edit(
                "arc-out",
                ItemEdit {
                    parent: Some(ParentChange::Detach),
                    ..ItemEdit::default()
                }
            ),
            Err(ArcError::Invariant(_))
        ));
        assert!(matches!(
            set.edit(
                "arc-one",
                ItemEdit {
                    parent: Some(ParentChange::Attach("arc-one".to_string())),
                    ..ItemEdit::default()
                }
            ),
            Err(ArcError::Invariant(_))
        ));
        assert_eq!(set, before);
    }

    #[test]
    fn edit_rejects_legacy_partial_brief_until_filled() {
        let mut legacy = action("arc-old", None, 1);
        legacy.brief = None;
        let mut set = ItemSet::from_items(Prefix::default(), [legacy]);
        assert!(set
            .edit("arc-old", ItemEdit { why: Some("w".to_string()), ..ItemEdit::default() })
            .is_err());
        must_ok(set.edit(
            "arc-old",
            ItemEdit {
                why: Some("w".to_string()),
                what: Some("x".to_string()),
                done: Some("d".to_string()),
                ..ItemEdit::default()
            },
        ));
    }

    #[test]
    fn records_without_attribution_stay_editable_and_workable() {
        let mut legacy = action("arc-old", None, 1);
        legacy.created_at = None;
        legacy.created_by = None;
        let mut set = ItemSet::from_items(Prefix::default(), [legacy]);

        let edit = ItemEdit {
            title: Some("Renamed".to_string()),
            ..ItemEdit::default()
        };
        must_ok(set.edit("arc-old", edit));
        assert_eq!(must_some(set.find("arc-old")).title, "Renamed");

        let session = must_ok(crate::tactical::SessionToken::new("s1"));
        let steps = vec!["x".to_string(), "y".to_string()];
        must_ok(set.start_work(
            "arc-old",
            crate::tactical::StepSource::Explicit(steps),
            &session,
            false,
        ));
        let item = must_some(set.find("arc-old"));
        assert_eq!(must_some(item.tactical()).steps.len(), 2);
        assert!(item.created_at.is_none());
    }

    proptest! {
        #[test]
        fn free_text_waits_never_auto_clear(suffix in "[a-z ]{0,12}") {
            let mut set = ItemSet::from_items(
                Prefix::default(),
                [action("arc-one", None, 1), action("arc-two", None, 2), action("arc-three", None, 3)],
            );
            let free_text = format!("arc-two {suffix}x");
            set_waiting(&mut set, "arc-one", "arc-two");
            set_waiting(&mut set, "arc-three", &free_text);

            prop_assert!(set.complete("arc-two", fixed_now()).is_ok());
            prop_assert!(must_some(set.find("arc-one")).waiting_for().is_none());
            prop_assert_eq!(must_some(set.find("arc-three")).waiting_for(), Some(free_text.as_str()));
        }
    }
}
