use serde::Serialize;

use crate::item::{Item, Kind};
use crate::set::ItemSet;

pub const DEFAULT_LOG_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ListFilter {
    /// Open outcomes with all their actions, plus open standalone actions.
    #[default]
    Default,
    Ready,
    Waiting,
    All,
}

impl ListFilter {
    fn shows_outcome(self, outcome: &Item) -> bool {
        self == Self::All || outcome.is_open()
    }

    fn shows_child(self, action: &Item) -> bool {
        match self {
            Self::Default | Self::All => true,
            Self::Ready => action.is_done() || action.is_ready(),
            Self::Waiting => action.waiting_for().is_some(),
        }
    }

    fn shows_standalone(self, action: &Item) -> bool {
        match self {
            Self::Default => action.is_open(),
            Self::Ready => action.is_ready(),
            Self::Waiting => action.waiting_for().is_some(),
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeView<'a> {
    pub outcome: &'a Item,
    pub actions: Vec<&'a Item>,
    /// Open waiting actions left out by the ready filter.
    pub hidden_waiting: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListView<'a> {
    pub outcomes: Vec<OutcomeView<'a>>,
    pub standalone: Vec<&'a Item>,
}

impl<'a> ListView<'a> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty() && self.standalone.is_empty()
    }

    /// Every listed item, outcomes each followed by their actions.
    #[must_use]
    pub fn flatten(&self) -> Vec<&'a Item> {
        let mut items = Vec::new();
        for view in &self.outcomes {
            items.push(view.outcome);
            items.extend(view.actions.iter().copied());
        }
        items.extend(self.standalone.iter().copied());
        items
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct StatusSummary {
    pub open_outcomes: usize,
    pub done_outcomes: usize,
    pub open_actions: usize,
    pub ready_actions: usize,
    pub waiting_actions: usize,
    pub done_actions: usize,
    pub standalone_actions: usize,
    pub open_standalone: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityVerb {
    Created,
    Completed,
    Archived,
}

impl ActivityVerb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ActivityEvent {
    pub time: String,
    pub verb: ActivityVerb,
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: Kind,
}

impl ItemSet {
    #[must_use]
    pub fn list_view(&self, filter: ListFilter) -> ListView<'_> {
        let outcomes = self
            .outcomes()
            .into_iter()
            .filter(|outcome| filter.shows_outcome(outcome))
            .map(|outcome| {
                let children = self.children_of(&outcome.id);
                let hidden_waiting = if filter == ListFilter::Ready {
                    children
                        .iter()
                        .filter(|child| child.is_open() && child.waiting_for().is_some())
                        .count()
                } else {
                    0
                };
                OutcomeView {
                    outcome,
                    actions: children
                        .into_iter()
                        .filter(|child| filter.shows_child(child))
                        .collect(),
                    hidden_waiting,
                }
            })
            .collect();
        let standalone = self
            .standalone()
            .into_iter()
            .filter(|action| filter.shows_standalone(action))
            .collect();
        ListView {
            outcomes,
            standalone,
        }
    }

    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for item in self.iter() {
            match (item.kind(), item.is_open()) {
                (Kind::Outcome, true) => summary.open_outcomes += 1,
                (Kind::Outcome, false) => summary.done_outcomes += 1,
                (Kind::Action, true) => {
                    summary.open_actions += 1;
                    if item.waiting_for().is_some() {
                        summary.waiting_actions += 1;
                    } else {
                        summary.ready_actions += 1;
                    }
                }
                (Kind::Action, false) => summary.done_actions += 1,
            }
            if item.kind() == Kind::Action && item.parent().is_none() {
                summary.standalone_actions += 1;
                if item.is_open() {
                    summary.open_standalone += 1;
                }
            }
        }
        summary
    }
}

/// Newest-first feed of creation, completion and archival events across the
/// primary and archived records.
#[must_use]
pub fn activity_log(items: &ItemSet, archived: &[Item], limit: usize) -> Vec<ActivityEvent> {
    let mut events = Vec::new();
    for item in items.iter().chain(archived.iter()) {
        for (verb, time) in [
            (ActivityVerb::Created, &item.created_at),
            (ActivityVerb::Completed, &item.done_at),
            (ActivityVerb::Archived, &item.archived_at),
        ] {
            if let Some(time) = time {
                events.push(ActivityEvent {
                    time: time.clone(),
                    verb,
                    id: item.id.to_string(),
                    title: item.title.clone(),
                    kind: item.kind(),
                });
            }
        }
    }
    events.sort_by(|left, right| right.time.cmp(&left.time));
    events.truncate(limit);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Prefix, Status};
    use crate::testutil::{action, outcome};

    fn ids(items: &[&Item]) -> Vec<String> {
        items.iter().map(|item| item.id.to_string()).collect()
    }

    fn waiting(mut item: Item, reason: &str) -> Item {
        if let Some(state) = item.action_mut() {
            state.waiting_for = Some(reason.to_string());
        }
        item
    }

    fn done(mut item: Item, at: &str) -> Item {
        item.status = Status::Done;
        item.done_at = Some(at.to_string());
        item
    }

    fn fixture() -> ItemSet {
        ItemSet::from_items(
            Prefix::default(),
            [
                outcome("arc-o1", 1),
                done(outcome("arc-o2", 2), "2026-02-03T00:00:00Z"),
                done(action("arc-a1", Some("arc-o1"), 1), "2026-02-04T00:00:00Z"),
                action("arc-a2", Some("arc-o1"), 2),
                waiting(action("arc-a3", Some("arc-o1"), 3), "vendor"),
                action("arc-b1", Some("arc-o2"), 1),
                action("arc-s1", None, 1),
                waiting(action("arc-s2", None, 2), "arc-a2"),
                done(action("arc-s3", None, 3), "2026-02-05T00:00:00Z"),
            ],
        )
    }

    #[test]
    fn empty_store_lists_nothing() {
        let set = ItemSet::new(Prefix::default());
        assert!(set.list_view(ListFilter::Default).is_empty());
        assert!(set.list_view(ListFilter::All).flatten().is_empty());
    }

    #[test]
    fn default_view_shows_open_work() {
        let set = fixture();
        let view = set.list_view(ListFilter::Default);
        assert_eq!(view.outcomes.len(), 1);
        assert_eq!(ids(&view.outcomes[0].actions), vec!["arc-a1", "arc-a2", "arc-a3"]);
        assert_eq!(ids(&view.standalone), vec!["arc-s1", "arc-s2"]);
    }

    #[test]
    fn ready_view_hides_waiting_but_counts_them() {
        let set = fixture();
        let view = set.list_view(ListFilter::Ready);
        assert_eq!(ids(&view.outcomes[0].actions), vec!["arc-a1", "arc-a2"]);
        assert_eq!(view.outcomes[0].hidden_waiting, 1);
        assert_eq!(ids(&view.standalone), vec!["arc-s1"]);
    }

    #[test]
    fn waiting_and_all_views() {
        let set = fixture();
        let view = set.list_view(ListFilter::Waiting);
        assert_eq!(ids(&view.flatten()), vec!["arc-o1", "arc-a3", "arc-s2"]);

        let view = set.list_view(ListFilter::All);
        assert_eq!(view.flatten().len(), set.len());
    }

    #[test]
    fn status_counts_by_kind_and_state() {
        let summary = fixture().status_summary();
        assert_eq!(summary.open_outcomes, 1);
        assert_eq!(summary.done_outcomes, 1);
        assert_eq!(summary.open_actions, 5);
        assert_eq!(summary.ready_actions, 3);
        assert_eq!(summary.waiting_actions, 2);
        assert_eq!(summary.done_actions, 2);
        assert_eq!(summary.standalone_actions, 3);
        assert_eq!(summary.open_standalone, 2);
    }

    #[test]
    fn activity_is_newest_first_and_limited() {
        let set = fixture();
        let mut archived = done(action("arc-old", None, 1), "2026-02-06T00:00:00Z");
        archived.archived_at = Some("2026-02-06T08:00:00Z".to_string());

        let events = activity_log(&set, &[archived], 3);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].verb, ActivityVerb::Archived);
        assert_eq!(events[0].id, "arc-old");
        assert_eq!(events[1].verb, ActivityVerb::Completed);
        assert_eq!(events[1].id, "arc-old");
        assert_eq!(events[2].id, "arc-s3");
    }
}
