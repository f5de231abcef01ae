use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::error::ArcError;
use crate::format_rfc3339;
use crate::item::{Item, ItemId, Kind, Status};
use crate::ordering::SiblingPool;
use crate::set::ItemSet;

/// Which done items to move out of the primary store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ArchiveSelection {
    AllDone,
    Ids(Vec<String>),
}

impl ItemSet {
    /// Removes the selected done items (outcomes together with their done
    /// children), stamps `archived_at`, and closes the gaps they leave.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] for an open item and
    /// [`ArcError::Invariant`] for an outcome with open children.
    pub fn take_for_archive(
        &mut self,
        selection: &ArchiveSelection,
        now: OffsetDateTime,
    ) -> Result<Vec<Item>, ArcError> {
        let mut chosen: BTreeSet<ItemId> = BTreeSet::new();
        match selection {
            ArchiveSelection::AllDone => {
                for item in self.iter().filter(|item| item.is_done()) {
                    let open_children = self.open_children(&item.id);
                    if item.kind() == Kind::Outcome && !open_children.is_empty() {
                        continue;
                    }
                    chosen.insert(item.id.clone());
                }
            }
            ArchiveSelection::Ids(raw_ids) => {
                for raw in raw_ids {
                    let item = self.require(raw)?;
                    if !item.is_done() {
                        return Err(ArcError::validation(format!(
                            "{} is not done. Only done items can be archived",
                            item.id
                        )));
                    }
                    if item.kind() == Kind::Outcome {
                        let open_children = self.open_children(&item.id);
                        if !open_children.is_empty() {
                            return Err(ArcError::invariant(format!(
                                "{} has open actions: {}",
                                item.id,
                                open_children.join(", ")
                            )));
                        }
                    }
                    chosen.insert(item.id.clone());
                }
            }
        }

        let cascaded: Vec<ItemId> = chosen
            .iter()
            .flat_map(|id| self.children_of(id))
            .map(|child| child.id.clone())
            .collect();
        chosen.extend(cascaded);

        let archived_at = format_rfc3339(now)?;
        let mut removed = Vec::with_capacity(chosen.len());
        for id in &chosen {
            let Some(item) = self.get(id) else {
                continue;
            };
            let pool = SiblingPool::of(item);
            let order = item.order;
            self.close_gap(&pool, order, id);
            if let Some(mut item) = self.remove(id) {
                item.archived_at = Some(archived_at.clone());
                removed.push(item);
            }
        }
        tracing::debug!(count = removed.len(), "selected items for archive");
        Ok(removed)
    }

    /// Brings an archived item back as open, at the end of its pool. An
    /// action whose outcome is gone becomes standalone.
    pub fn restore_from_archive(&mut self, mut item: Item) -> ItemId {
        item.status = Status::Open;
        item.done_at = None;
        item.archived_at = None;
        let orphaned = item.parent().is_some_and(|parent| !self.contains(parent));
        if orphaned {
            if let Some(state) = item.action_mut() {
                state.parent = None;
            }
        }
        item.order = self.next_order(&SiblingPool::of(&item));
        let id = item.id.clone();
        self.insert(item);
        id
    }

    fn open_children(&self, outcome: &ItemId) -> Vec<String> {
        self.children_of(outcome)
            .into_iter()
            .filter(|child| child.is_open())
            .map(|child| child.id.to_string())
            .collect()
    }
}
