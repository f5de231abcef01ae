use crate::error::ArcError;
use crate::item::{ActionState, ItemId, ItemKind, Kind};
use crate::ordering::SiblingPool;
use crate::set::ItemSet;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Conversion {
    pub id: ItemId,
    pub to: Kind,
    /// Children of a converted outcome, now standalone.
    pub orphaned: Vec<ItemId>,
}

impl ItemSet {
    /// Flips an item between outcome and action, keeping its identity.
    ///
    /// Outcome to action needs `parent` (an outcome other than itself) and,
    /// when it still has children, `force`; those children become
    /// standalone. Action to outcome takes no parent and drops the
    /// action-only fields.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] for a missing or extra parent or a
    /// missing `force`, and [`ArcError::Invariant`] for an invalid parent.
    pub fn convert(
        &mut self,
        raw_id: &str,
        parent: Option<&str>,
        force: bool,
    ) -> Result<Conversion, ArcError> {
        let item = self.require(raw_id)?;
        let id = item.id.clone();
        match item.kind() {
            Kind::Outcome => self.outcome_to_action(id, parent, force),
            Kind::Action => {
                if parent.is_some() {
                    return Err(ArcError::validation(format!(
                        "{id} is an action; converting to an outcome takes no parent"
                    )));
                }
                self.action_to_outcome(id)
            }
        }
    }

    fn outcome_to_action(
        &mut self,
        id: ItemId,
        parent: Option<&str>,
        force: bool,
    ) -> Result<Conversion, ArcError> {
        let Some(raw_parent) = parent else {
            return Err(ArcError::validation(format!(
                "Converting outcome {id} to an action requires a parent outcome"
            )));
        };
        let target = self.require(raw_parent)?;
        if target.id == id {
            return Err(ArcError::invariant(format!(
                "{id} cannot become a child of itself"
            )));
        }
        if target.kind() != Kind::Outcome {
            return Err(ArcError::invariant(format!(
                "Parent {} is an action. Actions can only belong to outcomes",
                target.id
            )));
        }
        let target = target.id.clone();

        let children: Vec<ItemId> = self
            .children_of(&id)
            .into_iter()
            .map(|child| child.id.clone())
            .collect();
        if !children.is_empty() && !force {
            return Err(ArcError::validation(format!(
                "{id} has {} children. Use force to convert; they will become standalone actions",
                children.len()
            )));
        }

        for child in &children {
            self.reparent(child, None)?;
        }

        let old_order = self.require(id.as_str())?.order;
        self.close_gap(&SiblingPool::Outcomes, old_order, &id);
        let order = self.next_order(&SiblingPool::Children(target.clone()));
        let item = self.require_mut(&id)?;
        item.kind = ItemKind::Action(ActionState {
            parent: Some(target),
            ..ActionState::default()
        });
        item.order = order;
        tracing::info!(item_id = %id, orphaned = children.len(), "converted outcome to action");
        Ok(Conversion {
            id,
            to: Kind::Action,
            orphaned: children,
        })
    }

    fn action_to_outcome(&mut self, id: ItemId) -> Result<Conversion, ArcError> {
        let item = self.require(id.as_str())?;
        let old_pool = SiblingPool::of(item);
        let old_order = item.order;

        self.close_gap(&old_pool, old_order, &id);
        let order = self.next_order(&SiblingPool::Outcomes);
        let item = self.require_mut(&id)?;
        item.kind = ItemKind::Outcome;
        item.order = order;
        tracing::info!(item_id = %id, "converted action to outcome");
        Ok(Conversion {
            id,
            to: Kind::Outcome,
            orphaned: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, Prefix};
    use crate::testutil::{action, must_err, must_ok, must_some, outcome};
    use proptest::prelude::*;

    fn fixture() -> ItemSet {
        ItemSet::from_items(
            Prefix::default(),
            [
                outcome("arc-o1", 1),
                outcome("arc-o2", 2),
                outcome("arc-o3", 3),
                action("arc-c1", Some("arc-o1"), 1),
                action("arc-c2", Some("arc-o1"), 2),
                action("arc-s1", None, 1),
                action("arc-k1", Some("arc-o2"), 1),
            ],
        )
    }

    #[test]
    fn action_becomes_outcome_at_end_of_pool() {
        let mut set = fixture();
        if let Some(state) = set.get_mut(&ItemId::new("arc-c1")).and_then(Item::action_mut) {
            state.waiting_for = Some("vendor".to_string());
        }
        let conversion = must_ok(set.convert("c1", None, false));
        assert_eq!(conversion.to, Kind::Outcome);

        let item = must_some(set.find("arc-c1"));
        assert_eq!(item.kind(), Kind::Outcome);
        assert_eq!(item.order, 4);
        assert!(item.action().is_none());
        assert_eq!(must_some(set.find("arc-c2")).order, 1);
    }

    #[test]
    fn outcome_with_children_needs_force() {
        let mut set = fixture();
        let err = must_err(set.convert("arc-o1", Some("arc-o2"), false));
        assert!(err.to_string().contains("has 2 children"));

        let conversion = must_ok(set.convert("arc-o1", Some("arc-o2"), true));
        assert_eq!(
            conversion.orphaned,
            vec![ItemId::new("arc-c1"), ItemId::new("arc-c2")]
        );
        assert_eq!(must_some(set.find("arc-c1")).order, 2);
        assert_eq!(must_some(set.find("arc-c2")).order, 3);
        assert!(must_some(set.find("arc-c1")).parent().is_none());

        let item = must_some(set.find("arc-o1"));
        assert_eq!(item.parent(), Some(&ItemId::new("arc-o2")));
        assert_eq!(item.order, 2);
        assert_eq!(must_some(set.find("arc-o2")).order, 1);
        assert_eq!(must_some(set.find("arc-o3")).order, 2);
    }

    #[test]
    fn outcome_to_action_validates_parent() {
        let mut set = fixture();
        assert!(matches!(set.convert("arc-o3", None, false), Err(ArcError::Validation(_))));
        assert!(matches!(set.convert("arc-o3", Some("o3"), false), Err(ArcError::Invariant(_))));
        assert!(matches!(set.convert("arc-o3", Some("s1"), false), Err(ArcError::Invariant(_))));
        assert!(matches!(set.convert("arc-o3", Some("zz"), false), Err(ArcError::NotFound(_))));
        assert!(matches!(set.convert("arc-s1", Some("o1"), false), Err(ArcError::Validation(_))));
    }

    proptest! {
        #[test]
        fn conversion_keeps_identity(pick in 0usize..7, parent_pick in 0usize..3) {
            let mut set = fixture();
            let ids: Vec<ItemId> = set.iter().map(|item| item.id.clone()).collect();
            let id = ids[pick % ids.len()].clone();
            let before = must_some(set.get(&id)).clone();
            let parents = ["arc-o1", "arc-o2", "arc-o3"];
            let parent = (before.kind() == Kind::Outcome).then_some(parents[parent_pick]);

            if set.convert(id.as_str(), parent, true).is_ok() {
                let after = must_some(set.get(&id));
                prop_assert_ne!(after.kind(), before.kind());
                prop_assert_eq!(&after.id, &before.id);
                prop_assert_eq!(&after.title, &before.title);
                prop_assert_eq!(&after.brief, &before.brief);
                prop_assert_eq!(after.status, before.status);
                prop_assert_eq!(&after.created_at, &before.created_at);
                prop_assert_eq!(&after.created_by, &before.created_by);
            }
        }
    }
}
