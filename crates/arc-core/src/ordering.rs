use crate::error::ArcError;
use crate::item::{Item, ItemId, Kind};
use crate::set::ItemSet;

/// The three independent rank spaces.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SiblingPool {
    Outcomes,
    Children(ItemId),
    Standalone,
}

impl SiblingPool {
    #[must_use]
    pub fn of(item: &Item) -> Self {
        match (item.kind(), item.parent()) {
            (Kind::Outcome, _) => Self::Outcomes,
            (Kind::Action, Some(parent)) => Self::Children(parent.clone()),
            (Kind::Action, None) => Self::Standalone,
        }
    }

    #[must_use]
    pub fn contains(&self, item: &Item) -> bool {
        &Self::of(item) == self
    }
}

impl ItemSet {
    fn pool_members(&self, pool: &SiblingPool) -> impl Iterator<Item = &Item> + '_ {
        let pool = pool.clone();
        self.iter().filter(move |item| pool.contains(item))
    }

    #[must_use]
    pub fn pool_size(&self, pool: &SiblingPool) -> usize {
        self.pool_members(pool).count()
    }

    /// Rank an item appended to `pool` receives.
    #[must_use]
    pub fn next_order(&self, pool: &SiblingPool) -> u32 {
        self.pool_members(pool)
            .map(|item| item.order)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    /// Shifts every sibling ranked after `order` in `pool` down by one.
    pub(crate) fn close_gap(&mut self, pool: &SiblingPool, order: u32, except: &ItemId) {
        for item in self.iter_mut() {
            if &item.id != except && pool.contains(item) && item.order > order {
                item.order -= 1;
            }
        }
    }

    /// Moves `id` to position `requested` in its pool, shifting the siblings
    /// in between so the pool stays dense. Positions past the end clamp to
    /// the last slot. Returns the position actually taken.
    ///
    /// # Errors
    /// Returns [`ArcError::Validation`] for a position below 1 and
    /// [`ArcError::NotFound`] for an unknown id.
    pub fn reorder(&mut self, id: &ItemId, requested: u32) -> Result<u32, ArcError> {
        if requested < 1 {
            return Err(ArcError::validation(format!(
                "Order must be a positive integer, got {requested}"
            )));
        }
        let item = self
            .get(id)
            .ok_or_else(|| ArcError::NotFound(id.to_string()))?;
        let pool = SiblingPool::of(item);
        let old = item.order;
        let size = u32::try_from(self.pool_size(&pool)).unwrap_or(u32::MAX);
        let target = requested.min(size.max(1));
        if target == old {
            return Ok(target);
        }

        for sibling in self.iter_mut() {
            if &sibling.id == id || !pool.contains(sibling) {
                continue;
            }
            if target < old && sibling.order >= target && sibling.order < old {
                sibling.order += 1;
            } else if target > old && sibling.order > old && sibling.order <= target {
                sibling.order -= 1;
            }
        }
        self.require_mut(id)?.order = target;
        Ok(target)
    }

    /// Moves an action to a new parent (or to standalone), closing the gap in
    /// the old pool and appending at the end of the new one.
    ///
    /// # Errors
    /// Returns [`ArcError::NotFound`] for an unknown id and
    /// [`ArcError::Invariant`] when `id` is an outcome.
    pub fn reparent(&mut self, id: &ItemId, parent: Option<ItemId>) -> Result<u32, ArcError> {
        let item = self
            .get(id)
            .ok_or_else(|| ArcError::NotFound(id.to_string()))?;
        if item.kind() == Kind::Outcome {
            return Err(ArcError::invariant(format!(
                "{id} is an outcome. Outcomes cannot have a parent"
            )));
        }
        if item.parent() == parent.as_ref() {
            return Ok(item.order);
        }
        let old_pool = SiblingPool::of(item);
        let old_order = item.order;
        let new_pool = parent
            .clone()
            .map_or(SiblingPool::Standalone, SiblingPool::Children);

        self.close_gap(&old_pool, old_order, id);
        let order = self.next_order(&new_pool);
        let item = self.require_mut(id)?;
        if let Some(state) = item.action_mut() {
            state.parent = parent;
        }
        item.order = order;
        Ok(order)
    }
}
