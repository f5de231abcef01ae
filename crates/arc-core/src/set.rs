use std::collections::BTreeMap;

use crate::error::ArcError;
use crate::item::{Item, ItemId, Kind, Prefix};

/// In-memory snapshot of the primary store.
///
/// Items are keyed by id, so iteration is always in id order and a later
/// insert of an existing id replaces the earlier record. Both properties
/// are what keep the on-disk file merge-friendly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSet {
    prefix: Prefix,
    items: BTreeMap<ItemId, Item>,
}

impl ItemSet {
    #[must_use]
    pub fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            items: BTreeMap::new(),
        }
    }

    /// Builds a snapshot from records in file order; the last occurrence of
    /// a duplicated id wins.
    #[must_use]
    pub fn from_items(prefix: Prefix, items: impl IntoIterator<Item = Item>) -> Self {
        let mut set = Self::new(prefix);
        for item in items {
            set.insert(item);
        }
        set
    }

    #[must_use]
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.values_mut()
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    /// Returns the replaced record, if any.
    pub fn insert(&mut self, item: Item) -> Option<Item> {
        self.items.insert(item.id.clone(), item)
    }

    pub(crate) fn remove(&mut self, id: &ItemId) -> Option<Item> {
        self.items.remove(id)
    }

    /// Prefix-tolerant lookup: an exact match first, then the raw value
    /// qualified with the project prefix.
    #[must_use]
    pub fn find(&self, raw: &str) -> Option<&Item> {
        let raw = raw.trim();
        if let Some(item) = self.items.get(&ItemId::new(raw)) {
            return Some(item);
        }
        if self.prefix.is_prefix_of(raw) {
            return None;
        }
        self.items.get(&ItemId::new(self.prefix.qualify(raw)))
    }

    /// Resolves a caller-supplied id to the stored canonical id.
    ///
    /// # Errors
    /// Returns [`ArcError::NotFound`] when neither the raw nor the qualified
    /// form is present.
    pub fn resolve(&self, raw: &str) -> Result<ItemId, ArcError> {
        self.find(raw)
            .map(|item| item.id.clone())
            .ok_or_else(|| ArcError::NotFound(raw.trim().to_string()))
    }

    /// # Errors
    /// Returns [`ArcError::NotFound`] when the id does not resolve.
    pub fn require(&self, raw: &str) -> Result<&Item, ArcError> {
        self.find(raw)
            .ok_or_else(|| ArcError::NotFound(raw.trim().to_string()))
    }

    pub(crate) fn require_mut(&mut self, id: &ItemId) -> Result<&mut Item, ArcError> {
        self.items
            .get_mut(id)
            .ok_or_else(|| ArcError::NotFound(id.to_string()))
    }

    /// Open or done actions parented to `outcome`, sorted by order.
    #[must_use]
    pub fn children_of(&self, outcome: &ItemId) -> Vec<&Item> {
        let mut children: Vec<&Item> = self
            .items
            .values()
            .filter(|item| item.parent() == Some(outcome))
            .collect();
        children.sort_by(|left, right| by_order(left, right));
        children
    }

    /// Outcomes sorted by order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<&Item> {
        let mut outcomes: Vec<&Item> = self
            .items
            .values()
            .filter(|item| item.kind() == Kind::Outcome)
            .collect();
        outcomes.sort_by(|left, right| by_order(left, right));
        outcomes
    }

    /// Actions without a parent, sorted by order.
    #[must_use]
    pub fn standalone(&self) -> Vec<&Item> {
        let mut actions: Vec<&Item> = self
            .items
            .values()
            .filter(|item| item.kind() == Kind::Action && item.parent().is_none())
            .collect();
        actions.sort_by(|left, right| by_order(left, right));
        actions
    }

    /// Validates every record touched by a mutation before it is written.
    ///
    /// # Errors
    /// Returns the first strict-validation failure among `ids`.
    pub fn validate_strict(&self, ids: &[&ItemId]) -> Result<(), ArcError> {
        for id in ids {
            if let Some(item) = self.items.get(*id) {
                item.validate_strict()?;
            }
        }
        Ok(())
    }
}

/// Display order within a pool; ties fall back to id so output is stable.
pub(crate) fn by_order(left: &Item, right: &Item) -> std::cmp::Ordering {
    left.order
        .cmp(&right.order)
        .then_with(|| left.id.cmp(&right.id))
}
