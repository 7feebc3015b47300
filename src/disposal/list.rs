//! # Owning list wired to a disposal group.
//!
//! [`DisposalList`] removes through [`DisposalGroup::schedule_disposal`] and inserts
//! through [`DisposalGroup::cancel_disposal`]. Two lists built on the same group can
//! hand items to each other freely; only an item that stays out of every list for the
//! whole grace period is disposed.

use std::sync::Arc;
use std::time::Duration;

use crate::disposal::group::{Disposable, DisposalGroup};

/// `Vec<Arc<D>>` whose removals are disposed after a grace period.
#[derive(Debug)]
pub struct DisposalList<D> {
    items: Vec<Arc<D>>,
    group: DisposalGroup,
    grace: Duration,
}

impl<D: Disposable> DisposalList<D> {
    pub fn new(group: DisposalGroup, grace: Duration) -> Self {
        Self {
            items: Vec::new(),
            group,
            grace,
        }
    }

    pub fn push(&mut self, item: Arc<D>) {
        self.group.cancel_disposal([&item]);
        self.items.push(item);
    }

    /// # Panics
    /// If `index > len`.
    pub fn insert(&mut self, index: usize, item: Arc<D>) {
        self.group.cancel_disposal([&item]);
        self.items.insert(index, item);
    }

    /// Removes the item at `index` and schedules its disposal.
    pub fn remove(&mut self, index: usize) -> Option<Arc<D>> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.group.schedule_disposal([item.clone()], self.grace);
        Some(item)
    }

    /// Removes `item` (by identity) if present.
    pub fn remove_item(&mut self, item: &Arc<D>) -> bool {
        match self.items.iter().position(|i| Arc::ptr_eq(i, item)) {
            Some(index) => self.remove(index).is_some(),
            None => false,
        }
    }

    /// Replaces the item at `index`; the old one is scheduled for disposal.
    pub fn replace(&mut self, index: usize, item: Arc<D>) -> Option<Arc<D>> {
        if index >= self.items.len() {
            return None;
        }
        self.group.cancel_disposal([&item]);
        let old = std::mem::replace(&mut self.items[index], item);
        self.group.schedule_disposal([old.clone()], self.grace);
        Some(old)
    }

    /// Keeps items for which `keep` returns true; the rest are scheduled.
    pub fn retain(&mut self, mut keep: impl FnMut(&Arc<D>) -> bool) {
        let (kept, removed): (Vec<_>, Vec<_>) = self.items.drain(..).partition(|i| keep(i));
        self.items = kept;
        self.group.schedule_disposal(removed, self.grace);
    }

    pub fn clear(&mut self) {
        let removed = std::mem::take(&mut self.items);
        self.group.schedule_disposal(removed, self.grace);
    }

    pub fn contains(&self, item: &Arc<D>) -> bool {
        self.items.iter().any(|i| Arc::ptr_eq(i, item))
    }

    pub fn get(&self, index: usize) -> Option<&Arc<D>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<D>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn group(&self) -> &DisposalGroup {
        &self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposal::group::tests::Tracked;
    use tokio::time;

    const GRACE: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_move_between_lists_never_disposes() {
        let group = DisposalGroup::new().unwrap();
        let mut a = DisposalList::new(group.clone(), GRACE);
        let mut b = DisposalList::new(group.clone(), GRACE);
        let item = Arc::new(Tracked::default());

        a.push(item.clone());
        let moved = a.remove(0).unwrap();
        assert!(group.is_pending(&item));
        time::sleep(Duration::from_millis(50)).await;
        b.push(moved);
        assert!(!group.is_pending(&item));

        time::sleep(GRACE * 3).await;
        assert_eq!(item.count(), 0);
        assert!(b.contains(&item));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_without_reinsert_disposes() {
        let group = DisposalGroup::new().unwrap();
        let mut list = DisposalList::new(group, GRACE);
        let (x, y) = (Arc::new(Tracked::default()), Arc::new(Tracked::default()));
        list.push(x.clone());
        list.push(y.clone());

        assert!(list.remove_item(&x));
        list.retain(|_| false);
        assert!(list.is_empty());

        time::sleep(GRACE * 2).await;
        assert_eq!((x.count(), y.count()), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_disposes_the_old_item() {
        let group = DisposalGroup::new().unwrap();
        let mut list = DisposalList::new(group, Duration::ZERO);
        let (old, new) = (Arc::new(Tracked::default()), Arc::new(Tracked::default()));
        list.push(old.clone());

        list.replace(0, new.clone());
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(old.count(), 1);
        assert_eq!(new.count(), 0);
        assert!(list.get(0).is_some_and(|i| Arc::ptr_eq(i, &new)));
    }
}
