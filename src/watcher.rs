use std::rc::{Rc, Weak};

use slabmap::SlabMap;

use crate::{ListChange, Subscription, Watched};


/// Property-change subscriptions for the items an operator holds, in source order.
///
/// Each item gets a slab key. The key is stable while the item moves around, so the
/// callback can find the item's current position with [`index_of`](Self::index_of).
pub(crate) struct ItemWatcher<T: 'static> {
    watched: Watched<T>,
    keys: Vec<usize>,
    subscriptions: SlabMap<Subscription>,
    on_change: Rc<dyn Fn(usize)>,
}

impl<T: 'static> ItemWatcher<T> {
    /// `f` receives the node and the key of the item whose watched property changed.
    pub fn new<N: 'static>(watched: Watched<T>, this: &Weak<N>, f: impl Fn(&N, usize) + 'static) -> Self {
        let this = this.clone();
        Self {
            watched,
            keys: Vec::new(),
            subscriptions: SlabMap::new(),
            on_change: Rc::new(move |key| {
                if let Some(this) = this.upgrade() {
                    f(&this, key)
                }
            }),
        }
    }
    pub fn is_active(&self) -> bool {
        self.watched.is_active()
    }

    /// Number of items currently observed.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }
    pub fn index_of(&self, key: usize) -> Option<usize> {
        self.keys.iter().position(|&k| k == key)
    }

    pub fn insert(&mut self, index: usize, item: &T) {
        if !self.is_active() {
            return;
        }
        let key = self.subscriptions.insert(Subscription::empty());
        let on_change = self.on_change.clone();
        self.subscriptions[key] = self.watched.observe(item, Rc::new(move || on_change(key)));
        self.keys.insert(index, key);
    }
    pub fn remove(&mut self, index: usize) {
        if !self.is_active() {
            return;
        }
        let key = self.keys.remove(index);
        self.subscriptions.remove(key);
    }
    pub fn set(&mut self, index: usize, item: &T) {
        if !self.is_active() {
            return;
        }
        self.remove(index);
        self.insert(index, item);
    }
    pub fn move_item(&mut self, old_index: usize, new_index: usize) {
        if !self.is_active() {
            return;
        }
        let key = self.keys.remove(old_index);
        self.keys.insert(new_index, key);
    }
    pub fn reset<'a>(&mut self, items: impl IntoIterator<Item = &'a T>) {
        self.keys.clear();
        self.subscriptions = SlabMap::new();
        for (index, item) in items.into_iter().enumerate() {
            self.insert(index, item);
        }
    }

    /// Follows a change of the mirrored list.
    pub fn apply(&mut self, change: &ListChange<T>) {
        match change {
            ListChange::Insert { index, new_value } => self.insert(*index, new_value),
            ListChange::Remove { index, .. } => self.remove(*index),
            ListChange::Set {
                index, new_value, ..
            } => self.set(*index, new_value),
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => self.move_item(*old_index, *new_index),
            ListChange::Reset { new_items } => self.reset(new_items.iter()),
        }
    }
}
