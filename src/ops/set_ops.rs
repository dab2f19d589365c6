use std::{cell::RefCell, collections::HashMap, hash::Hash, iter, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    utils::index_after_move,
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// The first item of every distinct value, in source order.
    pub fn distinct(&self) -> ActiveList<T>
    where
        T: Eq + Hash,
    {
        self.distinct_by(T::clone)
    }
    /// The first item of every distinct key, in source order.
    pub fn distinct_by<K: Eq + Hash + Clone + 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
    ) -> ActiveList<T> {
        self.distinct_by_watched(key, Watched::none())
    }
    pub fn distinct_by_watched<K: Eq + Hash + Clone + 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        ActiveList::from_node(KeySet::new(self, None, key, Membership::All, watched))
    }

    /// Distinct items of `self` followed by those of `other` whose value is not in `self`.
    pub fn union(&self, other: &ActiveList<T>) -> ActiveList<T>
    where
        T: Eq + Hash,
    {
        self.union_by(other, T::clone)
    }
    pub fn union_by<K: Eq + Hash + Clone + 'static>(
        &self,
        other: &ActiveList<T>,
        key: impl Fn(&T) -> K + 'static,
    ) -> ActiveList<T> {
        self.union_by_watched(other, key, Watched::none())
    }
    pub fn union_by_watched<K: Eq + Hash + Clone + 'static>(
        &self,
        other: &ActiveList<T>,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        ActiveList::from_node(KeySet::new(self, Some(other), key, Membership::All, watched))
    }

    /// Distinct items of `self` whose value also occurs in `other`.
    pub fn intersect(&self, other: &ActiveList<T>) -> ActiveList<T>
    where
        T: Eq + Hash,
    {
        self.intersect_by(other, T::clone)
    }
    pub fn intersect_by<K: Eq + Hash + Clone + 'static>(
        &self,
        other: &ActiveList<T>,
        key: impl Fn(&T) -> K + 'static,
    ) -> ActiveList<T> {
        self.intersect_by_watched(other, key, Watched::none())
    }
    pub fn intersect_by_watched<K: Eq + Hash + Clone + 'static>(
        &self,
        other: &ActiveList<T>,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        ActiveList::from_node(KeySet::new(self, Some(other), key, Membership::Present, watched))
    }

    /// Distinct items of `self` whose value does not occur in `other`.
    pub fn except(&self, other: &ActiveList<T>) -> ActiveList<T>
    where
        T: Eq + Hash,
    {
        self.except_by(other, T::clone)
    }
    pub fn except_by<K: Eq + Hash + Clone + 'static>(
        &self,
        other: &ActiveList<T>,
        key: impl Fn(&T) -> K + 'static,
    ) -> ActiveList<T> {
        self.except_by_watched(other, key, Watched::none())
    }
    pub fn except_by_watched<K: Eq + Hash + Clone + 'static>(
        &self,
        other: &ActiveList<T>,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        ActiveList::from_node(KeySet::new(self, Some(other), key, Membership::Absent, watched))
    }
}

/// Which keys of the primary items may appear in the output.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Membership {
    /// Every key. The second source, if any, is appended to the primary items.
    All,
    /// Keys present in the second source.
    Present,
    /// Keys absent from the second source.
    Absent,
}

struct KeySet<T: 'static, K, F> {
    out: ListOutput<T>,
    state: RefCell<KeySetState<T, K>>,
    key: F,
    membership: Membership,
    _sources: Vec<ActiveList<T>>,
    _subscriptions: Vec<Subscription>,
}

/// Items are visible when they are the first of their key and the key passes the membership.
struct KeySetState<T: 'static, K> {
    entries: Vec<Entry<T, K>>,
    /// Indices of the entries of each key, ascending.
    occurrences: HashMap<K, Vec<usize>>,
    /// Indices of the visible entries, ascending.
    shown: Vec<usize>,
    first_len: usize,
    watcher: ItemWatcher<T>,
    other: Vec<(T, K)>,
    other_counts: HashMap<K, usize>,
    other_watcher: ItemWatcher<T>,
}

struct Entry<T, K> {
    value: T,
    key: K,
    visible: bool,
}

impl<T: Clone + 'static, K: Eq + Hash + Clone> KeySetState<T, K> {
    /// Output position of the entry at `index`, or where it would go.
    fn position(&self, index: usize) -> usize {
        self.shown.partition_point(|&i| i < index)
    }
    fn show(&mut self, index: usize) -> usize {
        let position = self.position(index);
        self.shown.insert(position, index);
        self.entries[index].visible = true;
        position
    }
    fn hide(&mut self, index: usize) -> usize {
        let position = self.position(index);
        self.shown.remove(position);
        self.entries[index].visible = false;
        position
    }

    fn add_occurrence(&mut self, key: &K, index: usize) {
        let occurrences = self.occurrences.entry(key.clone()).or_default();
        let at = occurrences.partition_point(|&i| i < index);
        occurrences.insert(at, index);
    }
    fn remove_occurrence(&mut self, key: &K, index: usize) {
        let Some(occurrences) = self.occurrences.get_mut(key) else {
            return;
        };
        if let Ok(at) = occurrences.binary_search(&index) {
            occurrences.remove(at);
        }
        if occurrences.is_empty() {
            self.occurrences.remove(key);
        }
    }

    fn index_lists(&mut self) -> impl Iterator<Item = &mut Vec<usize>> + '_ {
        self.occurrences
            .values_mut()
            .chain(iter::once(&mut self.shown))
    }
    fn shift_inserted(&mut self, index: usize) {
        for list in self.index_lists() {
            let from = list.partition_point(|&i| i < index);
            for i in &mut list[from..] {
                *i += 1;
            }
        }
    }
    fn shift_removed(&mut self, index: usize) {
        for list in self.index_lists() {
            let from = list.partition_point(|&i| i <= index);
            for i in &mut list[from..] {
                *i -= 1;
            }
        }
    }
    /// Adjusts indices for a move, with the moved entry already taken out of every list.
    fn shift_moved(&mut self, old_index: usize, new_index: usize) {
        let (lo, hi) = (old_index.min(new_index), old_index.max(new_index));
        for list in self.index_lists() {
            let from = list.partition_point(|&i| i < lo);
            let to = list.partition_point(|&i| i <= hi);
            for i in &mut list[from..to] {
                *i = index_after_move(*i, old_index, new_index);
            }
        }
    }
    fn admits(&self, membership: Membership, key: &K) -> bool {
        match membership {
            Membership::All => true,
            Membership::Present => self.other_counts.contains_key(key),
            Membership::Absent => !self.other_counts.contains_key(key),
        }
    }
    fn visible_items(&self) -> Vec<T> {
        self.shown
            .iter()
            .map(|&i| self.entries[i].value.clone())
            .collect()
    }

    /// Recomputes every index list and visibility flag without notifying.
    fn rebuild(&mut self, membership: Membership) {
        self.occurrences.clear();
        self.shown.clear();
        for index in 0..self.entries.len() {
            let key = self.entries[index].key.clone();
            let first = {
                let occurrences = self.occurrences.entry(key.clone()).or_default();
                occurrences.push(index);
                occurrences.len() == 1
            };
            let visible = first && self.admits(membership, &key);
            self.entries[index].visible = visible;
            if visible {
                self.shown.push(index);
            }
        }
    }

    fn add_other(&mut self, key: K) -> bool {
        let count = self.other_counts.entry(key).or_insert(0);
        *count += 1;
        *count == 1
    }
    fn remove_other(&mut self, key: &K) -> bool {
        let Some(count) = self.other_counts.get_mut(key) else {
            panic!("key of a removed item is not counted");
        };
        *count -= 1;
        if *count == 0 {
            self.other_counts.remove(key);
            true
        } else {
            false
        }
    }
}

impl<T, K, F> KeySet<T, K, F>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
    F: Fn(&T) -> K + 'static,
{
    fn new(
        source: &ActiveList<T>,
        other: Option<&ActiveList<T>>,
        key: F,
        membership: Membership,
        watched: Watched<T>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut watcher = ItemWatcher::new(watched.clone(), this, Self::on_item_changed);
            let mut other_watcher = ItemWatcher::new(
                if membership == Membership::All {
                    Watched::none()
                } else {
                    watched
                },
                this,
                Self::on_other_item_changed,
            );
            let mut primary = source.to_vec();
            let first_len = primary.len();
            let mut other_items = Vec::new();
            if let Some(other) = other {
                if membership == Membership::All {
                    primary.extend(other.to_vec());
                } else {
                    other_items = other.to_vec();
                }
            }
            watcher.reset(primary.iter());
            other_watcher.reset(other_items.iter());
            let mut state = KeySetState {
                entries: primary.into_iter().map(|value| entry(&key, value)).collect(),
                occurrences: HashMap::new(),
                shown: Vec::new(),
                first_len,
                watcher,
                other: Vec::new(),
                other_counts: HashMap::new(),
                other_watcher,
            };
            for item in other_items {
                let k = key(&item);
                state.add_other(k.clone());
                state.other.push((item, k));
            }
            state.rebuild(membership);
            let name = match (membership, other.is_some()) {
                (Membership::All, false) => "distinct",
                (Membership::All, true) => "union",
                (Membership::Present, _) => "intersect",
                (Membership::Absent, _) => "except",
            };
            let mut sources = vec![source.clone()];
            let mut subscriptions = vec![source.bind(this, |this: &Self, c| this.on_primary_change(0, c))];
            if let Some(other) = other {
                sources.push(other.clone());
                subscriptions.push(if membership == Membership::All {
                    other.bind(this, |this: &Self, c| this.on_primary_change(1, c))
                } else {
                    other.bind(this, Self::on_other_change)
                });
            }
            Self {
                out: ListOutput::new(name, state.visible_items()),
                state: RefCell::new(state),
                key,
                membership,
                _sources: sources,
                _subscriptions: subscriptions,
            }
        })
    }

    fn on_primary_change(&self, segment: usize, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        let (base, len) = if segment == 0 {
            (0, s.first_len)
        } else {
            (s.first_len, s.entries.len() - s.first_len)
        };
        match change {
            ListChange::Insert { index, new_value } => {
                if segment == 0 {
                    s.first_len += 1;
                }
                self.insert_entry(s, base + index, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                if segment == 0 {
                    s.first_len -= 1;
                }
                self.remove_entry(s, base + index);
            }
            ListChange::Set {
                index, new_value, ..
            } => self.set_entry(s, base + index, new_value.clone()),
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => self.move_entry(s, base + old_index, base + new_index),
            ListChange::Reset { new_items } => {
                for index in (base..base + len).rev() {
                    s.watcher.remove(index);
                }
                for (offset, value) in new_items.iter().enumerate() {
                    s.watcher.insert(base + offset, value);
                }
                let new_entries = new_items.iter().map(|value| entry(&self.key, value.clone()));
                s.entries.splice(base..base + len, new_entries);
                if segment == 0 {
                    s.first_len = new_items.len();
                }
                s.rebuild(self.membership);
                self.out.reset(s.visible_items());
            }
        }
    }

    fn insert_entry(&self, s: &mut KeySetState<T, K>, index: usize, value: T) {
        s.watcher.insert(index, &value);
        let e = entry(&self.key, value);
        let key = e.key.clone();
        s.shift_inserted(index);
        s.entries.insert(index, e);
        s.add_occurrence(&key, index);
        self.refresh(s, &key);
    }
    fn remove_entry(&self, s: &mut KeySetState<T, K>, index: usize) {
        s.watcher.remove(index);
        if s.entries[index].visible {
            let position = s.hide(index);
            self.out.remove(position);
        }
        let e = s.entries.remove(index);
        s.remove_occurrence(&e.key, index);
        s.shift_removed(index);
        self.refresh(s, &e.key);
    }
    fn set_entry(&self, s: &mut KeySetState<T, K>, index: usize, value: T) {
        let key = (self.key)(&value);
        if key != s.entries[index].key {
            self.remove_entry(s, index);
            self.insert_entry(s, index, value);
            return;
        }
        s.watcher.set(index, &value);
        s.entries[index].value = value.clone();
        if s.entries[index].visible {
            self.out.set(s.position(index), value);
        }
    }
    fn move_entry(&self, s: &mut KeySetState<T, K>, old_index: usize, new_index: usize) {
        s.watcher.move_item(old_index, new_index);
        let key = s.entries[old_index].key.clone();
        let visible = s.entries[old_index].visible;
        let old_position = s.position(old_index);
        if visible {
            s.shown.remove(old_position);
        }
        s.remove_occurrence(&key, old_index);
        s.shift_moved(old_index, new_index);
        let e = s.entries.remove(old_index);
        s.entries.insert(new_index, e);
        s.add_occurrence(&key, new_index);
        if visible {
            let new_position = s.position(new_index);
            s.shown.insert(new_position, new_index);
            self.out.move_item(old_position, new_position);
        }
        self.refresh(s, &key);
    }

    /// Makes the visibility of every item with `key` match its first-occurrence status.
    fn refresh(&self, s: &mut KeySetState<T, K>, key: &K) {
        let admitted = s.admits(self.membership, key);
        let count = s.occurrences.get(key).map_or(0, Vec::len);
        for n in 0..count {
            let index = s.occurrences[key][n];
            let visible = n == 0 && admitted;
            if s.entries[index].visible == visible {
                continue;
            }
            if visible {
                let position = s.show(index);
                self.out.insert(position, s.entries[index].value.clone());
            } else {
                let position = s.hide(index);
                self.out.remove(position);
            }
        }
    }

    fn on_item_changed(&self, watch_key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.watcher.index_of(watch_key) else {
            return;
        };
        let key = (self.key)(&s.entries[index].value);
        if key == s.entries[index].key {
            return;
        }
        let old_key = std::mem::replace(&mut s.entries[index].key, key.clone());
        s.remove_occurrence(&old_key, index);
        s.add_occurrence(&key, index);
        self.refresh(s, &old_key);
        self.refresh(s, &key);
    }

    fn on_other_change(&self, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        s.other_watcher.apply(change);
        match change {
            ListChange::Insert { index, new_value } => {
                let key = (self.key)(new_value);
                s.other.insert(*index, (new_value.clone(), key.clone()));
                self.add_other(s, key);
            }
            ListChange::Remove { index, .. } => {
                let (_, key) = s.other.remove(*index);
                self.remove_other(s, &key);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                let key = (self.key)(new_value);
                let (_, old_key) =
                    std::mem::replace(&mut s.other[*index], (new_value.clone(), key.clone()));
                if old_key != key {
                    self.remove_other(s, &old_key);
                    self.add_other(s, key);
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let item = s.other.remove(*old_index);
                s.other.insert(*new_index, item);
            }
            ListChange::Reset { new_items } => {
                s.other.clear();
                s.other_counts.clear();
                for item in new_items {
                    let key = (self.key)(item);
                    s.add_other(key.clone());
                    s.other.push((item.clone(), key));
                }
                s.rebuild(self.membership);
                self.out.reset(s.visible_items());
            }
        }
    }
    fn on_other_item_changed(&self, watch_key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.other_watcher.index_of(watch_key) else {
            return;
        };
        let key = (self.key)(&s.other[index].0);
        if key != s.other[index].1 {
            let old_key = std::mem::replace(&mut s.other[index].1, key.clone());
            self.remove_other(s, &old_key);
            self.add_other(s, key);
        }
    }
    fn add_other(&self, s: &mut KeySetState<T, K>, key: K) {
        if s.add_other(key.clone()) {
            self.refresh(s, &key);
        }
    }
    fn remove_other(&self, s: &mut KeySetState<T, K>, key: &K) {
        if s.remove_other(key) {
            self.refresh(s, key);
        }
    }
}
impl<T: 'static, K: 'static, F: 'static> ListNode<T> for KeySet<T, K, F> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}

fn entry<T, K>(key: &impl Fn(&T) -> K, value: T) -> Entry<T, K> {
    Entry {
        key: key(&value),
        value,
        visible: false,
    }
}
