use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    hash::Hash,
    rc::Rc,
};

use slabmap::SlabMap;

use crate::{
    list::{ListNode, ListOutput},
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};


impl<L: Clone + 'static> ActiveList<L> {
    /// Pairs of items whose keys are equal.
    ///
    /// Rows are grouped by key in order of each key's first left item. Within a key, rows
    /// follow left source order, then right source order.
    pub fn join<R, K, U>(
        &self,
        right: &ActiveList<R>,
        left_key: impl Fn(&L) -> K + 'static,
        right_key: impl Fn(&R) -> K + 'static,
        result: impl Fn(&L, &R) -> U + 'static,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        self.join_watched(
            right,
            left_key,
            right_key,
            result,
            Watched::none(),
            Watched::none(),
        )
    }
    pub fn join_watched<R, K, U>(
        &self,
        right: &ActiveList<R>,
        left_key: impl Fn(&L) -> K + 'static,
        right_key: impl Fn(&R) -> K + 'static,
        result: impl Fn(&L, &R) -> U + 'static,
        watched_left: Watched<L>,
        watched_right: Watched<R>,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        let selectors = Selectors {
            left_key: Box::new(left_key),
            right_key: Box::new(right_key),
            result: Box::new(move |l: Option<&L>, r: Option<&R>| match (l, r) {
                (Some(l), Some(r)) => result(l, r),
                _ => panic!("inner join row without a match"),
            }),
        };
        let node = Join::new(self, right, selectors, Mode::Inner, watched_left, watched_right);
        ActiveList::from_node(node)
    }

    /// Like [`join`](Self::join), plus a row with `None` for every item without a match.
    ///
    /// Keys with left items come first, then keys that only have right items, in order of
    /// their first right item.
    pub fn outer_join<R, K, U>(
        &self,
        right: &ActiveList<R>,
        left_key: impl Fn(&L) -> K + 'static,
        right_key: impl Fn(&R) -> K + 'static,
        result: impl Fn(Option<&L>, Option<&R>) -> U + 'static,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        self.outer_join_watched(
            right,
            left_key,
            right_key,
            result,
            Watched::none(),
            Watched::none(),
        )
    }
    pub fn outer_join_watched<R, K, U>(
        &self,
        right: &ActiveList<R>,
        left_key: impl Fn(&L) -> K + 'static,
        right_key: impl Fn(&R) -> K + 'static,
        result: impl Fn(Option<&L>, Option<&R>) -> U + 'static,
        watched_left: Watched<L>,
        watched_right: Watched<R>,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        U: Clone + 'static,
    {
        let selectors = Selectors {
            left_key: Box::new(left_key),
            right_key: Box::new(right_key),
            result: Box::new(result),
        };
        let node = Join::new(self, right, selectors, Mode::Outer, watched_left, watched_right);
        ActiveList::from_node(node)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inner,
    Outer,
}

struct Selectors<L, R, K, U> {
    left_key: Box<dyn Fn(&L) -> K>,
    right_key: Box<dyn Fn(&R) -> K>,
    result: Box<dyn Fn(Option<&L>, Option<&R>) -> U>,
}

/// Slab ids of the left and right item of an output row.
type Row = (Option<usize>, Option<usize>);

struct Join<L: 'static, R: 'static, K, U: 'static> {
    out: ListOutput<U>,
    state: RefCell<JoinState<L, R, K>>,
    selectors: Selectors<L, R, K, U>,
    mode: Mode,
    _sources: (ActiveList<L>, ActiveList<R>),
    _subscriptions: [Subscription; 2],
}

struct JoinState<L: 'static, R: 'static, K> {
    left: Side<L, K>,
    right: Side<R, K>,
}

/// Items of one source.
struct Side<V: 'static, K> {
    /// Slab ids in source order.
    ids: Vec<usize>,
    entries: SlabMap<Entry<V, K>>,
    counts: HashMap<K, usize>,
    watcher: ItemWatcher<V>,
}

struct Entry<V, K> {
    value: V,
    key: K,
}

impl<V: 'static, K: Eq + Hash + Clone> Side<V, K> {
    fn new(watcher: ItemWatcher<V>) -> Self {
        Self {
            ids: Vec::new(),
            entries: SlabMap::new(),
            counts: HashMap::new(),
            watcher,
        }
    }
    fn count(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
    fn key_at(&self, index: usize) -> K {
        self.entries[self.ids[index]].key.clone()
    }
    fn ids_of<'a>(&'a self, key: &'a K) -> impl Iterator<Item = usize> + 'a {
        self.ids
            .iter()
            .copied()
            .filter(move |&id| self.entries[id].key == *key)
    }

    fn attach(&mut self, index: usize, value: V, key: K) {
        *self.counts.entry(key.clone()).or_insert(0) += 1;
        let id = self.entries.insert(Entry { value, key });
        self.ids.insert(index, id);
    }
    fn detach(&mut self, index: usize) -> Entry<V, K> {
        let id = self.ids.remove(index);
        let Some(entry) = self.entries.remove(id) else {
            panic!("join entry {id} is missing");
        };
        if let Some(count) = self.counts.get_mut(&entry.key) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&entry.key);
            }
        }
        entry
    }
    fn reset(&mut self, items: &[V], key: &dyn Fn(&V) -> K)
    where
        V: Clone,
    {
        self.ids.clear();
        self.entries = SlabMap::new();
        self.counts.clear();
        for (index, value) in items.iter().enumerate() {
            self.attach(index, value.clone(), key(value));
        }
    }
}

/// Rows a key contributes and where they start in the output.
struct Block {
    start: usize,
    rows: Vec<Row>,
}

impl<L, R, K, U> Join<L, R, K, U>
where
    L: Clone + 'static,
    R: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
    U: Clone + 'static,
{
    fn new(
        left: &ActiveList<L>,
        right: &ActiveList<R>,
        selectors: Selectors<L, R, K, U>,
        mode: Mode,
        watched_left: Watched<L>,
        watched_right: Watched<R>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut state = JoinState {
                left: Side::new(ItemWatcher::new(watched_left, this, |this: &Self, key| {
                    this.on_left_item_changed(key)
                })),
                right: Side::new(ItemWatcher::new(watched_right, this, |this: &Self, key| {
                    this.on_right_item_changed(key)
                })),
            };
            let (left_items, right_items) = (left.to_vec(), right.to_vec());
            state.left.watcher.reset(left_items.iter());
            state.right.watcher.reset(right_items.iter());
            state.left.reset(&left_items, &*selectors.left_key);
            state.right.reset(&right_items, &*selectors.right_key);
            let rows = Self::all_rows(&state, mode)
                .into_iter()
                .map(|row| Self::row_value(&selectors, &state, row))
                .collect();
            let name = match mode {
                Mode::Inner => "join",
                Mode::Outer => "outer_join",
            };
            Self {
                out: ListOutput::new(name, rows),
                state: RefCell::new(state),
                selectors,
                mode,
                _sources: (left.clone(), right.clone()),
                _subscriptions: [
                    left.bind(this, Self::on_left_change),
                    right.bind(this, Self::on_right_change),
                ],
            }
        })
    }

    fn key_order(s: &JoinState<L, R, K>, mode: Mode) -> Vec<K> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for &id in &s.left.ids {
            let key = &s.left.entries[id].key;
            if mode == Mode::Inner && s.right.count(key) == 0 {
                continue;
            }
            if seen.insert(key) {
                keys.push(key.clone());
            }
        }
        if mode == Mode::Outer {
            for &id in &s.right.ids {
                let key = &s.right.entries[id].key;
                if s.left.count(key) == 0 && seen.insert(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }
    fn block_len(s: &JoinState<L, R, K>, mode: Mode, key: &K) -> usize {
        let (l, r) = (s.left.count(key), s.right.count(key));
        match mode {
            Mode::Outer if l == 0 => r,
            Mode::Outer if r == 0 => l,
            _ => l * r,
        }
    }
    fn rows_of(s: &JoinState<L, R, K>, mode: Mode, key: &K) -> Vec<Row> {
        let lefts: Vec<_> = s.left.ids_of(key).collect();
        let rights: Vec<_> = s.right.ids_of(key).collect();
        if mode == Mode::Outer && lefts.is_empty() {
            return rights.into_iter().map(|r| (None, Some(r))).collect();
        }
        if mode == Mode::Outer && rights.is_empty() {
            return lefts.into_iter().map(|l| (Some(l), None)).collect();
        }
        let mut rows = Vec::with_capacity(lefts.len() * rights.len());
        for &l in &lefts {
            for &r in &rights {
                rows.push((Some(l), Some(r)));
            }
        }
        rows
    }
    fn all_rows(s: &JoinState<L, R, K>, mode: Mode) -> Vec<Row> {
        Self::key_order(s, mode)
            .iter()
            .flat_map(|key| Self::rows_of(s, mode, key))
            .collect()
    }
    fn row_value(selectors: &Selectors<L, R, K, U>, s: &JoinState<L, R, K>, row: Row) -> U {
        let l = row.0.map(|id| &s.left.entries[id].value);
        let r = row.1.map(|id| &s.right.entries[id].value);
        (selectors.result)(l, r)
    }

    fn block(&self, s: &JoinState<L, R, K>, key: &K) -> Block {
        let mut start = 0;
        for k in Self::key_order(s, self.mode) {
            if k == *key {
                break;
            }
            start += Self::block_len(s, self.mode, &k);
        }
        Block {
            start,
            rows: Self::rows_of(s, self.mode, key),
        }
    }

    /// Emits the changes that turn the `old` block of `key` into its current block.
    fn sync_block(&self, s: &JoinState<L, R, K>, key: &K, old: Block) {
        let new = self.block(s, key);
        let kept_old: Vec<_> = old.rows.iter().filter(|r| new.rows.contains(r)).collect();
        let kept_new: Vec<_> = new.rows.iter().filter(|r| old.rows.contains(r)).collect();
        if old.start == new.start && kept_old == kept_new {
            for (i, row) in old.rows.iter().enumerate().rev() {
                if !new.rows.contains(row) {
                    self.out.remove(old.start + i);
                }
            }
            for (j, row) in new.rows.iter().enumerate() {
                if !old.rows.contains(row) {
                    self.out
                        .insert(new.start + j, Self::row_value(&self.selectors, s, *row));
                }
            }
        } else {
            for i in (0..old.rows.len()).rev() {
                self.out.remove(old.start + i);
            }
            for (j, row) in new.rows.iter().enumerate() {
                self.out
                    .insert(new.start + j, Self::row_value(&self.selectors, s, *row));
            }
        }
    }

    /// Recomputes the rows that contain `row_matches` in place.
    fn refresh_rows(&self, s: &JoinState<L, R, K>, key: &K, row_matches: impl Fn(&Row) -> bool) {
        let block = self.block(s, key);
        for (j, row) in block.rows.iter().enumerate() {
            if row_matches(row) {
                self.out
                    .set(block.start + j, Self::row_value(&self.selectors, s, *row));
            }
        }
    }

    fn on_left_change(&self, change: &ListChange<L>) {
        let s = &mut *self.state.borrow_mut();
        s.left.watcher.apply(change);
        match change {
            ListChange::Insert { index, new_value } => {
                self.attach_left(s, *index, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                self.detach_left(s, *index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                let key = (self.selectors.left_key)(new_value);
                if key == s.left.key_at(*index) {
                    let id = s.left.ids[*index];
                    s.left.entries[id].value = new_value.clone();
                    self.refresh_rows(s, &key, |row| row.0 == Some(id));
                } else {
                    self.detach_left(s, *index);
                    self.attach_left(s, *index, new_value.clone());
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let key = s.left.key_at(*old_index);
                let old = self.block(s, &key);
                let id = s.left.ids.remove(*old_index);
                s.left.ids.insert(*new_index, id);
                self.sync_block(s, &key, old);
            }
            ListChange::Reset { new_items } => {
                s.left.reset(new_items, &*self.selectors.left_key);
                self.reset(s);
            }
        }
    }
    fn on_right_change(&self, change: &ListChange<R>) {
        let s = &mut *self.state.borrow_mut();
        s.right.watcher.apply(change);
        match change {
            ListChange::Insert { index, new_value } => {
                self.attach_right(s, *index, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                self.detach_right(s, *index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                let key = (self.selectors.right_key)(new_value);
                if key == s.right.key_at(*index) {
                    let id = s.right.ids[*index];
                    s.right.entries[id].value = new_value.clone();
                    self.refresh_rows(s, &key, |row| row.1 == Some(id));
                } else {
                    self.detach_right(s, *index);
                    self.attach_right(s, *index, new_value.clone());
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let key = s.right.key_at(*old_index);
                let old = self.block(s, &key);
                let id = s.right.ids.remove(*old_index);
                s.right.ids.insert(*new_index, id);
                self.sync_block(s, &key, old);
            }
            ListChange::Reset { new_items } => {
                s.right.reset(new_items, &*self.selectors.right_key);
                self.reset(s);
            }
        }
    }

    fn attach_left(&self, s: &mut JoinState<L, R, K>, index: usize, value: L) {
        let key = (self.selectors.left_key)(&value);
        let old = self.block(s, &key);
        s.left.attach(index, value, key.clone());
        self.sync_block(s, &key, old);
    }
    fn detach_left(&self, s: &mut JoinState<L, R, K>, index: usize) -> L {
        let key = s.left.key_at(index);
        let old = self.block(s, &key);
        let entry = s.left.detach(index);
        self.sync_block(s, &key, old);
        entry.value
    }
    fn attach_right(&self, s: &mut JoinState<L, R, K>, index: usize, value: R) {
        let key = (self.selectors.right_key)(&value);
        let old = self.block(s, &key);
        s.right.attach(index, value, key.clone());
        self.sync_block(s, &key, old);
    }
    fn detach_right(&self, s: &mut JoinState<L, R, K>, index: usize) -> R {
        let key = s.right.key_at(index);
        let old = self.block(s, &key);
        let entry = s.right.detach(index);
        self.sync_block(s, &key, old);
        entry.value
    }
    fn reset(&self, s: &JoinState<L, R, K>) {
        let rows = Self::all_rows(s, self.mode)
            .into_iter()
            .map(|row| Self::row_value(&self.selectors, s, row))
            .collect();
        self.out.reset(rows);
    }

    fn on_left_item_changed(&self, watch_key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.left.watcher.index_of(watch_key) else {
            return;
        };
        let id = s.left.ids[index];
        let old_key = s.left.entries[id].key.clone();
        let key = (self.selectors.left_key)(&s.left.entries[id].value);
        if key == old_key {
            self.refresh_rows(s, &key, |row| row.0 == Some(id));
        } else {
            let value = self.detach_left(s, index);
            self.attach_left(s, index, value);
        }
    }
    fn on_right_item_changed(&self, watch_key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.right.watcher.index_of(watch_key) else {
            return;
        };
        let id = s.right.ids[index];
        let old_key = s.right.entries[id].key.clone();
        let key = (self.selectors.right_key)(&s.right.entries[id].value);
        if key == old_key {
            self.refresh_rows(s, &key, |row| row.1 == Some(id));
        } else {
            let value = self.detach_right(s, index);
            self.attach_right(s, index, value);
        }
    }
}
impl<L: 'static, R: 'static, K: 'static, U: 'static> ListNode<U> for Join<L, R, K, U> {
    fn output(&self) -> &ListOutput<U> {
        &self.out
    }
}
