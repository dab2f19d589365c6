use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    utils::index_after_move,
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// Items sorted by `key`. Items with equal keys keep their source order.
    pub fn order_by<K: Ord + 'static>(&self, key: impl Fn(&T) -> K + 'static) -> ActiveList<T> {
        self.order_by_with_watched(key, K::cmp, Watched::none())
    }
    pub fn order_by_watched<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        self.order_by_with_watched(key, K::cmp, watched)
    }
    pub fn order_by_descending<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
    ) -> ActiveList<T> {
        self.order_by_descending_watched(key, Watched::none())
    }
    pub fn order_by_descending_watched<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        self.order_by_with_watched(key, |a: &K, b: &K| b.cmp(a), watched)
    }

    /// Items sorted by `key` using `compare`.
    pub fn order_by_with<K: 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        compare: impl Fn(&K, &K) -> Ordering + 'static,
    ) -> ActiveList<T> {
        self.order_by_with_watched(key, compare, Watched::none())
    }
    pub fn order_by_with_watched<K: 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        compare: impl Fn(&K, &K) -> Ordering + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        ActiveList::from_node(OrderBy::new(self, key, compare, watched))
    }
}

struct OrderBy<T: 'static, K, F, C> {
    out: ListOutput<T>,
    state: RefCell<OrderState<T, K>>,
    key: F,
    compare: C,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

struct OrderState<T: 'static, K> {
    entries: Vec<Entry<T, K>>,
    /// Source indices in output order.
    order: Vec<usize>,
    watcher: ItemWatcher<T>,
}

struct Entry<T, K> {
    value: T,
    key: K,
}

impl<T, K, F, C> OrderBy<T, K, F, C>
where
    T: Clone + 'static,
    K: 'static,
    F: Fn(&T) -> K + 'static,
    C: Fn(&K, &K) -> Ordering + 'static,
{
    fn new(source: &ActiveList<T>, key: F, compare: C, watched: Watched<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut watcher = ItemWatcher::new(watched, this, Self::on_item_changed);
            let items = source.to_vec();
            watcher.reset(items.iter());
            let mut state = OrderState {
                entries: Vec::new(),
                order: Vec::new(),
                watcher,
            };
            Self::rebuild(&key, &compare, &mut state, items);
            let values = Self::sorted_items(&state);
            Self {
                out: ListOutput::new("order_by", values),
                state: RefCell::new(state),
                key,
                compare,
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }

    fn rebuild(key: &F, compare: &C, s: &mut OrderState<T, K>, items: Vec<T>) {
        s.entries = items
            .into_iter()
            .map(|value| Entry {
                key: key(&value),
                value,
            })
            .collect();
        s.order = (0..s.entries.len()).collect();
        let entries = &s.entries;
        s.order.sort_by(|&a, &b| compare(&entries[a].key, &entries[b].key));
    }
    fn sorted_items(s: &OrderState<T, K>) -> Vec<T> {
        s.order.iter().map(|&i| s.entries[i].value.clone()).collect()
    }

    /// Output position for the entry at `index`, which must not be in `order`.
    fn insertion_point(&self, s: &OrderState<T, K>, index: usize) -> usize {
        let key = &s.entries[index].key;
        s.order.partition_point(|&i| {
            (self.compare)(&s.entries[i].key, key)
                .then(i.cmp(&index))
                .is_lt()
        })
    }

    /// Output position of the entry at `index`. `order` must agree with its current key.
    fn position_of(&self, s: &OrderState<T, K>, index: usize) -> usize {
        let position = self.insertion_point(s, index);
        match s.order.get(position) {
            Some(&i) if i == index => position,
            _ => panic!("source index {index} is not ordered"),
        }
    }

    fn on_change(&self, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        match change {
            ListChange::Insert { index, new_value } => {
                s.watcher.insert(*index, new_value);
                for i in &mut s.order {
                    if *i >= *index {
                        *i += 1;
                    }
                }
                s.entries.insert(
                    *index,
                    Entry {
                        key: (self.key)(new_value),
                        value: new_value.clone(),
                    },
                );
                let position = self.insertion_point(s, *index);
                s.order.insert(position, *index);
                self.out.insert(position, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                s.watcher.remove(*index);
                let position = self.position_of(s, *index);
                s.order.remove(position);
                for i in &mut s.order {
                    if *i > *index {
                        *i -= 1;
                    }
                }
                s.entries.remove(*index);
                self.out.remove(position);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                s.watcher.set(*index, new_value);
                let old_position = self.position_of(s, *index);
                let entry = &mut s.entries[*index];
                entry.key = (self.key)(new_value);
                entry.value = new_value.clone();
                self.out.set(old_position, new_value.clone());
                self.reposition(s, *index, old_position);
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                s.watcher.move_item(*old_index, *new_index);
                let old_position = self.position_of(s, *old_index);
                for i in &mut s.order {
                    *i = index_after_move(*i, *old_index, *new_index);
                }
                let entry = s.entries.remove(*old_index);
                s.entries.insert(*new_index, entry);
                self.reposition(s, *new_index, old_position);
            }
            ListChange::Reset { new_items } => {
                s.watcher.reset(new_items.iter());
                Self::rebuild(&self.key, &self.compare, s, new_items.clone());
                self.out.reset(Self::sorted_items(s));
            }
        }
    }

    /// Moves the entry at `index`, currently shown at `old_position`, to where its key sorts.
    fn reposition(&self, s: &mut OrderState<T, K>, index: usize, old_position: usize) {
        s.order.remove(old_position);
        let new_position = self.insertion_point(s, index);
        s.order.insert(new_position, index);
        self.out.move_item(old_position, new_position);
    }

    fn on_item_changed(&self, watch_key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.watcher.index_of(watch_key) else {
            return;
        };
        let old_position = self.position_of(s, index);
        s.entries[index].key = (self.key)(&s.entries[index].value);
        self.reposition(s, index, old_position);
    }
}
impl<T: 'static, K: 'static, F: 'static, C: 'static> ListNode<T> for OrderBy<T, K, F, C> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}
