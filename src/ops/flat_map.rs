use std::{cell::RefCell, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};

#[cfg(test)]
mod tests;

impl<T: Clone + 'static> ActiveList<T> {
    /// Concatenation of the sequences produced by `f` for each item.
    pub fn flat_map<U, I>(&self, f: impl Fn(&T) -> I + 'static) -> ActiveList<U>
    where
        U: Clone + 'static,
        I: IntoIterator<Item = U>,
    {
        self.flat_map_watched(f, Watched::none())
    }

    pub fn flat_map_watched<U, I>(
        &self,
        f: impl Fn(&T) -> I + 'static,
        watched: Watched<T>,
    ) -> ActiveList<U>
    where
        U: Clone + 'static,
        I: IntoIterator<Item = U>,
    {
        let f = move |item: &T| f(item).into_iter().collect::<Vec<_>>();
        ActiveList::from_node(FlatMap::new(self, f, watched))
    }
}

struct FlatMap<T: 'static, U: 'static, F> {
    out: ListOutput<U>,
    state: RefCell<FlatMapState<T>>,
    f: F,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

struct FlatMapState<T: 'static> {
    entries: Vec<Entry<T>>,
    watcher: ItemWatcher<T>,
}

struct Entry<T> {
    value: T,
    len: usize,
}

impl<T: 'static> FlatMapState<T> {
    fn offset(&self, index: usize) -> usize {
        self.entries[..index].iter().map(|e| e.len).sum()
    }
}

impl<T, U, F> FlatMap<T, U, F>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(&T) -> Vec<U> + 'static,
{
    fn new(source: &ActiveList<T>, f: F, watched: Watched<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut watcher = ItemWatcher::new(watched, this, Self::on_item_changed);
            let items = source.to_vec();
            watcher.reset(items.iter());
            let (entries, values) = Self::expand(&f, items);
            Self {
                out: ListOutput::new("flat_map", values),
                state: RefCell::new(FlatMapState { entries, watcher }),
                f,
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }
    fn expand(f: &F, items: Vec<T>) -> (Vec<Entry<T>>, Vec<U>) {
        let mut values = Vec::new();
        let entries = items
            .into_iter()
            .map(|value| {
                let children = f(&value);
                let len = children.len();
                values.extend(children);
                Entry { value, len }
            })
            .collect();
        (entries, values)
    }

    fn on_change(&self, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        match change {
            ListChange::Insert { index, new_value } => {
                s.watcher.insert(*index, new_value);
                self.insert_entry(s, *index, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                s.watcher.remove(*index);
                self.remove_entry(s, *index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                s.watcher.set(*index, new_value);
                self.remove_entry(s, *index);
                self.insert_entry(s, *index, new_value.clone());
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                s.watcher.move_item(*old_index, *new_index);
                let old_start = s.offset(*old_index);
                let entry = s.entries.remove(*old_index);
                let len = entry.len;
                s.entries.insert(*new_index, entry);
                let new_start = s.offset(*new_index);
                if old_start < new_start {
                    for _ in 0..len {
                        self.out.move_item(old_start, new_start + len - 1);
                    }
                } else {
                    for k in 0..len {
                        self.out.move_item(old_start + k, new_start + k);
                    }
                }
            }
            ListChange::Reset { new_items } => {
                s.watcher.reset(new_items.iter());
                let (entries, values) = Self::expand(&self.f, new_items.clone());
                s.entries = entries;
                self.out.reset(values);
            }
        }
    }
    fn insert_entry(&self, s: &mut FlatMapState<T>, index: usize, value: T) {
        let children = (self.f)(&value);
        let start = s.offset(index);
        s.entries.insert(
            index,
            Entry {
                value,
                len: children.len(),
            },
        );
        for (k, child) in children.into_iter().enumerate() {
            self.out.insert(start + k, child);
        }
    }
    fn remove_entry(&self, s: &mut FlatMapState<T>, index: usize) -> T {
        let start = s.offset(index);
        let entry = s.entries.remove(index);
        for _ in 0..entry.len {
            self.out.remove(start);
        }
        entry.value
    }

    fn on_item_changed(&self, key: usize) {
        let s = &mut *self.state.borrow_mut();
        if let Some(index) = s.watcher.index_of(key) {
            let value = self.remove_entry(s, index);
            self.insert_entry(s, index, value);
        }
    }
}
impl<T: 'static, U: 'static, F: 'static> ListNode<U> for FlatMap<T, U, F> {
    fn output(&self) -> &ListOutput<U> {
        &self.out
    }
}
