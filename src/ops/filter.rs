use std::{cell::RefCell, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// Items for which `predicate` returns `true`, in source order.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> ActiveList<T> {
        self.filter_watched(predicate, Watched::none())
    }

    /// Like [`filter`](Self::filter), and re-evaluates an item when a property in `watched` changes.
    pub fn filter_watched(
        &self,
        predicate: impl Fn(&T) -> bool + 'static,
        watched: Watched<T>,
    ) -> ActiveList<T> {
        ActiveList::from_node(Filter::new(self, predicate, watched))
    }
}

struct Filter<T: 'static, P> {
    out: ListOutput<T>,
    state: RefCell<FilterState<T>>,
    predicate: P,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

struct FilterState<T: 'static> {
    entries: Vec<Entry<T>>,
    watcher: ItemWatcher<T>,
}

struct Entry<T> {
    value: T,
    pass: bool,
}

impl<T: 'static> FilterState<T> {
    fn position(&self, index: usize) -> usize {
        self.entries[..index].iter().filter(|e| e.pass).count()
    }
}

impl<T, P> Filter<T, P>
where
    T: Clone + 'static,
    P: Fn(&T) -> bool + 'static,
{
    fn new(source: &ActiveList<T>, predicate: P, watched: Watched<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut watcher = ItemWatcher::new(watched, this, Self::on_item_changed);
            let entries: Vec<_> = {
                let items = source.borrow();
                watcher.reset(items.iter());
                items
                    .iter()
                    .map(|value| Entry {
                        value: value.clone(),
                        pass: predicate(value),
                    })
                    .collect()
            };
            let items = entries
                .iter()
                .filter(|e| e.pass)
                .map(|e| e.value.clone())
                .collect();
            Self {
                out: ListOutput::new("filter", items),
                state: RefCell::new(FilterState { entries, watcher }),
                predicate,
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }

    fn on_change(&self, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        match change {
            ListChange::Insert { index, new_value } => {
                let pass = (self.predicate)(new_value);
                s.watcher.insert(*index, new_value);
                s.entries.insert(
                    *index,
                    Entry {
                        value: new_value.clone(),
                        pass,
                    },
                );
                if pass {
                    self.out.insert(s.position(*index), new_value.clone());
                }
            }
            ListChange::Remove { index, .. } => {
                s.watcher.remove(*index);
                let entry = s.entries.remove(*index);
                if entry.pass {
                    self.out.remove(s.position(*index));
                }
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                let pass = (self.predicate)(new_value);
                s.watcher.set(*index, new_value);
                let position = s.position(*index);
                let entry = &mut s.entries[*index];
                let was_pass = entry.pass;
                entry.value = new_value.clone();
                entry.pass = pass;
                match (was_pass, pass) {
                    (true, true) => {
                        self.out.set(position, new_value.clone());
                    }
                    (true, false) => {
                        self.out.remove(position);
                    }
                    (false, true) => self.out.insert(position, new_value.clone()),
                    (false, false) => {}
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                s.watcher.move_item(*old_index, *new_index);
                let old_position = s.position(*old_index);
                let entry = s.entries.remove(*old_index);
                let pass = entry.pass;
                s.entries.insert(*new_index, entry);
                if pass {
                    self.out.move_item(old_position, s.position(*new_index));
                }
            }
            ListChange::Reset { new_items } => {
                s.watcher.reset(new_items.iter());
                s.entries = new_items
                    .iter()
                    .map(|value| Entry {
                        value: value.clone(),
                        pass: (self.predicate)(value),
                    })
                    .collect();
                self.out.reset(
                    s.entries
                        .iter()
                        .filter(|e| e.pass)
                        .map(|e| e.value.clone())
                        .collect(),
                );
            }
        }
    }

    fn on_item_changed(&self, key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.watcher.index_of(key) else {
            return;
        };
        let pass = (self.predicate)(&s.entries[index].value);
        if pass == s.entries[index].pass {
            return;
        }
        let position = s.position(index);
        let entry = &mut s.entries[index];
        entry.pass = pass;
        let value = entry.value.clone();
        if pass {
            self.out.insert(position, value);
        } else {
            self.out.remove(position);
        }
    }
}
impl<T: 'static, P: 'static> ListNode<T> for Filter<T, P> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}
