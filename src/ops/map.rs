use std::{cell::RefCell, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// Applies `f` to every item, keeping indices.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> ActiveList<U> {
        self.map_watched(f, Watched::none())
    }

    /// Like [`map`](Self::map), and re-applies `f` when a property in `watched` changes.
    pub fn map_watched<U: Clone + 'static>(
        &self,
        f: impl Fn(&T) -> U + 'static,
        watched: Watched<T>,
    ) -> ActiveList<U> {
        ActiveList::from_node(Map::new(self, f, watched))
    }
}

struct Map<T: 'static, U: 'static, F> {
    out: ListOutput<U>,
    state: RefCell<MapState<T>>,
    f: F,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

struct MapState<T: 'static> {
    items: Vec<T>,
    watcher: ItemWatcher<T>,
}

impl<T, U, F> Map<T, U, F>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(&T) -> U + 'static,
{
    fn new(source: &ActiveList<T>, f: F, watched: Watched<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut watcher = ItemWatcher::new(watched, this, Self::on_item_changed);
            let items = source.to_vec();
            watcher.reset(items.iter());
            let values = items.iter().map(&f).collect();
            Self {
                out: ListOutput::new("map", values),
                state: RefCell::new(MapState { items, watcher }),
                f,
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }

    fn on_change(&self, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        match change {
            ListChange::Insert { index, new_value } => {
                s.watcher.insert(*index, new_value);
                s.items.insert(*index, new_value.clone());
                self.out.insert(*index, (self.f)(new_value));
            }
            ListChange::Remove { index, .. } => {
                s.watcher.remove(*index);
                s.items.remove(*index);
                self.out.remove(*index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                s.watcher.set(*index, new_value);
                s.items[*index] = new_value.clone();
                self.out.set(*index, (self.f)(new_value));
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                s.watcher.move_item(*old_index, *new_index);
                let item = s.items.remove(*old_index);
                s.items.insert(*new_index, item);
                self.out.move_item(*old_index, *new_index);
            }
            ListChange::Reset { new_items } => {
                s.watcher.reset(new_items.iter());
                s.items = new_items.clone();
                self.out.reset(new_items.iter().map(&self.f).collect());
            }
        }
    }

    fn on_item_changed(&self, key: usize) {
        let s = self.state.borrow();
        if let Some(index) = s.watcher.index_of(key) {
            self.out.set(index, (self.f)(&s.items[index]));
        }
    }
}
impl<T: 'static, U: 'static, F: 'static> ListNode<U> for Map<T, U, F> {
    fn output(&self) -> &ListOutput<U> {
        &self.out
    }
}
