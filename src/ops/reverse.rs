use std::rc::Rc;

use crate::{
    list::{ListNode, ListOutput},
    ActiveList, ListChange, Subscription,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// Items in reverse order.
    pub fn reverse(&self) -> ActiveList<T> {
        ActiveList::from_node(Reverse::new(self))
    }
}

struct Reverse<T: 'static> {
    out: ListOutput<T>,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

impl<T: Clone + 'static> Reverse<T> {
    fn new(source: &ActiveList<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut items = source.to_vec();
            items.reverse();
            Self {
                out: ListOutput::new("reverse", items),
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }

    fn on_change(&self, change: &ListChange<T>) {
        let len = self.out.len();
        match change {
            ListChange::Insert { index, new_value } => {
                self.out.insert(len - index, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                self.out.remove(len - 1 - index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                self.out.set(len - 1 - index, new_value.clone());
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => self.out.move_item(len - 1 - old_index, len - 1 - new_index),
            ListChange::Reset { new_items } => {
                self.out.reset(new_items.iter().rev().cloned().collect());
            }
        }
    }
}
impl<T: 'static> ListNode<T> for Reverse<T> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}
