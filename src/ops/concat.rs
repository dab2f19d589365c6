use std::{cell::RefCell, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    ActiveList, ListChange, Subscription,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// Items of `self` followed by items of `other`.
    pub fn concat(&self, other: &ActiveList<T>) -> ActiveList<T> {
        ActiveList::from_node(Concat::new(self, other))
    }
}

struct Concat<T: 'static> {
    out: ListOutput<T>,
    sides: RefCell<[Vec<T>; 2]>,
    _sources: [ActiveList<T>; 2],
    _subscriptions: [Subscription; 2],
}

impl<T: Clone + 'static> Concat<T> {
    fn new(first: &ActiveList<T>, second: &ActiveList<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let sides = [first.to_vec(), second.to_vec()];
            Self {
                out: ListOutput::new("concat", sides.concat()),
                sides: RefCell::new(sides),
                _sources: [first.clone(), second.clone()],
                _subscriptions: [
                    first.bind(this, |this: &Self, c| this.on_change(0, c)),
                    second.bind(this, |this: &Self, c| this.on_change(1, c)),
                ],
            }
        })
    }

    fn on_change(&self, side: usize, change: &ListChange<T>) {
        let sides = &mut *self.sides.borrow_mut();
        change.apply_to(&mut sides[side]);
        let offset = if side == 0 { 0 } else { sides[0].len() };
        match change {
            ListChange::Insert { index, new_value } => {
                self.out.insert(offset + index, new_value.clone());
            }
            ListChange::Remove { index, .. } => {
                self.out.remove(offset + index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                self.out.set(offset + index, new_value.clone());
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => self.out.move_item(offset + old_index, offset + new_index),
            ListChange::Reset { .. } => self.out.reset(sides.concat()),
        }
    }
}
impl<T: 'static> ListNode<T> for Concat<T> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}
