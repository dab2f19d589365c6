use std::{cell::RefCell, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    ActiveList, ListChange, Subscription,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// The first `count` items.
    pub fn take(&self, count: usize) -> ActiveList<T> {
        ActiveList::from_node(Window::new(self, count, Mode::Take))
    }

    /// All items except the first `count`.
    pub fn skip(&self, count: usize) -> ActiveList<T> {
        ActiveList::from_node(Window::new(self, count, Mode::Skip))
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Take,
    Skip,
}

struct Window<T: 'static> {
    out: ListOutput<T>,
    items: RefCell<Vec<T>>,
    count: usize,
    mode: Mode,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

impl<T: Clone + 'static> Window<T> {
    fn new(source: &ActiveList<T>, count: usize, mode: Mode) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let items = source.to_vec();
            let name = match mode {
                Mode::Take => "take",
                Mode::Skip => "skip",
            };
            Self {
                out: ListOutput::new(name, window(&items, count, mode).to_vec()),
                items: RefCell::new(items),
                count,
                mode,
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }

    fn on_change(&self, change: &ListChange<T>) {
        let items = &mut *self.items.borrow_mut();
        let old_len = items.len();
        change.apply_to(items);
        match self.mode {
            Mode::Take => self.on_take_change(items, old_len, change),
            Mode::Skip => self.on_skip_change(items, old_len, change),
        }
    }

    fn on_take_change(&self, items: &[T], old_len: usize, change: &ListChange<T>) {
        let n = self.count;
        match change {
            ListChange::Insert { index, new_value } => {
                if *index < n {
                    if old_len >= n {
                        self.out.remove(n - 1);
                    }
                    self.out.insert(*index, new_value.clone());
                }
            }
            ListChange::Remove { index, .. } => {
                if *index < n {
                    self.out.remove(*index);
                    if items.len() >= n {
                        self.out.insert(n - 1, items[n - 1].clone());
                    }
                }
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                if *index < n {
                    self.out.set(*index, new_value.clone());
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                value,
            } => match (*old_index < n, *new_index < n) {
                (true, true) => self.out.move_item(*old_index, *new_index),
                (true, false) => {
                    self.out.remove(*old_index);
                    self.out.insert(n - 1, items[n - 1].clone());
                }
                (false, true) => {
                    self.out.remove(n - 1);
                    self.out.insert(*new_index, value.clone());
                }
                (false, false) => {}
            },
            ListChange::Reset { .. } => {
                self.out.reset(window(items, n, Mode::Take).to_vec());
            }
        }
    }

    fn on_skip_change(&self, items: &[T], old_len: usize, change: &ListChange<T>) {
        let n = self.count;
        match change {
            ListChange::Insert { index, new_value } => {
                if *index >= n {
                    self.out.insert(index - n, new_value.clone());
                } else if old_len >= n {
                    self.out.insert(0, items[n].clone());
                }
            }
            ListChange::Remove { index, .. } => {
                if *index >= n {
                    self.out.remove(index - n);
                } else if old_len > n {
                    self.out.remove(0);
                }
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                if *index >= n {
                    self.out.set(index - n, new_value.clone());
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                value,
            } => match (*old_index >= n, *new_index >= n) {
                (true, true) => self.out.move_item(old_index - n, new_index - n),
                (false, true) => {
                    self.out.remove(0);
                    self.out.insert(new_index - n, value.clone());
                }
                (true, false) => {
                    self.out.remove(old_index - n);
                    self.out.insert(0, items[n].clone());
                }
                (false, false) => {}
            },
            ListChange::Reset { .. } => {
                self.out.reset(window(items, n, Mode::Skip).to_vec());
            }
        }
    }
}
impl<T: 'static> ListNode<T> for Window<T> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}

fn window<T>(items: &[T], count: usize, mode: Mode) -> &[T] {
    let count = count.min(items.len());
    match mode {
        Mode::Take => &items[..count],
        Mode::Skip => &items[count..],
    }
}
