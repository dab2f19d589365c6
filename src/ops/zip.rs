use std::{cell::RefCell, ops::Range, rc::Rc};

use crate::{
    list::{ListNode, ListOutput},
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};


impl<T: Clone + 'static> ActiveList<T> {
    /// Pairs items at the same index with `f`. The result is as long as the shorter list.
    pub fn zip<R, U>(&self, other: &ActiveList<R>, f: impl Fn(&T, &R) -> U + 'static) -> ActiveList<U>
    where
        R: Clone + 'static,
        U: Clone + 'static,
    {
        self.zip_watched(other, f, Watched::none(), Watched::none())
    }

    pub fn zip_watched<R, U>(
        &self,
        other: &ActiveList<R>,
        f: impl Fn(&T, &R) -> U + 'static,
        watched_left: Watched<T>,
        watched_right: Watched<R>,
    ) -> ActiveList<U>
    where
        R: Clone + 'static,
        U: Clone + 'static,
    {
        ActiveList::from_node(Zip::new(self, other, f, watched_left, watched_right))
    }
}

struct Zip<L: 'static, R: 'static, U: 'static, F> {
    out: ListOutput<U>,
    state: RefCell<ZipState<L, R>>,
    f: F,
    _sources: (ActiveList<L>, ActiveList<R>),
    _subscriptions: [Subscription; 2],
}

struct ZipState<L: 'static, R: 'static> {
    left: Vec<L>,
    right: Vec<R>,
    left_watcher: ItemWatcher<L>,
    right_watcher: ItemWatcher<R>,
}

impl<L: 'static, R: 'static> ZipState<L, R> {
    fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }
}

/// Indices of the side whose items a change may have replaced.
fn touched<T>(change: &ListChange<T>, len: usize) -> Range<usize> {
    match change {
        ListChange::Insert { index, .. } | ListChange::Remove { index, .. } => *index..len,
        ListChange::Set { index, .. } => *index..index + 1,
        ListChange::Move {
            old_index,
            new_index,
            ..
        } => *old_index.min(new_index)..old_index.max(new_index) + 1,
        ListChange::Reset { .. } => 0..len,
    }
}

impl<L, R, U, F> Zip<L, R, U, F>
where
    L: Clone + 'static,
    R: Clone + 'static,
    U: Clone + 'static,
    F: Fn(&L, &R) -> U + 'static,
{
    fn new(
        left: &ActiveList<L>,
        right: &ActiveList<R>,
        f: F,
        watched_left: Watched<L>,
        watched_right: Watched<R>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut left_watcher = ItemWatcher::new(watched_left, this, |this: &Self, key| {
                let index = this.state.borrow().left_watcher.index_of(key);
                this.on_item_changed(index);
            });
            let mut right_watcher = ItemWatcher::new(watched_right, this, |this: &Self, key| {
                let index = this.state.borrow().right_watcher.index_of(key);
                this.on_item_changed(index);
            });
            left_watcher.reset(left.borrow().iter());
            right_watcher.reset(right.borrow().iter());
            let state = ZipState {
                left: left.to_vec(),
                right: right.to_vec(),
                left_watcher,
                right_watcher,
            };
            let items = state.left.iter().zip(&state.right).map(|(l, r)| f(l, r)).collect();
            Self {
                out: ListOutput::new("zip", items),
                state: RefCell::new(state),
                f,
                _sources: (left.clone(), right.clone()),
                _subscriptions: [
                    left.bind(this, Self::on_left_change),
                    right.bind(this, Self::on_right_change),
                ],
            }
        })
    }

    fn on_left_change(&self, change: &ListChange<L>) {
        let s = &mut *self.state.borrow_mut();
        let old_len = s.len();
        s.left_watcher.apply(change);
        change.apply_to(&mut s.left);
        if let ListChange::Reset { .. } = change {
            self.reset(s);
        } else {
            self.sync(s, old_len, touched(change, s.left.len()));
        }
    }
    fn on_right_change(&self, change: &ListChange<R>) {
        let s = &mut *self.state.borrow_mut();
        let old_len = s.len();
        s.right_watcher.apply(change);
        change.apply_to(&mut s.right);
        if let ListChange::Reset { .. } = change {
            self.reset(s);
        } else {
            self.sync(s, old_len, touched(change, s.right.len()));
        }
    }
    fn on_item_changed(&self, index: Option<usize>) {
        let s = &*self.state.borrow();
        if let Some(index) = index {
            if index < s.len() {
                self.out.set(index, (self.f)(&s.left[index], &s.right[index]));
            }
        }
    }

    fn sync(&self, s: &ZipState<L, R>, old_len: usize, touched: Range<usize>) {
        let new_len = s.len();
        for index in touched.start..touched.end.min(old_len).min(new_len) {
            self.out.set(index, (self.f)(&s.left[index], &s.right[index]));
        }
        for index in old_len..new_len {
            self.out.insert(index, (self.f)(&s.left[index], &s.right[index]));
        }
        for index in (new_len..old_len).rev() {
            self.out.remove(index);
        }
    }
    fn reset(&self, s: &ZipState<L, R>) {
        let items = s.left.iter().zip(&s.right).map(|(l, r)| (self.f)(l, r)).collect();
        self.out.reset(items);
    }
}
impl<L: 'static, R: 'static, U: 'static, F: 'static> ListNode<U> for Zip<L, R, U, F> {
    fn output(&self) -> &ListOutput<U> {
        &self.out
    }
}
