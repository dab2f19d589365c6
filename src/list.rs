use std::{
    cell::{Ref, RefCell},
    fmt::{self, Debug},
    ops::Index,
    rc::{Rc, Weak},
    slice,
};

use derive_ex::Ex;
use serde::Serialize;
use slabmap::SlabMap;

use crate::{utils::quick_vec::QuickVec, ChangeKind, ListChange, Subscription};


type Sink<T> = Rc<dyn Fn(&ListChange<T>)>;

/// An operator (or source) that owns the items of an [`ActiveList`].
pub(crate) trait ListNode<T: 'static> {
    fn output(&self) -> &ListOutput<T>;
}

/// Backing store and listeners of an active list.
///
/// Every mutation updates the store first and notifies afterwards, so listeners can
/// read the list while they are being called.
pub(crate) struct ListOutput<T: 'static> {
    name: &'static str,
    items: RefCell<QuickVec<T>>,
    sinks: Rc<RefCell<SlabMap<Sink<T>>>>,
}

impl<T: 'static> ListOutput<T> {
    pub fn new(name: &'static str, items: Vec<T>) -> Self {
        tracing::debug!(operator = name, len = items.len(), "active list created");
        Self {
            name,
            items: RefCell::new(QuickVec::from_vec(items)),
            sinks: Rc::new(RefCell::new(SlabMap::new())),
        }
    }
    pub fn items(&self) -> Ref<'_, QuickVec<T>> {
        self.items.borrow()
    }
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }
    pub fn subscribe(&self, f: Sink<T>) -> Subscription {
        let key = self.sinks.borrow_mut().insert(f);
        tracing::trace!(operator = self.name, key, "subscribed");
        let name = self.name;
        Subscription::from_weak_fn(Rc::downgrade(&self.sinks), move |sinks| {
            sinks.borrow_mut().remove(key);
            tracing::trace!(operator = name, key, "unsubscribed");
        })
    }
    pub fn subscriber_count(&self) -> usize {
        self.sinks.borrow().len()
    }
}
impl<T: Clone + 'static> ListOutput<T> {
    pub fn insert(&self, index: usize, new_value: T) {
        self.items.borrow_mut().insert(index, new_value.clone());
        self.notify(ListChange::Insert { index, new_value });
    }
    pub fn remove(&self, index: usize) -> T {
        let old_value = self.items.borrow_mut().remove(index);
        self.notify(ListChange::Remove {
            index,
            old_value: old_value.clone(),
        });
        old_value
    }
    pub fn set(&self, index: usize, new_value: T) -> T {
        let old_value = self.items.borrow_mut().replace(index, new_value.clone());
        self.notify(ListChange::Set {
            index,
            old_value: old_value.clone(),
            new_value,
        });
        old_value
    }
    pub fn move_item(&self, old_index: usize, new_index: usize) {
        if old_index == new_index {
            return;
        }
        let value = {
            let mut items = self.items.borrow_mut();
            items.move_item(old_index, new_index);
            items[new_index].clone()
        };
        self.notify(ListChange::Move {
            old_index,
            new_index,
            value,
        });
    }
    pub fn reset(&self, new_items: Vec<T>) {
        self.items.borrow_mut().reset(new_items.clone());
        self.notify(ListChange::Reset { new_items });
    }

    /// Applies a change received from another list.
    pub fn replay(&self, change: &ListChange<T>) {
        match change {
            ListChange::Insert { index, new_value } => self.insert(*index, new_value.clone()),
            ListChange::Remove { index, .. } => {
                self.remove(*index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                self.set(*index, new_value.clone());
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => self.move_item(*old_index, *new_index),
            ListChange::Reset { new_items } => self.reset(new_items.clone()),
        }
    }

    fn notify(&self, change: ListChange<T>) {
        let sinks: Vec<_> = self.sinks.borrow().iter().map(|(k, f)| (k, f.clone())).collect();
        if change.kind() == ChangeKind::Reset {
            tracing::trace!(operator = self.name, sinks = sinks.len(), "reset");
        }
        for (key, sink) in sinks {
            let live = self.sinks.borrow().get(key).is_some_and(|s| Rc::ptr_eq(s, &sink));
            if live {
                sink(&change);
            }
        }
    }
}
impl<T: 'static> Drop for ListOutput<T> {
    fn drop(&mut self) {
        tracing::debug!(operator = self.name, "active list disposed");
    }
}

/// An observable, indexable list maintained by an operator.
///
/// Cloning the handle is cheap. The operator behind the list is disposed when the last
/// handle (including handles held by downstream operators) is dropped.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct ActiveList<T: 'static>(Rc<dyn ListNode<T>>);

impl<T: 'static> ActiveList<T> {
    pub(crate) fn from_node(node: Rc<dyn ListNode<T>>) -> Self {
        Self(node)
    }

    pub fn len(&self) -> usize {
        self.0.output().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the current items.
    ///
    /// Mutating an upstream source while the returned value is alive panics.
    pub fn borrow(&self) -> Items<'_, T> {
        Items::new(self.0.output().items())
    }
    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.borrow().get(index).cloned()
    }
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.borrow().as_slice().to_vec()
    }

    /// Registers `f` to be called with every change of this list.
    pub fn subscribe(&self, f: impl Fn(&ListChange<T>) + 'static) -> Subscription {
        self.0.output().subscribe(Rc::new(f))
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.output().subscriber_count()
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Subscribes a node through a weak reference so the source does not keep it alive.
    pub(crate) fn bind<N: 'static>(
        &self,
        this: &Weak<N>,
        f: impl Fn(&N, &ListChange<T>) + 'static,
    ) -> Subscription {
        let this = this.clone();
        self.subscribe(move |change| {
            if let Some(this) = this.upgrade() {
                f(&this, change)
            }
        })
    }
}
impl<T: Clone + 'static> From<Vec<T>> for ActiveList<T> {
    fn from(items: Vec<T>) -> Self {
        Self(Rc::new(ConstList {
            out: ListOutput::new("from_vec", items),
        }))
    }
}
impl<T: Clone + 'static> FromIterator<T> for ActiveList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
impl<T: Debug + 'static> Debug for ActiveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.output().items.try_borrow() {
            Ok(items) => Debug::fmt(&*items, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Serialize + 'static> Serialize for ActiveList<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.borrow().iter())
    }
}

/// A list that never changes after construction.
struct ConstList<T: 'static> {
    out: ListOutput<T>,
}
impl<T: 'static> ListNode<T> for ConstList<T> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}

/// Borrowed items of an [`ActiveList`].
pub struct Items<'a, T: 'static>(Ref<'a, QuickVec<T>>);

impl<'a, T: 'static> Items<'a, T> {
    pub(crate) fn new(items: Ref<'a, QuickVec<T>>) -> Self {
        Self(items)
    }
}
impl<T: 'static> Items<'_, T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, index: usize) -> Option<&T> {
        self.0.get(index)
    }
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.0.iter()
    }
    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }

    /// Changes on every mutation of the list.
    pub fn version(&self) -> u64 {
        self.0.version()
    }
}
impl<T: 'static> Index<usize> for Items<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}
impl<'a, T: 'static> IntoIterator for &'a Items<'_, T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
impl<T: Debug + 'static> Debug for Items<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
