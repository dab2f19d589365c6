use std::{fmt, marker::PhantomData, ops::RangeBounds, rc::Rc};

use derive_ex::Ex;
use serde::{Deserialize, Serialize};

use crate::{
    list::{ListNode, ListOutput},
    utils::to_range,
    ActiveList, Error, Items, ListChange, Result, Subscription,
};


/// A mutable list that reports every mutation to its subscribers.
///
/// This is the root of an operator graph. Each mutating call returns only after every
/// downstream operator has processed the change.
#[derive(Ex)]
#[derive_ex(Clone(bound()), Default)]
#[default(Self::new())]
pub struct StateList<T: 'static>(Rc<StateListNode<T>>);

struct StateListNode<T: 'static> {
    out: ListOutput<T>,
}
impl<T: 'static> ListNode<T> for StateListNode<T> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}

impl<T: 'static> StateList<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }
    pub fn from_vec(items: Vec<T>) -> Self {
        Self(Rc::new(StateListNode {
            out: ListOutput::new("state", items),
        }))
    }
    pub fn to_active_list(&self) -> ActiveList<T> {
        ActiveList::from_node(self.0.clone())
    }

    pub fn len(&self) -> usize {
        self.0.out.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the current items.
    ///
    /// Mutating the list while the returned value is alive panics.
    pub fn borrow(&self) -> Items<'_, T> {
        Items::new(self.0.out.items())
    }
    pub fn subscribe(&self, f: impl Fn(&ListChange<T>) + 'static) -> Subscription {
        self.0.out.subscribe(Rc::new(f))
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.out.subscriber_count()
    }
}

impl<T: Clone + 'static> StateList<T> {
    pub fn get(&self, index: usize) -> Option<T> {
        self.0.out.items().get(index).cloned()
    }
    pub fn to_vec(&self) -> Vec<T> {
        self.0.out.items().as_slice().to_vec()
    }

    /// Inserts `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, value: T) {
        self.0.out.insert(index, value);
    }
    pub fn push(&self, value: T) {
        self.insert(self.len(), value);
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&self, index: usize) -> T {
        self.0.out.remove(index)
    }

    /// Replaces the item at `index` and returns the previous one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, value: T) -> T {
        self.0.out.set(index, value)
    }

    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn move_item(&self, old_index: usize, new_index: usize) {
        self.0.out.move_item(old_index, new_index);
    }
    pub fn swap(&self, index0: usize, index1: usize) {
        if index0 == index1 {
            return;
        }
        let (lo, hi) = (index0.min(index1), index0.max(index1));
        self.move_item(hi, lo);
        self.move_item(lo + 1, hi);
    }

    /// Removes the items in `range`, last one first.
    pub fn drain(&self, range: impl RangeBounds<usize>) {
        let range = to_range(range, self.len());
        for index in range.rev() {
            self.remove(index);
        }
    }
    pub fn clear(&self) {
        self.reset(Vec::new());
    }

    /// Replaces all items, reported as a single `Reset`.
    pub fn reset(&self, items: impl IntoIterator<Item = T>) {
        self.0.out.reset(items.into_iter().collect());
    }

    pub fn try_insert(&self, index: usize, value: T) -> Result<()> {
        let len = self.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        self.insert(index, value);
        Ok(())
    }
    pub fn try_remove(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        Ok(self.remove(index))
    }
    pub fn try_set(&self, index: usize, value: T) -> Result<T> {
        self.check_index(index)?;
        Ok(self.set(index, value))
    }
    pub fn try_move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        let len = self.len();
        if old_index >= len || new_index >= len {
            return Err(Error::MoveOutOfRange {
                old_index,
                new_index,
                len,
            });
        }
        self.move_item(old_index, new_index);
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index < len {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange { index, len })
        }
    }
}
impl<T: Clone + 'static> Extend<T> for StateList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value)
        }
    }
}
impl<T: Clone + 'static> FromIterator<T> for StateList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
impl<T: fmt::Debug + 'static> fmt::Debug for StateList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_active_list(), f)
    }
}
impl<T: Serialize + 'static> Serialize for StateList<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.out.items().iter())
    }
}
impl<'de, T: Deserialize<'de> + 'static> Deserialize<'de> for StateList<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct StateListVisitor<T>(PhantomData<fn(T)>);
        impl<'de, T: Deserialize<'de> + 'static> serde::de::Visitor<'de> for StateListVisitor<T> {
            type Value = StateList<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("sequence")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(value) = seq.next_element()? {
                    items.push(value)
                }
                Ok(StateList::from_vec(items))
            }
        }
        deserializer.deserialize_seq(StateListVisitor(PhantomData))
    }
}
