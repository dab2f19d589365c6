use std::{cmp::Ordering, iter::Sum, rc::Rc};

use crate::{
    value::{ValueNode, ValueOutput},
    ActiveList, ActiveValue, ListChange, Subscription, Watched,
};

#[cfg(test)]
mod tests;

impl<T: Clone + 'static> ActiveList<T> {
    /// Number of items. Updated by one per insert or remove.
    pub fn count(&self) -> ActiveValue<usize> {
        self.fold("count", |items| items.len(), |count, change, _| match change {
            ListChange::Insert { .. } => count + 1,
            ListChange::Remove { .. } => count - 1,
            ListChange::Reset { new_items } => new_items.len(),
            ListChange::Set { .. } | ListChange::Move { .. } => *count,
        })
    }
    pub fn count_where(&self, predicate: impl Fn(&T) -> bool + 'static) -> ActiveValue<usize> {
        self.filter(predicate).count()
    }
    pub fn count_where_watched(
        &self,
        predicate: impl Fn(&T) -> bool + 'static,
        watched: Watched<T>,
    ) -> ActiveValue<usize> {
        self.filter_watched(predicate, watched).count()
    }

    /// Whether any item satisfies `predicate`.
    pub fn any(&self, predicate: impl Fn(&T) -> bool + 'static) -> ActiveValue<bool> {
        self.any_watched(predicate, Watched::none())
    }
    pub fn any_watched(
        &self,
        predicate: impl Fn(&T) -> bool + 'static,
        watched: Watched<T>,
    ) -> ActiveValue<bool> {
        self.count_where_watched(predicate, watched).map(|n| *n > 0)
    }

    /// Whether every item satisfies `predicate`. `true` for an empty list.
    pub fn all(&self, predicate: impl Fn(&T) -> bool + 'static) -> ActiveValue<bool> {
        self.all_watched(predicate, Watched::none())
    }
    pub fn all_watched(
        &self,
        predicate: impl Fn(&T) -> bool + 'static,
        watched: Watched<T>,
    ) -> ActiveValue<bool> {
        self.count_where_watched(move |x| !predicate(x), watched)
            .map(|n| *n == 0)
    }

    pub fn contains(&self, value: T) -> ActiveValue<bool>
    where
        T: PartialEq,
    {
        self.any(move |x| *x == value)
    }

    /// Folds the items with `f`, starting from `seed`, after every change.
    pub fn aggregate<A>(&self, seed: A, f: impl Fn(A, &T) -> A + 'static) -> ActiveValue<A>
    where
        A: PartialEq + Clone + 'static,
    {
        let f = Rc::new(f);
        let init = move |items: &[T]| items.iter().fold(seed.clone(), |a, x| f(a, x));
        let fold = init.clone();
        self.fold("aggregate", init, move |_, _, items| fold(items))
    }
    /// Like [`aggregate`](Self::aggregate), with `eq` deciding whether a new result is a
    /// change.
    pub fn aggregate_with<A>(
        &self,
        seed: A,
        f: impl Fn(A, &T) -> A + 'static,
        eq: impl Fn(&A, &A) -> bool + 'static,
    ) -> ActiveValue<A>
    where
        A: Clone + 'static,
    {
        let f = Rc::new(f);
        let init = move |items: &[T]| items.iter().fold(seed.clone(), |a, x| f(a, x));
        let fold = init.clone();
        let out = |value: A| ValueOutput::with_eq("aggregate", value, eq);
        ActiveValue::from_node(Fold::new(self, out, init, move |_, _, items| fold(items)))
    }

    pub fn sum(&self) -> ActiveValue<T>
    where
        T: Sum<T> + PartialEq,
    {
        let sum = |items: &[T]| items.iter().cloned().sum::<T>();
        self.fold("sum", sum, move |_, _, items| sum(items))
    }

    /// The smallest item, or `None` when empty.
    pub fn min(&self) -> ActiveValue<Option<T>>
    where
        T: Ord,
    {
        self.extreme("min", Ordering::Less)
    }
    /// The largest item, or `None` when empty.
    pub fn max(&self) -> ActiveValue<Option<T>>
    where
        T: Ord,
    {
        self.extreme("max", Ordering::Greater)
    }
    /// Keeps the item that compares as `wins` against all others. Rescans only when the
    /// current extreme leaves.
    fn extreme(&self, name: &'static str, wins: Ordering) -> ActiveValue<Option<T>>
    where
        T: Ord,
    {
        let scan = move |items: &[T]| {
            items
                .iter()
                .fold(None, |acc: Option<&T>, x| match acc {
                    Some(a) if a.cmp(x) != wins.reverse() => Some(a),
                    _ => Some(x),
                })
                .cloned()
        };
        let better = move |current: &Option<T>, x: &T| match current {
            Some(c) => x.cmp(c) == wins,
            None => true,
        };
        self.fold(name, scan, move |current, change, items| match change {
            ListChange::Insert { new_value, .. } => {
                if better(current, new_value) {
                    Some(new_value.clone())
                } else {
                    current.clone()
                }
            }
            ListChange::Remove { old_value, .. } => {
                if current.as_ref() == Some(old_value) {
                    scan(items)
                } else {
                    current.clone()
                }
            }
            ListChange::Set {
                old_value,
                new_value,
                ..
            } => {
                if current.as_ref() == Some(old_value) {
                    scan(items)
                } else if better(current, new_value) {
                    Some(new_value.clone())
                } else {
                    current.clone()
                }
            }
            ListChange::Move { .. } => current.clone(),
            ListChange::Reset { .. } => scan(items),
        })
    }

    pub fn first(&self) -> ActiveValue<Option<T>>
    where
        T: PartialEq,
    {
        let first = |items: &[T]| items.first().cloned();
        self.fold("first", first, move |_, _, items| first(items))
    }
    pub fn last(&self) -> ActiveValue<Option<T>>
    where
        T: PartialEq,
    {
        let last = |items: &[T]| items.last().cloned();
        self.fold("last", last, move |_, _, items| last(items))
    }
    /// The item at `index`, or `None` while the list is shorter.
    pub fn element_at(&self, index: usize) -> ActiveValue<Option<T>>
    where
        T: PartialEq,
    {
        let at = move |items: &[T]| items.get(index).cloned();
        self.fold("element_at", at, move |_, _, items| at(items))
    }

    /// Whether both lists hold equal items in the same order.
    pub fn sequence_equal(&self, other: &ActiveList<T>) -> ActiveValue<bool>
    where
        T: PartialEq,
    {
        ActiveValue::from_node(SequenceEqual::new(self, other))
    }

    /// A value maintained by `update`, which receives the current value, the change, and
    /// the items after the change.
    fn fold<V>(
        &self,
        name: &'static str,
        init: impl FnOnce(&[T]) -> V,
        update: impl Fn(&V, &ListChange<T>, &[T]) -> V + 'static,
    ) -> ActiveValue<V>
    where
        V: PartialEq + Clone + 'static,
    {
        let out = |value: V| ValueOutput::new(name, value);
        ActiveValue::from_node(Fold::new(self, out, init, update))
    }
}

struct Fold<T: 'static, V: 'static, F> {
    out: ValueOutput<V>,
    source: ActiveList<T>,
    update: F,
    _subscription: Subscription,
}

impl<T, V, F> Fold<T, V, F>
where
    T: Clone + 'static,
    V: Clone + 'static,
    F: Fn(&V, &ListChange<T>, &[T]) -> V + 'static,
{
    fn new(
        source: &ActiveList<T>,
        out: impl FnOnce(V) -> ValueOutput<V>,
        init: impl FnOnce(&[T]) -> V,
        update: F,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            out: out(init(source.borrow().as_slice())),
            source: source.clone(),
            update,
            _subscription: source.bind(this, Self::on_change),
        })
    }
    fn on_change(&self, change: &ListChange<T>) {
        let value = {
            let current = self.out.borrow();
            (self.update)(&current, change, self.source.borrow().as_slice())
        };
        self.out.set(value);
    }
}
impl<T: 'static, V: 'static, F: 'static> ValueNode<V> for Fold<T, V, F> {
    fn output(&self) -> &ValueOutput<V> {
        &self.out
    }
}

struct SequenceEqual<T: 'static> {
    out: ValueOutput<bool>,
    sources: [ActiveList<T>; 2],
    _subscriptions: [Subscription; 2],
}
impl<T: PartialEq + Clone + 'static> SequenceEqual<T> {
    fn new(first: &ActiveList<T>, second: &ActiveList<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            out: ValueOutput::new(
                "sequence_equal",
                first.borrow().as_slice() == second.borrow().as_slice(),
            ),
            sources: [first.clone(), second.clone()],
            _subscriptions: [
                first.bind(this, |this: &Self, _| this.refresh()),
                second.bind(this, |this: &Self, _| this.refresh()),
            ],
        })
    }
    fn refresh(&self) {
        let [a, b] = &self.sources;
        let equal = a.borrow().as_slice() == b.borrow().as_slice();
        self.out.set(equal);
    }
}
impl<T: 'static> ValueNode<bool> for SequenceEqual<T> {
    fn output(&self) -> &ValueOutput<bool> {
        &self.out
    }
}
