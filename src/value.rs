use std::{
    cell::{Ref, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use serde::Serialize;
use slabmap::SlabMap;

use crate::{Subscription, ValueChange, Watched};


type Sink<T> = Rc<dyn Fn(&ValueChange<T>)>;
type EqFn<T> = Box<dyn Fn(&T, &T) -> bool>;

pub(crate) trait ValueNode<T: 'static> {
    fn output(&self) -> &ValueOutput<T>;
}

/// Current value and listeners of an active value.
pub(crate) struct ValueOutput<T: 'static> {
    name: &'static str,
    value: RefCell<T>,
    eq: EqFn<T>,
    sinks: Rc<RefCell<SlabMap<Sink<T>>>>,
}

impl<T: 'static> ValueOutput<T> {
    pub fn new(name: &'static str, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_eq(name, value, |a: &T, b: &T| a == b)
    }
    /// An output that treats values as unchanged when `eq` returns `true`.
    pub fn with_eq(name: &'static str, value: T, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        tracing::debug!(operator = name, "active value created");
        Self {
            name,
            value: RefCell::new(value),
            eq: Box::new(eq),
            sinks: Rc::new(RefCell::new(SlabMap::new())),
        }
    }
    pub fn borrow(&self) -> Ref<'_, T> {
        self.value.borrow()
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
impl<T: Clone + 'static> ValueOutput<T> {
    /// Stores `new_value` and notifies if it differs from the current value.
    pub fn set(&self, new_value: T) {
        let old_value = {
            let mut value = self.value.borrow_mut();
            if (self.eq)(&*value, &new_value) {
                return;
            }
            std::mem::replace(&mut *value, new_value.clone())
        };
        let change = ValueChange {
            old_value,
            new_value,
        };
        let sinks: Vec<_> = self.sinks.borrow().iter().map(|(k, f)| (k, f.clone())).collect();
        for (key, sink) in sinks {
            let live = self.sinks.borrow().get(key).is_some_and(|s| Rc::ptr_eq(s, &sink));
            if live {
                sink(&change);
            }
        }
    }
}
impl<T: 'static> Drop for ValueOutput<T> {
    fn drop(&mut self) {
        tracing::debug!(operator = self.name, "active value disposed");
    }
}

/// An observable single value derived from active lists or items.
///
/// Subscribers are notified only when the value actually changes.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct ActiveValue<T: 'static>(Rc<dyn ValueNode<T>>);

impl<T: 'static> ActiveValue<T> {
    pub(crate) fn from_node(node: Rc<dyn ValueNode<T>>) -> Self {
        Self(node)
    }

    /// A value that never changes.
    pub fn constant(value: T) -> Self {
        Self(Rc::new(Constant {
            // never set, so the comparison is unused
            out: ValueOutput::with_eq("constant", value, |_, _| true),
        }))
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.output().borrow().clone()
    }
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.output().borrow()
    }
    pub fn subscribe(&self, f: impl Fn(&ValueChange<T>) + 'static) -> Subscription {
        self.0.output().subscribe(Rc::new(f))
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.output().subscriber_count()
    }

    pub(crate) fn bind<N: 'static>(
        &self,
        this: &Weak<N>,
        f: impl Fn(&N, &ValueChange<T>) + 'static,
    ) -> Subscription {
        let this = this.clone();
        self.subscribe(move |change| {
            if let Some(this) = this.upgrade() {
                f(&this, change)
            }
        })
    }

    /// Applies `f` to the value, recomputing it on every change.
    pub fn map<U>(&self, f: impl Fn(&T) -> U + 'static) -> ActiveValue<U>
    where
        U: PartialEq + Clone + 'static,
    {
        self.map_watched(f, Watched::none())
    }

    /// Like [`map`](Self::map), and also recomputes when a property in `watched` of the
    /// held value changes.
    ///
    /// Only the value currently held is observed. When the source switches to another
    /// value, the previous one is released.
    pub fn map_watched<U>(
        &self,
        f: impl Fn(&T) -> U + 'static,
        watched: Watched<T>,
    ) -> ActiveValue<U>
    where
        U: PartialEq + Clone + 'static,
    {
        self.map_with_watched(f, |a: &U, b: &U| a == b, watched)
    }

    /// Like [`map`](Self::map), with `eq` deciding whether a recomputed value is a change.
    pub fn map_with<U>(
        &self,
        f: impl Fn(&T) -> U + 'static,
        eq: impl Fn(&U, &U) -> bool + 'static,
    ) -> ActiveValue<U>
    where
        U: Clone + 'static,
    {
        self.map_with_watched(f, eq, Watched::none())
    }
    pub fn map_with_watched<U>(
        &self,
        f: impl Fn(&T) -> U + 'static,
        eq: impl Fn(&U, &U) -> bool + 'static,
        watched: Watched<T>,
    ) -> ActiveValue<U>
    where
        U: Clone + 'static,
    {
        ActiveValue::from_node(MapValue::new(self, f, eq, watched))
    }
}
impl<T: fmt::Debug + 'static> fmt::Debug for ActiveValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.output().value.try_borrow() {
            Ok(value) => fmt::Debug::fmt(&*value, f),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Serialize + 'static> Serialize for ActiveValue<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.borrow().serialize(serializer)
    }
}

struct Constant<T: 'static> {
    out: ValueOutput<T>,
}
impl<T: 'static> ValueNode<T> for Constant<T> {
    fn output(&self) -> &ValueOutput<T> {
        &self.out
    }
}

struct MapValue<T: 'static, U: 'static, F> {
    out: ValueOutput<U>,
    f: F,
    source: ActiveValue<T>,
    watched: Watched<T>,
    this: Weak<Self>,
    held: RefCell<Subscription>,
    _subscription: Subscription,
}
impl<T, U, F> MapValue<T, U, F>
where
    T: 'static,
    U: Clone + 'static,
    F: Fn(&T) -> U + 'static,
{
    fn new(
        source: &ActiveValue<T>,
        f: F,
        eq: impl Fn(&U, &U) -> bool + 'static,
        watched: Watched<T>,
    ) -> Rc<Self> {
        let this = Rc::new_cyclic(|this| Self {
            out: ValueOutput::with_eq("map", f(&source.borrow()), eq),
            f,
            source: source.clone(),
            watched,
            this: this.clone(),
            held: RefCell::new(Subscription::empty()),
            _subscription: source.bind(this, |this: &Self, _| {
                this.observe_held();
                this.refresh();
            }),
        });
        this.observe_held();
        this
    }

    /// Moves the property subscription to the value the source holds now.
    fn observe_held(&self) {
        let this = self.this.clone();
        let subscription = self.watched.observe(
            &self.source.borrow(),
            Rc::new(move || {
                if let Some(this) = this.upgrade() {
                    this.refresh();
                }
            }),
        );
        *self.held.borrow_mut() = subscription;
    }
    fn refresh(&self) {
        let value = (self.f)(&self.source.borrow());
        self.out.set(value);
    }
}
impl<T: 'static, U: 'static, F: 'static> ValueNode<U> for MapValue<T, U, F> {
    fn output(&self) -> &ValueOutput<U> {
        &self.out
    }
}

/// A value read from `item` by `getter`, refreshed when a property in `watched` changes.
pub fn to_active_value<T, V>(
    item: T,
    getter: impl Fn(&T) -> V + 'static,
    watched: Watched<T>,
) -> ActiveValue<V>
where
    T: 'static,
    V: PartialEq + Clone + 'static,
{
    to_active_value_with(item, getter, |a: &V, b: &V| a == b, watched)
}

/// Like [`to_active_value`], with `eq` deciding whether a re-read value is a change.
///
/// Useful for values without [`PartialEq`] or to compare by identity, such as
/// `Rc::ptr_eq`.
pub fn to_active_value_with<T, V>(
    item: T,
    getter: impl Fn(&T) -> V + 'static,
    eq: impl Fn(&V, &V) -> bool + 'static,
    watched: Watched<T>,
) -> ActiveValue<V>
where
    T: 'static,
    V: Clone + 'static,
{
    ActiveValue::from_node(ItemValue::new(item, getter, eq, watched))
}

struct ItemValue<T: 'static, V: 'static, F> {
    out: ValueOutput<V>,
    item: T,
    getter: F,
    subscription: RefCell<Subscription>,
}
impl<T, V, F> ItemValue<T, V, F>
where
    T: 'static,
    V: Clone + 'static,
    F: Fn(&T) -> V + 'static,
{
    fn new(
        item: T,
        getter: F,
        eq: impl Fn(&V, &V) -> bool + 'static,
        watched: Watched<T>,
    ) -> Rc<Self> {
        let this = Rc::new(Self {
            out: ValueOutput::with_eq("item_value", getter(&item), eq),
            item,
            getter,
            subscription: RefCell::new(Subscription::empty()),
        });
        let weak = Rc::downgrade(&this);
        let subscription = watched.observe(
            &this.item,
            Rc::new(move || {
                if let Some(this) = weak.upgrade() {
                    this.out.set((this.getter)(&this.item));
                }
            }),
        );
        *this.subscription.borrow_mut() = subscription;
        this
    }
}
impl<T: 'static, V: 'static, F: 'static> ValueNode<V> for ItemValue<T, V, F> {
    fn output(&self) -> &ValueOutput<V> {
        &self.out
    }
}
