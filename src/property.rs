use std::{any::Any, borrow::Cow, cell::RefCell, fmt, rc::Rc};

use derive_ex::Ex;
use slabmap::SlabMap;

use crate::Subscription;


pub type PropertyName = Cow<'static, str>;

/// Items that report in-place mutation of their properties.
pub trait NotifyPropertyChanged {
    /// Registers `f` to be called with the name of every property that changes.
    fn subscribe_property_changed(&self, f: Rc<dyn Fn(&str)>) -> Subscription;
}
impl<T: NotifyPropertyChanged + ?Sized> NotifyPropertyChanged for Rc<T> {
    fn subscribe_property_changed(&self, f: Rc<dyn Fn(&str)>) -> Subscription {
        (**self).subscribe_property_changed(f)
    }
}

/// Listener registry for item types implementing [`NotifyPropertyChanged`].
pub struct PropertyChanged(Rc<RefCell<SlabMap<Rc<dyn Fn(&str)>>>>);

impl PropertyChanged {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SlabMap::new())))
    }
    pub fn subscribe(&self, f: Rc<dyn Fn(&str)>) -> Subscription {
        let key = self.0.borrow_mut().insert(f);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |listeners| {
            listeners.borrow_mut().remove(key);
        })
    }

    /// Calls every listener with `name`.
    ///
    /// Listeners may subscribe or unsubscribe while being called. A listener removed by an
    /// earlier one is not called.
    pub fn notify(&self, name: &str) {
        let listeners: Vec<_> = self.0.borrow().iter().map(|(k, f)| (k, f.clone())).collect();
        for (key, f) in listeners {
            let live = self.0.borrow().get(key).is_some_and(|g| Rc::ptr_eq(g, &f));
            if live {
                f(name);
            }
        }
    }
    pub fn subscriber_count(&self) -> usize {
        self.0.borrow().len()
    }
}
impl Default for PropertyChanged {
    fn default() -> Self {
        Self::new()
    }
}
impl fmt::Debug for PropertyChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyChanged({})", self.subscriber_count())
    }
}

/// Infers which properties a selector reads.
///
/// Used to fill a [`Watched`] set from a selector instead of listing names by hand.
pub trait PropertyInference {
    fn infer(&self, selector: &dyn Any) -> Vec<PropertyName>;
}
impl<F: Fn(&dyn Any) -> Vec<PropertyName>> PropertyInference for F {
    fn infer(&self, selector: &dyn Any) -> Vec<PropertyName> {
        self(selector)
    }
}

/// Inference that never reports any property.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInference;

impl PropertyInference for NoInference {
    fn infer(&self, _selector: &dyn Any) -> Vec<PropertyName> {
        Vec::new()
    }
}

type ObserveFn<T> = dyn Fn(&T, Rc<dyn Fn(&str)>) -> Subscription;

/// The set of item properties whose change makes an operator re-evaluate that item.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct Watched<T: 'static> {
    properties: Rc<[PropertyName]>,
    observe: Option<Rc<ObserveFn<T>>>,
}

impl<T: 'static> Watched<T> {
    /// Watches nothing. Works for every item type.
    pub fn none() -> Self {
        Self {
            properties: Rc::from(Vec::new()),
            observe: None,
        }
    }

    pub fn new<S: Into<PropertyName>>(properties: impl IntoIterator<Item = S>) -> Self
    where
        T: NotifyPropertyChanged,
    {
        Self {
            properties: properties.into_iter().map(Into::into).collect(),
            observe: Some(Rc::new(|item: &T, f| item.subscribe_property_changed(f))),
        }
    }

    pub fn inferred(strategy: &dyn PropertyInference, selector: &dyn Any) -> Self
    where
        T: NotifyPropertyChanged,
    {
        Self::new(strategy.infer(selector))
    }

    pub fn properties(&self) -> &[PropertyName] {
        &self.properties
    }
    pub fn contains(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }
    pub fn is_active(&self) -> bool {
        self.observe.is_some() && !self.properties.is_empty()
    }

    /// Calls `on_change` whenever a watched property of `item` changes.
    pub(crate) fn observe(&self, item: &T, on_change: Rc<dyn Fn()>) -> Subscription {
        let Some(observe) = &self.observe else {
            return Subscription::empty();
        };
        if self.properties.is_empty() {
            return Subscription::empty();
        }
        let properties = self.properties.clone();
        observe(
            item,
            Rc::new(move |name: &str| {
                if properties.iter().any(|p| p == name) {
                    on_change()
                }
            }),
        )
    }
}
impl<T: 'static> Default for Watched<T> {
    fn default() -> Self {
        Self::none()
    }
}
impl<T: 'static> fmt::Debug for Watched<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.properties.iter()).finish()
    }
}
