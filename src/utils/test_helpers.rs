use std::{cell::Cell, fmt, rc::Rc};

use crate::{ActiveList, ListChange, NotifyPropertyChanged, PropertyChanged, Subscription, Watched};

/// An item with one observable property named `value`.
pub struct Item {
    value: Cell<i32>,
    changed: PropertyChanged,
}

impl Item {
    pub fn new(value: i32) -> Rc<Self> {
        Rc::new(Self {
            value: Cell::new(value),
            changed: PropertyChanged::new(),
        })
    }
    pub fn get(&self) -> i32 {
        self.value.get()
    }
    pub fn set(&self, value: i32) {
        if self.value.replace(value) != value {
            self.changed.notify("value");
        }
    }
    pub fn listeners(&self) -> usize {
        self.changed.subscriber_count()
    }
}
impl NotifyPropertyChanged for Item {
    fn subscribe_property_changed(&self, f: Rc<dyn Fn(&str)>) -> Subscription {
        self.changed.subscribe(f)
    }
}
impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

pub fn watch_value() -> Watched<Rc<Item>> {
    Watched::new(["value"])
}

pub fn values(items: &[Rc<Item>]) -> Vec<i32> {
    items.iter().map(|x| x.get()).collect()
}

/// Records every change of `list` as a compact string through `assert_call`.
pub fn record<T: fmt::Debug + 'static>(list: &ActiveList<T>) -> Subscription {
    list.subscribe(|change| assert_call::call!("{}", describe(change)))
}

pub fn describe<T: fmt::Debug>(change: &ListChange<T>) -> String {
    match change {
        ListChange::Insert { index, new_value } => format!("insert {index} {new_value:?}"),
        ListChange::Remove { index, old_value } => format!("remove {index} {old_value:?}"),
        ListChange::Set {
            index,
            old_value,
            new_value,
        } => format!("set {index} {old_value:?} {new_value:?}"),
        ListChange::Move {
            old_index,
            new_index,
            value,
        } => format!("move {old_index} {new_index} {value:?}"),
        ListChange::Reset { new_items } => format!("reset {new_items:?}"),
    }
}
