use parse_display::Display;

/// A single mutation reported by an active list.
///
/// Indices refer to the list after the change was applied, except for `Remove`
/// whose index refers to the list before the removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange<T> {
    Insert {
        index: usize,
        new_value: T,
    },
    Remove {
        index: usize,
        old_value: T,
    },
    Set {
        index: usize,
        old_value: T,
        new_value: T,
    },
    Move {
        old_index: usize,
        new_index: usize,
        value: T,
    },
    Reset {
        new_items: Vec<T>,
    },
}

impl<T> ListChange<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ListChange::Insert { .. } => ChangeKind::Insert,
            ListChange::Remove { .. } => ChangeKind::Remove,
            ListChange::Set { .. } => ChangeKind::Set,
            ListChange::Move { .. } => ChangeKind::Move,
            ListChange::Reset { .. } => ChangeKind::Reset,
        }
    }

    /// Applies this change to a plain vector.
    ///
    /// Useful for mirroring an active list outside of the operator graph.
    pub fn apply_to(&self, items: &mut Vec<T>)
    where
        T: Clone,
    {
        match self {
            ListChange::Insert { index, new_value } => items.insert(*index, new_value.clone()),
            ListChange::Remove { index, .. } => {
                items.remove(*index);
            }
            ListChange::Set {
                index, new_value, ..
            } => items[*index] = new_value.clone(),
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                let value = items.remove(*old_index);
                items.insert(*new_index, value);
            }
            ListChange::Reset { new_items } => *items = new_items.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum ChangeKind {
    Insert,
    Remove,
    Set,
    Move,
    Reset,
}

/// A change of an [`ActiveValue`](crate::ActiveValue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChange<T> {
    pub old_value: T,
    pub new_value: T,
}
