use std::{cell::RefCell, collections::HashMap, fmt, hash::Hash, rc::Rc};

use derive_ex::Ex;
use serde::Serialize;

use crate::{
    list::{ListNode, ListOutput},
    utils::index_after_move,
    watcher::ItemWatcher,
    ActiveList, ListChange, Subscription, Watched,
};

#[cfg(test)]
mod tests;

impl<T: Clone + 'static> ActiveList<T> {
    /// Partitions items by `key`.
    ///
    /// Groups are ordered by the source position of their first item, and each group lists
    /// its items in source order. A group is removed when its last item leaves.
    pub fn group_by<K>(&self, key: impl Fn(&T) -> K + 'static) -> ActiveList<Grouping<K, T>>
    where
        K: Eq + Hash + Clone + 'static,
    {
        self.group_by_watched(key, Watched::none())
    }
    pub fn group_by_watched<K>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveList<Grouping<K, T>>
    where
        K: Eq + Hash + Clone + 'static,
    {
        ActiveList::from_node(GroupBy::new(self, key, watched))
    }

    /// Like [`group_by`](Self::group_by), with lookup by key.
    pub fn to_lookup<K>(&self, key: impl Fn(&T) -> K + 'static) -> ActiveLookup<K, T>
    where
        K: Eq + Hash + Clone + 'static,
    {
        self.to_lookup_watched(key, Watched::none())
    }
    pub fn to_lookup_watched<K>(
        &self,
        key: impl Fn(&T) -> K + 'static,
        watched: Watched<T>,
    ) -> ActiveLookup<K, T>
    where
        K: Eq + Hash + Clone + 'static,
    {
        let node = GroupBy::new(self, key, watched);
        ActiveLookup {
            groups: ActiveList::from_node(node.clone()),
            index: node,
        }
    }
}

/// Items sharing a key.
///
/// The items stop updating once the operator that produced the group is dropped.
#[derive(Ex)]
#[derive_ex(Clone(bound(K)))]
pub struct Grouping<K, T: 'static> {
    key: K,
    items: ActiveList<T>,
}

impl<K, T: 'static> Grouping<K, T> {
    pub fn key(&self) -> &K {
        &self.key
    }
    pub fn items(&self) -> &ActiveList<T> {
        &self.items
    }
}
impl<K: fmt::Debug, T: fmt::Debug + 'static> fmt::Debug for Grouping<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {:?}", self.key, self.items)
    }
}
impl<K: Serialize, T: Serialize + 'static> Serialize for Grouping<K, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Grouping", 2)?;
        s.serialize_field("key", &self.key)?;
        s.serialize_field("items", &self.items)?;
        s.end()
    }
}

/// Groups of an active list, addressable by key.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct ActiveLookup<K: 'static, T: 'static> {
    groups: ActiveList<Grouping<K, T>>,
    index: Rc<dyn GroupIndex<K, T>>,
}

impl<K: 'static, T: 'static> ActiveLookup<K, T> {
    pub fn get(&self, key: &K) -> Option<Grouping<K, T>> {
        self.index.find(key)
    }
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains(key)
    }
    pub fn len(&self) -> usize {
        self.groups.len()
    }
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
    pub fn groups(&self) -> &ActiveList<Grouping<K, T>> {
        &self.groups
    }
}
impl<K: fmt::Debug + 'static, T: fmt::Debug + 'static> fmt::Debug for ActiveLookup<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.groups, f)
    }
}

trait GroupIndex<K, T: 'static> {
    fn find(&self, key: &K) -> Option<Grouping<K, T>>;
    fn contains(&self, key: &K) -> bool;
}

struct GroupNode<T: 'static> {
    out: ListOutput<T>,
}
impl<T: 'static> ListNode<T> for GroupNode<T> {
    fn output(&self) -> &ListOutput<T> {
        &self.out
    }
}

fn grouping<K: Clone, T: 'static>(key: &K, node: &Rc<GroupNode<T>>) -> Grouping<K, T> {
    Grouping {
        key: key.clone(),
        items: ActiveList::from_node(node.clone()),
    }
}

struct Group<T: 'static> {
    node: Rc<GroupNode<T>>,
    /// Source indices of the members, ascending.
    members: Vec<usize>,
}

impl<T: 'static> Group<T> {
    fn new(members: Vec<usize>, items: Vec<T>) -> Self {
        Self {
            node: Rc::new(GroupNode {
                out: ListOutput::new("group", items),
            }),
            members,
        }
    }
    fn first(&self) -> usize {
        self.members[0]
    }
    /// Position within the group of the member at source `index`, or where it would go.
    fn slot(&self, index: usize) -> usize {
        self.members.partition_point(|&m| m < index)
    }
}

struct GroupBy<T: 'static, K: 'static, F> {
    out: ListOutput<Grouping<K, T>>,
    state: RefCell<GroupState<T, K>>,
    /// Group lists by key, read by [`ActiveLookup`] without touching `state`.
    by_key: RefCell<HashMap<K, Rc<GroupNode<T>>>>,
    key: F,
    _source: ActiveList<T>,
    _subscription: Subscription,
}

struct GroupState<T: 'static, K> {
    entries: Vec<Entry<T, K>>,
    groups: HashMap<K, Group<T>>,
    /// Keys in output order, which is the order of each group's first member.
    order: Vec<K>,
    watcher: ItemWatcher<T>,
}

struct Entry<T, K> {
    value: T,
    key: K,
}

impl<T: Clone + 'static, K: Eq + Hash + Clone> GroupState<T, K> {
    fn group(&self, key: &K) -> &Group<T> {
        match self.groups.get(key) {
            Some(g) => g,
            None => panic!("group of a held item is missing"),
        }
    }
    fn group_mut(&mut self, key: &K) -> &mut Group<T> {
        match self.groups.get_mut(key) {
            Some(g) => g,
            None => panic!("group of a held item is missing"),
        }
    }
    /// Output position of the group of `key`, or where it belongs if not yet in `order`.
    fn position(&self, key: &K) -> usize {
        let first = self.group(key).first();
        self.order
            .partition_point(|k| self.group(k).first() < first)
    }

    fn shift_inserted(&mut self, index: usize) {
        for g in self.groups.values_mut() {
            let from = g.slot(index);
            for m in &mut g.members[from..] {
                *m += 1;
            }
        }
    }
    fn shift_removed(&mut self, index: usize) {
        for g in self.groups.values_mut() {
            let from = g.slot(index + 1);
            for m in &mut g.members[from..] {
                *m -= 1;
            }
        }
    }
    /// Adjusts member indices for a move, with the moved member already taken out.
    fn shift_moved(&mut self, old_index: usize, new_index: usize) {
        let (lo, hi) = (old_index.min(new_index), old_index.max(new_index));
        for g in self.groups.values_mut() {
            let (from, to) = (g.slot(lo), g.slot(hi + 1));
            for m in &mut g.members[from..to] {
                *m = index_after_move(*m, old_index, new_index);
            }
        }
    }

    /// Keys in output order with their members and items, for the current entries.
    fn partition(&self) -> Vec<(K, Vec<usize>, Vec<T>)> {
        let mut slots = HashMap::new();
        let mut groups: Vec<(K, Vec<usize>, Vec<T>)> = Vec::new();
        for (index, e) in self.entries.iter().enumerate() {
            let slot = *slots.entry(e.key.clone()).or_insert_with(|| {
                groups.push((e.key.clone(), Vec::new(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(index);
            groups[slot].2.push(e.value.clone());
        }
        groups
    }
}

impl<T, K, F> GroupBy<T, K, F>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
    F: Fn(&T) -> K + 'static,
{
    fn new(source: &ActiveList<T>, key: F, watched: Watched<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let mut watcher = ItemWatcher::new(watched, this, Self::on_item_changed);
            let items = source.to_vec();
            watcher.reset(items.iter());
            let mut state = GroupState {
                entries: items
                    .into_iter()
                    .map(|value| Entry {
                        key: key(&value),
                        value,
                    })
                    .collect(),
                groups: HashMap::new(),
                order: Vec::new(),
                watcher,
            };
            for (key, members, items) in state.partition() {
                state.groups.insert(key.clone(), Group::new(members, items));
                state.order.push(key);
            }
            let by_key = state
                .groups
                .iter()
                .map(|(k, g)| (k.clone(), g.node.clone()))
                .collect();
            let groupings = state
                .order
                .iter()
                .map(|k| grouping(k, &state.group(k).node))
                .collect();
            Self {
                out: ListOutput::new("group_by", groupings),
                state: RefCell::new(state),
                by_key: RefCell::new(by_key),
                key,
                _source: source.clone(),
                _subscription: source.bind(this, Self::on_change),
            }
        })
    }

    fn on_change(&self, change: &ListChange<T>) {
        let s = &mut *self.state.borrow_mut();
        match change {
            ListChange::Insert { index, new_value } => {
                s.watcher.insert(*index, new_value);
                let key = (self.key)(new_value);
                self.attach(s, *index, new_value.clone(), key);
            }
            ListChange::Remove { index, .. } => {
                s.watcher.remove(*index);
                self.detach(s, *index);
            }
            ListChange::Set {
                index, new_value, ..
            } => {
                s.watcher.set(*index, new_value);
                let key = (self.key)(new_value);
                if key == s.entries[*index].key {
                    s.entries[*index].value = new_value.clone();
                    let group = s.group(&key);
                    group.node.out.set(group.slot(*index), new_value.clone());
                } else {
                    self.detach(s, *index);
                    self.attach(s, *index, new_value.clone(), key);
                }
            }
            ListChange::Move {
                old_index,
                new_index,
                ..
            } => {
                s.watcher.move_item(*old_index, *new_index);
                self.move_entry(s, *old_index, *new_index);
            }
            ListChange::Reset { new_items } => {
                s.watcher.reset(new_items.iter());
                s.entries = new_items
                    .iter()
                    .map(|value| Entry {
                        key: (self.key)(value),
                        value: value.clone(),
                    })
                    .collect();
                self.reset_groups(s);
            }
        }
    }

    fn attach(&self, s: &mut GroupState<T, K>, index: usize, value: T, key: K) {
        let old_position = s.groups.contains_key(&key).then(|| s.position(&key));
        s.shift_inserted(index);
        s.entries.insert(
            index,
            Entry {
                value: value.clone(),
                key: key.clone(),
            },
        );
        match old_position {
            Some(old_position) => {
                let group = s.group_mut(&key);
                let member = group.slot(index);
                group.members.insert(member, index);
                group.node.out.insert(member, value);
                self.reposition(s, key, old_position);
            }
            None => {
                let group = Group::new(vec![index], vec![value]);
                let node = group.node.clone();
                s.groups.insert(key.clone(), group);
                let position = s.position(&key);
                s.order.insert(position, key.clone());
                self.by_key.borrow_mut().insert(key.clone(), node.clone());
                self.out.insert(position, grouping(&key, &node));
            }
        }
    }
    fn detach(&self, s: &mut GroupState<T, K>, index: usize) {
        let key = s.entries[index].key.clone();
        let position = s.position(&key);
        let group = s.group_mut(&key);
        let member = group.slot(index);
        group.members.remove(member);
        group.node.out.remove(member);
        let emptied = group.members.is_empty();
        s.entries.remove(index);
        s.shift_removed(index);
        if emptied {
            s.groups.remove(&key);
            s.order.remove(position);
            self.by_key.borrow_mut().remove(&key);
            self.out.remove(position);
        } else {
            self.reposition(s, key, position);
        }
    }
    fn move_entry(&self, s: &mut GroupState<T, K>, old_index: usize, new_index: usize) {
        let key = s.entries[old_index].key.clone();
        let position = s.position(&key);
        let group = s.group_mut(&key);
        let old_member = group.slot(old_index);
        group.members.remove(old_member);
        s.shift_moved(old_index, new_index);
        let entry = s.entries.remove(old_index);
        s.entries.insert(new_index, entry);
        let group = s.group_mut(&key);
        let new_member = group.slot(new_index);
        group.members.insert(new_member, new_index);
        group.node.out.move_item(old_member, new_member);
        self.reposition(s, key, position);
    }
    /// Moves the group of `key` from `old_position` to where its first member now puts it.
    fn reposition(&self, s: &mut GroupState<T, K>, key: K, old_position: usize) {
        s.order.remove(old_position);
        let new_position = s.position(&key);
        s.order.insert(new_position, key);
        self.out.move_item(old_position, new_position);
    }

    /// Rebuilds the groups, reusing the group of every key that is still present.
    fn reset_groups(&self, s: &mut GroupState<T, K>) {
        let mut old_groups = std::mem::take(&mut s.groups);
        let old_order = std::mem::take(&mut s.order);
        for (key, members, items) in s.partition() {
            let group = match old_groups.remove(&key) {
                Some(mut group) => {
                    group.members = members;
                    group.node.out.reset(items);
                    group
                }
                None => Group::new(members, items),
            };
            s.groups.insert(key.clone(), group);
            s.order.push(key);
        }
        for key in &old_order {
            if let Some(group) = old_groups.remove(key) {
                group.node.out.reset(Vec::new());
            }
        }
        *self.by_key.borrow_mut() = s
            .groups
            .iter()
            .map(|(k, g)| (k.clone(), g.node.clone()))
            .collect();
        self.out.reset(
            s.order
                .iter()
                .map(|k| grouping(k, &s.group(k).node))
                .collect(),
        );
    }

    fn on_item_changed(&self, watch_key: usize) {
        let s = &mut *self.state.borrow_mut();
        let Some(index) = s.watcher.index_of(watch_key) else {
            return;
        };
        let value = s.entries[index].value.clone();
        let key = (self.key)(&value);
        if key != s.entries[index].key {
            self.detach(s, index);
            self.attach(s, index, value, key);
        }
    }
}
impl<T: 'static, K: 'static, F: 'static> ListNode<Grouping<K, T>> for GroupBy<T, K, F> {
    fn output(&self) -> &ListOutput<Grouping<K, T>> {
        &self.out
    }
}
impl<T, K, F> GroupIndex<K, T> for GroupBy<T, K, F>
where
    T: 'static,
    K: Eq + Hash + Clone + 'static,
    F: 'static,
{
    fn find(&self, key: &K) -> Option<Grouping<K, T>> {
        self.by_key.borrow().get(key).map(|node| grouping(key, node))
    }
    fn contains(&self, key: &K) -> bool {
        self.by_key.borrow().contains_key(key)
    }
}
