//! Randomized checks that every operator stays equal to its bulk counterpart.
//!
//! Two source lists of property-notifying items are mutated at random. After every single
//! step each operator's output is compared with the same operation computed from scratch
//! over a snapshot of the sources, and every item's listener count is checked.

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    fmt,
    rc::Rc,
};

use active_list::{
    ActiveList, ActiveLookup, ActiveValue, Grouping, ListChange, NotifyPropertyChanged,
    PropertyChanged, StateList, Subscription, Watched,
};
use proptest::prelude::*;

struct Item {
    id: usize,
    value: Cell<i32>,
    changed: PropertyChanged,
}
impl Item {
    fn get(&self) -> i32 {
        self.value.get()
    }
    fn set(&self, value: i32) {
        if self.value.replace(value) != value {
            self.changed.notify("value");
        }
    }
    fn listeners(&self) -> usize {
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
        write!(f, "#{}={}", self.id, self.get())
    }
}

type P = Rc<Item>;
type Row = (usize, i32);

fn watched() -> Watched<P> {
    Watched::new(["value"])
}
fn group_key(x: &P) -> i32 {
    x.get() % 3
}

#[derive(Debug, Clone)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Set(usize, i32),
    Move(usize, usize),
    Reset(Vec<i32>),
    Mutate(usize, i32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<usize>(), 0..6i32).prop_map(|(i, v)| Op::Insert(i, v)),
        2 => any::<usize>().prop_map(Op::Remove),
        2 => (any::<usize>(), 0..6i32).prop_map(|(i, v)| Op::Set(i, v)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Op::Move(i, j)),
        1 => prop::collection::vec(0..6i32, 0..6).prop_map(Op::Reset),
        3 => (any::<usize>(), 0..6i32).prop_map(|(i, v)| Op::Mutate(i, v)),
    ]
}

/// An operation on one of the two sources.
fn step() -> impl Strategy<Value = (bool, Op)> {
    (any::<bool>(), op())
}

fn initial() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(0..6i32, 1..8)
}

#[derive(Default)]
struct Sources {
    a: StateList<P>,
    b: StateList<P>,
    created: Vec<P>,
}

impl Sources {
    fn new(a: &[i32], b: &[i32]) -> Self {
        let mut this = Self::default();
        let a: Vec<_> = a.iter().map(|&v| this.item(v)).collect();
        let b: Vec<_> = b.iter().map(|&v| this.item(v)).collect();
        this.a.reset(a);
        this.b.reset(b);
        this
    }
    fn item(&mut self, value: i32) -> P {
        let item = Rc::new(Item {
            id: self.created.len(),
            value: Cell::new(value),
            changed: PropertyChanged::new(),
        });
        self.created.push(item.clone());
        item
    }
    fn apply(&mut self, right: bool, op: &Op) {
        let list = if right { self.b.clone() } else { self.a.clone() };
        let len = list.len();
        match op {
            Op::Insert(i, v) => {
                let item = self.item(*v);
                list.insert(i % (len + 1), item);
            }
            Op::Reset(values) => {
                let items: Vec<_> = values.iter().map(|&v| self.item(v)).collect();
                list.reset(items);
            }
            _ if len == 0 => {}
            Op::Remove(i) => {
                list.remove(i % len);
            }
            Op::Set(i, v) => {
                let item = self.item(*v);
                list.set(i % len, item);
            }
            Op::Move(i, j) => list.move_item(i % len, j % len),
            Op::Mutate(i, v) => {
                if let Some(item) = list.get(i % len) {
                    item.set(*v);
                }
            }
        }
    }
    fn snapshot(list: &StateList<P>) -> Vec<Row> {
        list.borrow().iter().map(|x| (x.id, x.get())).collect()
    }
}

fn ids(list: &ActiveList<P>) -> Vec<usize> {
    list.borrow().iter().map(|x| x.id).collect()
}
fn row_ids(rows: &[Row]) -> Vec<usize> {
    rows.iter().map(|r| r.0).collect()
}
fn distinct(rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.1)).collect()
}
fn sorted(rows: &[Row], descending: bool) -> Vec<usize> {
    let mut rows = rows.to_vec();
    if descending {
        rows.sort_by(|x, y| y.1.cmp(&x.1));
    } else {
        rows.sort_by_key(|r| r.1);
    }
    row_ids(&rows)
}
fn groups(rows: &[Row]) -> Vec<(i32, Vec<usize>)> {
    let mut groups: Vec<(i32, Vec<usize>)> = Vec::new();
    for &(id, v) in rows {
        let k = v % 3;
        match groups.iter_mut().find(|g| g.0 == k) {
            Some(g) => g.1.push(id),
            None => groups.push((k, vec![id])),
        }
    }
    groups
}
fn joined(a: &[Row], b: &[Row], outer: bool) -> Vec<(Option<usize>, Option<usize>)> {
    let key = |v: i32| v % 3;
    let mut rows = Vec::new();
    let mut seen = Vec::new();
    for &(_, v) in a {
        let k = key(v);
        if seen.contains(&k) {
            continue;
        }
        seen.push(k);
        let rights: Vec<_> = b.iter().filter(|r| key(r.1) == k).collect();
        for l in a.iter().filter(|l| key(l.1) == k) {
            if rights.is_empty() {
                if outer {
                    rows.push((Some(l.0), None));
                }
            } else {
                rows.extend(rights.iter().map(|r| (Some(l.0), Some(r.0))));
            }
        }
    }
    if outer {
        for &(_, v) in b {
            let k = key(v);
            if seen.contains(&k) {
                continue;
            }
            seen.push(k);
            rows.extend(b.iter().filter(|r| key(r.1) == k).map(|r| (None, Some(r.0))));
        }
    }
    rows
}

struct Operators {
    filter: ActiveList<P>,
    map: ActiveList<Row>,
    flat_map: ActiveList<usize>,
    take: ActiveList<P>,
    skip: ActiveList<P>,
    concat: ActiveList<P>,
    reverse: ActiveList<P>,
    zip: ActiveList<(usize, usize, i32)>,
    distinct: ActiveList<P>,
    union: ActiveList<P>,
    intersect: ActiveList<P>,
    except: ActiveList<P>,
    order_by: ActiveList<P>,
    order_by_descending: ActiveList<P>,
    group_by: ActiveList<Grouping<i32, P>>,
    lookup: ActiveLookup<i32, P>,
    join: ActiveList<(usize, usize)>,
    outer_join: ActiveList<(Option<usize>, Option<usize>)>,
    count_where: ActiveValue<usize>,
    sum: ActiveValue<i32>,
    min: ActiveValue<Option<i32>>,
    max: ActiveValue<Option<i32>>,
    first: ActiveValue<Option<usize>>,
    last: ActiveValue<Option<usize>>,
    element_at: ActiveValue<Option<usize>>,
    any: ActiveValue<bool>,
    all: ActiveValue<bool>,
    sequence_equal: ActiveValue<bool>,
}

impl Operators {
    fn new(s: &Sources) -> Self {
        let a = s.a.to_active_list();
        let b = s.b.to_active_list();
        let values = a.map_watched(|x| x.get(), watched());
        let ids = a.map(|x| x.id);
        Self {
            filter: a.filter_watched(|x| x.get() % 2 == 0, watched()),
            map: a.map_watched(|x| (x.id, x.get() * 10), watched()),
            flat_map: a.flat_map_watched(|x| vec![x.id; (x.get() % 3) as usize], watched()),
            take: a.take(3),
            skip: a.skip(2),
            concat: a.concat(&b),
            reverse: a.reverse(),
            zip: a.zip_watched(
                &b,
                |l, r| (l.id, r.id, l.get() * 10 + r.get()),
                watched(),
                watched(),
            ),
            distinct: a.distinct_by_watched(|x| x.get(), watched()),
            union: a.union_by_watched(&b, |x| x.get(), watched()),
            intersect: a.intersect_by_watched(&b, |x| x.get(), watched()),
            except: a.except_by_watched(&b, |x| x.get(), watched()),
            order_by: a.order_by_watched(|x| x.get(), watched()),
            order_by_descending: a.order_by_descending_watched(|x| x.get(), watched()),
            group_by: a.group_by_watched(group_key, watched()),
            lookup: a.to_lookup_watched(group_key, watched()),
            join: a.join_watched(
                &b,
                group_key,
                group_key,
                |l, r| (l.id, r.id),
                watched(),
                watched(),
            ),
            outer_join: a.outer_join_watched(
                &b,
                group_key,
                group_key,
                |l, r| (l.map(|x| x.id), r.map(|x| x.id)),
                watched(),
                watched(),
            ),
            count_where: a.count_where_watched(|x| x.get() % 2 == 0, watched()),
            sum: values.sum(),
            min: values.min(),
            max: values.max(),
            first: ids.first(),
            last: ids.last(),
            element_at: ids.element_at(2),
            any: a.any_watched(|x| x.get() == 0, watched()),
            all: a.all_watched(|x| x.get() < 5, watched()),
            sequence_equal: values.sequence_equal(&b.map_watched(|x| x.get(), watched())),
        }
    }

    fn check(&self, s: &Sources) -> Result<(), TestCaseError> {
        let a = Sources::snapshot(&s.a);
        let b = Sources::snapshot(&s.b);
        let a_ids = row_ids(&a);
        let values: Vec<i32> = a.iter().map(|r| r.1).collect();
        let b_values: HashSet<i32> = b.iter().map(|r| r.1).collect();

        let expected: Vec<_> = a.iter().filter(|r| r.1 % 2 == 0).map(|r| r.0).collect();
        prop_assert_eq!(ids(&self.filter), expected);
        let expected: Vec<_> = a.iter().map(|r| (r.0, r.1 * 10)).collect();
        prop_assert_eq!(self.map.to_vec(), expected);
        let expected: Vec<_> = a
            .iter()
            .flat_map(|r| vec![r.0; (r.1 % 3) as usize])
            .collect();
        prop_assert_eq!(self.flat_map.to_vec(), expected);
        prop_assert_eq!(ids(&self.take), a_ids.iter().copied().take(3).collect::<Vec<_>>());
        prop_assert_eq!(ids(&self.skip), a_ids.iter().copied().skip(2).collect::<Vec<_>>());
        prop_assert_eq!(ids(&self.concat), row_ids(&[a.clone(), b.clone()].concat()));
        prop_assert_eq!(ids(&self.reverse), a_ids.iter().rev().copied().collect::<Vec<_>>());
        let expected: Vec<_> = a
            .iter()
            .zip(&b)
            .map(|(l, r)| (l.0, r.0, l.1 * 10 + r.1))
            .collect();
        prop_assert_eq!(self.zip.to_vec(), expected);

        prop_assert_eq!(ids(&self.distinct), row_ids(&distinct(a.clone())));
        let union = distinct(a.iter().chain(&b).copied());
        prop_assert_eq!(ids(&self.union), row_ids(&union));
        let matched = |keep: bool| {
            let rows: Vec<_> = distinct(a.clone())
                .into_iter()
                .filter(|r| b_values.contains(&r.1) == keep)
                .collect();
            row_ids(&rows)
        };
        prop_assert_eq!(ids(&self.intersect), matched(true));
        prop_assert_eq!(ids(&self.except), matched(false));

        prop_assert_eq!(ids(&self.order_by), sorted(&a, false));
        prop_assert_eq!(ids(&self.order_by_descending), sorted(&a, true));

        let expected = groups(&a);
        let actual: Vec<_> = self
            .group_by
            .borrow()
            .iter()
            .map(|g| (*g.key(), ids(g.items())))
            .collect();
        prop_assert_eq!(&actual, &expected);
        prop_assert_eq!(self.lookup.len(), expected.len());
        for (key, members) in &expected {
            let group = self.lookup.get(key);
            prop_assert_eq!(group.map(|g| ids(g.items())), Some(members.clone()));
        }

        let expected: Vec<_> = joined(&a, &b, false)
            .into_iter()
            .filter_map(|(l, r)| Some((l?, r?)))
            .collect();
        prop_assert_eq!(self.join.to_vec(), expected);
        prop_assert_eq!(self.outer_join.to_vec(), joined(&a, &b, true));

        prop_assert_eq!(self.count_where.get(), values.iter().filter(|v| *v % 2 == 0).count());
        prop_assert_eq!(self.sum.get(), values.iter().sum::<i32>());
        prop_assert_eq!(self.min.get(), values.iter().min().copied());
        prop_assert_eq!(self.max.get(), values.iter().max().copied());
        prop_assert_eq!(self.first.get(), a_ids.first().copied());
        prop_assert_eq!(self.last.get(), a_ids.last().copied());
        prop_assert_eq!(self.element_at.get(), a_ids.get(2).copied());
        prop_assert_eq!(self.any.get(), values.contains(&0));
        prop_assert_eq!(self.all.get(), values.iter().all(|v| *v < 5));
        let b_values: Vec<i32> = b.iter().map(|r| r.1).collect();
        prop_assert_eq!(self.sequence_equal.get(), values == b_values);
        Ok(())
    }
}

/// Every item in a source is observed once per watching operator, and items that left
/// the sources are not observed at all.
struct Hygiene {
    per_item: [usize; 2],
}
impl Hygiene {
    fn measure(s: &Sources) -> Self {
        let first = |list: &StateList<P>| list.get(0).map_or(0, |x| x.listeners());
        Self {
            per_item: [first(&s.a), first(&s.b)],
        }
    }
    fn check(&self, s: &Sources) -> Result<(), TestCaseError> {
        let mut live = HashSet::new();
        for (side, list) in [&s.a, &s.b].into_iter().enumerate() {
            for item in list.borrow().iter() {
                prop_assert_eq!(item.listeners(), self.per_item[side], "item {:?}", item);
                live.insert(item.id);
            }
        }
        for item in &s.created {
            if !live.contains(&item.id) {
                prop_assert_eq!(item.listeners(), 0, "retired item {:?}", item);
            }
        }
        Ok(())
    }
}

proptest! {
    #[test]
    fn operators_match_bulk_after_every_step(
        a in initial(),
        b in initial(),
        steps in prop::collection::vec(step(), 0..40),
    ) {
        let mut s = Sources::new(&a, &b);
        let ops = Operators::new(&s);
        let hygiene = Hygiene::measure(&s);
        prop_assert!(hygiene.per_item[0] > 0);
        prop_assert!(hygiene.per_item[1] > 0);
        ops.check(&s)?;
        hygiene.check(&s)?;

        for (right, op) in &steps {
            s.apply(*right, op);
            ops.check(&s)?;
            hygiene.check(&s)?;
        }

        drop(ops);
        for item in &s.created {
            prop_assert_eq!(item.listeners(), 0);
        }
        prop_assert_eq!(s.a.subscriber_count(), 0);
        prop_assert_eq!(s.b.subscriber_count(), 0);
    }

    #[test]
    fn key_operators_are_deterministic(
        a in initial(),
        b in initial(),
        steps in prop::collection::vec(step(), 0..30),
    ) {
        let run = || {
            let mut s = Sources::new(&a, &b);
            let events = Rc::new(RefCell::new(Vec::new()));
            let (la, lb) = (s.a.to_active_list(), s.b.to_active_list());
            let lists = [
                la.distinct_by_watched(|x| x.get(), watched()),
                la.union_by_watched(&lb, |x| x.get(), watched()),
                la.intersect_by_watched(&lb, |x| x.get(), watched()),
                la.except_by_watched(&lb, |x| x.get(), watched()),
            ];
            let _subscriptions: Vec<_> = lists
                .iter()
                .enumerate()
                .map(|(n, list)| {
                    let events = events.clone();
                    list.subscribe(move |c: &ListChange<P>| {
                        events.borrow_mut().push(format!("{n}: {c:?}"))
                    })
                })
                .collect();
            for (right, op) in &steps {
                s.apply(*right, op);
            }
            let outputs: Vec<_> = lists.iter().map(ids).collect();
            let events = events.borrow().clone();
            (outputs, events)
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn key_round_trip_restores_order(
        values in prop::collection::vec(0..4i32, 1..10),
        index in any::<usize>(),
        key in 0..4i32,
    ) {
        let mut s = Sources::new(&values, &[]);
        let sorted = s.a.to_active_list().order_by_watched(|x| x.get(), watched());
        let before = ids(&sorted);
        let index = index % values.len();
        s.apply(false, &Op::Mutate(index, key));
        s.apply(false, &Op::Mutate(index, values[index]));
        prop_assert_eq!(ids(&sorted), before);
    }
}

proptest! {
    #[test]
    fn parameterized_operators_match_bulk(
        a in initial(),
        b in initial(),
        steps in prop::collection::vec((step(), prop::option::of(1..4i32)), 0..30),
    ) {
        let mut s = Sources::new(&a, &b);
        let modulus = s.item(2);
        let param = active_list::to_active_value(modulus.clone(), |x| x.get(), watched());
        let (la, lb) = (s.a.to_active_list(), s.b.to_active_list());
        let filter = la.filter_with_param_watched(&param, |x, p| x.get() % p == 0, watched());
        let map = la.map_with_param_watched(&param, |x, p| (x.id, x.get() * p), watched());
        let join = la.join_with_param_watched(
            &lb,
            &param,
            |l, p| l.get() % p,
            |r, p| r.get() % p,
            |l, r, _| (l.id, r.id),
            watched(),
            watched(),
        );

        for ((right, op), p) in &steps {
            s.apply(*right, op);
            if let Some(p) = p {
                modulus.set(*p);
            }
            let p = modulus.get();
            let rows_a = Sources::snapshot(&s.a);
            let rows_b = Sources::snapshot(&s.b);
            let expected: Vec<usize> = rows_a.iter().filter(|r| r.1 % p == 0).map(|r| r.0).collect();
            prop_assert_eq!(ids(&filter), expected);
            let expected: Vec<Row> = rows_a.iter().map(|r| (r.0, r.1 * p)).collect();
            prop_assert_eq!(map.to_vec(), expected);
            let mut expected: Vec<(usize, usize)> = rows_a
                .iter()
                .flat_map(|l| rows_b.iter().filter(move |r| r.1 % p == l.1 % p).map(move |r| (l.0, r.0)))
                .collect();
            expected.sort();
            let mut actual = join.to_vec();
            actual.sort();
            prop_assert_eq!(actual, expected);
        }

        drop((filter, map, join, param));
        for item in &s.created {
            prop_assert_eq!(item.listeners(), 0);
        }
        prop_assert_eq!(s.a.subscriber_count(), 0);
        prop_assert_eq!(s.b.subscriber_count(), 0);
    }
}
