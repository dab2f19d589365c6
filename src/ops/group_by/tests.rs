use assert_call::{call, CallRecorder};

use crate::{
    utils::test_helpers::{record, values, watch_value, Item},
    StateList,
};

fn snapshot(list: &crate::ActiveList<crate::Grouping<i32, i32>>) -> Vec<(i32, Vec<i32>)> {
    list.borrow()
        .iter()
        .map(|g| (*g.key(), g.items().to_vec()))
        .collect()
}

#[test]
fn groups_follow_first_member() {
    let s = StateList::from_vec(vec![1, 2, 3, 4, 5]);
    let g = s.to_active_list().group_by(|x| x % 3);
    assert_eq!(snapshot(&g), [(1, vec![1, 4]), (2, vec![2, 5]), (0, vec![3])]);

    s.remove(0);
    assert_eq!(snapshot(&g), [(2, vec![2, 5]), (0, vec![3]), (1, vec![4])]);
    s.insert(0, 6);
    assert_eq!(snapshot(&g), [(0, vec![6, 3]), (2, vec![2, 5]), (1, vec![4])]);
    s.move_item(3, 0);
    assert_eq!(s.to_vec(), [4, 6, 2, 3, 5]);
    assert_eq!(snapshot(&g), [(1, vec![4]), (0, vec![6, 3]), (2, vec![2, 5])]);
    s.set(1, 7);
    assert_eq!(snapshot(&g), [(1, vec![4, 7]), (2, vec![2, 5]), (0, vec![3])]);
}

#[test]
fn group_lifecycle_events() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1]);
    let g = s.to_active_list().group_by(|x| x % 2);
    let _r = g.subscribe(|c| match c {
        crate::ListChange::Insert { index, new_value } => call!("add {index} {}", new_value.key()),
        crate::ListChange::Remove { index, old_value } => {
            call!("drop {index} {}", old_value.key())
        }
        crate::ListChange::Move {
            old_index,
            new_index,
            ..
        } => call!("move {old_index} {new_index}"),
        _ => call!("other"),
    });

    s.push(2);
    cr.verify("add 1 0");
    s.push(3);
    cr.verify(());
    s.remove(0);
    cr.verify("move 0 1");
    s.remove(0);
    cr.verify("drop 0 0");
}

#[test]
fn group_items_report_member_changes() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1, 3, 2]);
    let g = s.to_active_list().group_by(|x| x % 2);
    let odd = g.get(0).unwrap();
    let _r = record(odd.items());

    s.insert(1, 5);
    cr.verify("insert 1 5");
    s.set(0, 7);
    cr.verify("set 0 1 7");
    s.move_item(0, 3);
    cr.verify("move 0 2 7");
    assert_eq!(odd.items().to_vec(), [5, 3, 7]);
}

#[test]
fn lookup_by_key() {
    let s = StateList::from_vec(vec!["apple", "avocado", "banana"]);
    let l = s.to_active_list().to_lookup(|x: &&str| x.chars().next());
    assert_eq!(l.len(), 2);
    assert_eq!(l.get(&Some('a')).unwrap().items().to_vec(), ["apple", "avocado"]);
    assert!(!l.contains_key(&Some('c')));

    s.push("cherry");
    assert!(l.contains_key(&Some('c')));
    s.remove(2);
    assert!(!l.contains_key(&Some('b')));
    assert_eq!(l.len(), 2);
}

#[test]
fn reset_reuses_surviving_groups() {
    let s = StateList::from_vec(vec![1, 2]);
    let g = s.to_active_list().group_by(|x| x % 2);
    let odd = g.get(0).unwrap();
    let even = g.get(1).unwrap();
    s.reset([3, 5]);
    assert_eq!(snapshot(&g), [(1, vec![3, 5])]);
    assert!(odd.items().ptr_eq(g.get(0).unwrap().items()));
    assert_eq!(odd.items().to_vec(), [3, 5]);
    assert!(even.items().is_empty());
}

#[test]
fn watched_key_change_moves_between_groups() {
    let a = Item::new(1);
    let s = StateList::from_vec(vec![a.clone(), Item::new(2), Item::new(4)]);
    let g = s
        .to_active_list()
        .group_by_watched(|x| x.get() % 2, watch_value());
    assert_eq!(g.len(), 2);

    a.set(6);
    assert_eq!(g.len(), 1);
    assert_eq!(values(&g.get(0).unwrap().items().to_vec()), [6, 2, 4]);
    a.set(3);
    assert_eq!(*g.get(0).unwrap().key(), 1);
    assert_eq!(values(&g.get(1).unwrap().items().to_vec()), [2, 4]);
}

#[test]
fn groups_follow_first_member_across_moves() {
    let s = StateList::from_vec(vec![1, 2, 3, 4, 5, 6]);
    let g = s.to_active_list().group_by(|x| x % 3);
    s.move_item(0, 5);
    assert_eq!(
        snapshot(&g),
        [(2, vec![2, 5]), (0, vec![3, 6]), (1, vec![4, 1])]
    );
    s.move_item(4, 0);
    assert_eq!(
        snapshot(&g),
        [(0, vec![6, 3]), (2, vec![2, 5]), (1, vec![4, 1])]
    );
    s.remove(0);
    assert_eq!(
        snapshot(&g),
        [(2, vec![2, 5]), (0, vec![3]), (1, vec![4, 1])]
    );
}

#[test]
fn lookup_sees_new_group_while_notifying() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1, 3]);
    let l = s.to_active_list().to_lookup(|x| x % 3);
    let r = l.groups().subscribe({
        let l = l.clone();
        move |c| {
            if let crate::ListChange::Insert { new_value, .. } = c {
                call!("{:?}", l.get(new_value.key()).map(|g| g.items().to_vec()));
            }
        }
    });
    s.push(4);
    cr.verify(());
    s.push(5);
    cr.verify("Some([5])");
    s.remove(2);
    assert!(l.contains_key(&1));
    s.remove(0);
    assert!(!l.contains_key(&1));
    drop(r);
}
