use assert_call::CallRecorder;

use crate::{
    utils::test_helpers::{record, watch_value, Item},
    StateList,
};

fn repeat(x: &usize) -> Vec<usize> {
    vec![*x; *x]
}

#[test]
fn expands_each_item() {
    let s = StateList::from_vec(vec![1, 0, 2]);
    let f = s.to_active_list().flat_map(repeat);
    assert_eq!(f.to_vec(), [1, 2, 2]);
}

#[test]
fn insert_remove_and_set_touch_the_block() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1, 2]);
    let f = s.to_active_list().flat_map(repeat);
    let _r = record(&f);

    s.insert(1, 3);
    cr.verify(["insert 1 3", "insert 2 3", "insert 3 3"]);
    s.remove(0);
    cr.verify("remove 0 1");
    s.set(0, 1);
    cr.verify(["remove 0 3", "remove 0 3", "remove 0 3", "insert 0 1"]);
    assert_eq!(f.to_vec(), [1, 2, 2]);
}

#[test]
fn move_relocates_the_whole_block() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![2, 1, 3]);
    let f = s.to_active_list().flat_map(|x: &usize| (0..*x).map(|i| *x * 10 + i).collect::<Vec<_>>());
    assert_eq!(f.to_vec(), [20, 21, 10, 30, 31, 32]);
    let _r = record(&f);

    s.move_item(0, 2);
    cr.verify(["move 0 5 20", "move 0 5 21"]);
    assert_eq!(f.to_vec(), [10, 30, 31, 32, 20, 21]);

    s.move_item(2, 0);
    cr.verify(["move 4 0 20", "move 5 1 21"]);
    assert_eq!(f.to_vec(), [20, 21, 10, 30, 31, 32]);
}

#[test]
fn reset_expands_everything() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1]);
    let f = s.to_active_list().flat_map(repeat);
    let _r = record(&f);
    s.reset([2, 1]);
    cr.verify("reset [2, 2, 1]");
}

#[test]
fn watched_property_regenerates_children() {
    let a = Item::new(1);
    let s = StateList::from_vec(vec![Item::new(2), a.clone()]);
    let f = s
        .to_active_list()
        .flat_map_watched(|x| vec![x.get(); 2], watch_value());
    a.set(7);
    assert_eq!(f.to_vec(), [2, 2, 7, 7]);
}
