use assert_call::{call, CallRecorder};
use rstest::rstest;

use crate::{
    utils::test_helpers::{watch_value, Item},
    ActiveValue, StateList, Subscription,
};

fn record<T: std::fmt::Debug + 'static>(value: &ActiveValue<T>) -> Subscription {
    value.subscribe(|c| call!("{:?} -> {:?}", c.old_value, c.new_value))
}

#[test]
fn count_tracks_inserts_and_removes() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1, 2]);
    let c = s.to_active_list().count();
    let _r = record(&c);
    assert_eq!(c.get(), 2);

    s.push(3);
    cr.verify("2 -> 3");
    s.move_item(0, 2);
    s.set(0, 9);
    cr.verify(());
    s.remove(1);
    cr.verify("3 -> 2");
    s.clear();
    cr.verify("2 -> 0");
}

#[test]
fn count_where_follows_watched_items() {
    let a = Item::new(1);
    let b = Item::new(2);
    let s = StateList::from_vec(vec![a.clone(), b.clone()]);
    let c = s
        .to_active_list()
        .count_where_watched(|x| x.get() % 2 == 0, watch_value());
    assert_eq!(c.get(), 1);
    a.set(4);
    assert_eq!(c.get(), 2);
    b.set(3);
    assert_eq!(c.get(), 1);
    drop(c);
    assert_eq!((a.listeners(), b.listeners()), (0, 0));
}

#[test]
fn any_all_contains() {
    let s = StateList::from_vec(vec![2, 4]);
    let list = s.to_active_list();
    let any_odd = list.any(|x| x % 2 == 1);
    let all_even = list.all(|x| x % 2 == 0);
    let has_3 = list.contains(3);
    assert_eq!((any_odd.get(), all_even.get(), has_3.get()), (false, true, false));

    s.push(3);
    assert_eq!((any_odd.get(), all_even.get(), has_3.get()), (true, false, true));
    s.clear();
    assert_eq!((any_odd.get(), all_even.get(), has_3.get()), (false, true, false));
}

#[test]
fn aggregate_and_sum() {
    let s = StateList::from_vec(vec![1, 2, 3]);
    let list = s.to_active_list();
    let product = list.aggregate(1, |a, x| a * x);
    let sum = list.sum();
    assert_eq!((product.get(), sum.get()), (6, 6));

    s.set(0, 4);
    assert_eq!((product.get(), sum.get()), (24, 9));
    s.reset([]);
    assert_eq!((product.get(), sum.get()), (1, 0));
}

#[test]
fn sum_does_not_notify_when_unchanged() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1, 2, 3]);
    let sum = s.to_active_list().sum();
    let _r = record(&sum);

    s.move_item(0, 2);
    s.set(0, 2);
    cr.verify(());
    s.push(1);
    cr.verify("6 -> 7");
}

#[test]
fn min_rescans_when_extreme_leaves() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![3, 1, 2]);
    let min = s.to_active_list().min();
    let _r = record(&min);
    assert_eq!(min.get(), Some(1));

    s.remove(1);
    cr.verify("Some(1) -> Some(2)");
    s.push(0);
    cr.verify("Some(2) -> Some(0)");
    s.set(2, 5);
    cr.verify("Some(0) -> Some(2)");
    s.remove(0);
    cr.verify(());
    s.clear();
    cr.verify("Some(2) -> None");
}

#[rstest]
#[case(vec![], None)]
#[case(vec![4], Some(4))]
#[case(vec![1, 5, 3], Some(5))]
#[case(vec![5, 5, 1], Some(5))]
fn max_initial(#[case] items: Vec<i32>, #[case] expected: Option<i32>) {
    let list = crate::ActiveList::from(items);
    assert_eq!(list.max().get(), expected);
}

#[test]
fn max_updates_on_set() {
    let s = StateList::from_vec(vec![1, 5, 3]);
    let max = s.to_active_list().max();
    s.set(1, 2);
    assert_eq!(max.get(), Some(3));
    s.set(0, 7);
    assert_eq!(max.get(), Some(7));
}

#[test]
fn first_last_element_at() {
    let s = StateList::from_vec(vec![1, 2]);
    let list = s.to_active_list();
    let first = list.first();
    let last = list.last();
    let third = list.element_at(2);
    assert_eq!((first.get(), last.get(), third.get()), (Some(1), Some(2), None));

    s.push(3);
    assert_eq!((first.get(), last.get(), third.get()), (Some(1), Some(3), Some(3)));
    s.move_item(2, 0);
    assert_eq!((first.get(), last.get(), third.get()), (Some(3), Some(2), Some(2)));
    s.clear();
    assert_eq!((first.get(), last.get(), third.get()), (None, None, None));
}

#[test]
fn sequence_equal_compares_both_sides() {
    let mut cr = CallRecorder::new();
    let a = StateList::from_vec(vec![1, 2]);
    let b = StateList::from_vec(vec![1]);
    let eq = a.to_active_list().sequence_equal(&b.to_active_list());
    let r = record(&eq);
    assert!(!eq.get());

    b.push(2);
    cr.verify("false -> true");
    a.move_item(0, 1);
    cr.verify("true -> false");
    b.reset([2, 1]);
    cr.verify("false -> true");
    drop(r);
    drop(eq);
    assert_eq!((a.subscriber_count(), b.subscriber_count()), (0, 0));
}

#[test]
fn aggregate_with_custom_equality() {
    let mut cr = CallRecorder::new();
    let s = StateList::from_vec(vec![1, 2]);
    let total = s
        .to_active_list()
        .aggregate_with((0, 0), |(sum, n), x| (sum + x, n + 1), |a, b| a.0 == b.0);
    let _r = record(&total);
    assert_eq!(total.get(), (3, 2));

    s.push(0);
    cr.verify(());
    assert_eq!(total.get(), (3, 2));
    s.push(4);
    cr.verify("(3, 2) -> (7, 4)");
}
