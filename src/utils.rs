use std::ops::{Bound, Range, RangeBounds};

pub(crate) mod quick_vec;

#[cfg(test)]
pub(crate) mod test_helpers;

pub(crate) fn to_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n + 1,
        Bound::Excluded(&n) => n,
        Bound::Unbounded => len,
    };
    assert!(start <= end);
    assert!(end <= len);
    start..end
}

/// Where an item at `index` ends up after the item at `old_index` moved to `new_index`.
pub(crate) fn index_after_move(index: usize, old_index: usize, new_index: usize) -> usize {
    if index == old_index {
        new_index
    } else if old_index < index && index <= new_index {
        index - 1
    } else if new_index <= index && index < old_index {
        index + 1
    } else {
        index
    }
}
