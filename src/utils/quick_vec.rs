use std::{
    cmp::Ordering,
    fmt::{self, Debug},
    ops::Index,
    slice,
};


/// Growable, indexable storage backing every active list.
///
/// Each mutation bumps [`version`](Self::version), which lets readers detect that
/// an iteration was invalidated.
pub struct QuickVec<T> {
    items: Vec<T>,
    version: u64,
}

impl<T> QuickVec<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        Self { items, version: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn insert(&mut self, index: usize, value: T) {
        assert!(
            index <= self.len(),
            "insert index {index} out of range for length {}",
            self.len()
        );
        self.items.insert(index, value);
        self.bump();
    }
    pub fn remove(&mut self, index: usize) -> T {
        self.check_index(index);
        let value = self.items.remove(index);
        self.bump();
        value
    }
    pub fn replace(&mut self, index: usize, value: T) -> T {
        self.check_index(index);
        let old = std::mem::replace(&mut self.items[index], value);
        self.bump();
        old
    }

    /// Moves the item at `old_index` to `new_index` by rotating the items in between.
    pub fn move_item(&mut self, old_index: usize, new_index: usize) {
        self.check_index(old_index);
        self.check_index(new_index);
        match old_index.cmp(&new_index) {
            Ordering::Less => self.items[old_index..=new_index].rotate_left(1),
            Ordering::Greater => self.items[new_index..=old_index].rotate_right(1),
            Ordering::Equal => return,
        }
        self.bump();
    }
    pub fn reset(&mut self, items: Vec<T>) -> Vec<T> {
        let old = std::mem::replace(&mut self.items, items);
        self.bump();
        old
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.len(),
            "index {index} out of range for length {}",
            self.len()
        );
    }
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
impl<T> Index<usize> for QuickVec<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.check_index(index);
        &self.items[index]
    }
}
impl<'a, T> IntoIterator for &'a QuickVec<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
impl<T: Debug> Debug for QuickVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
