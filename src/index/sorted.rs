use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// Backing storage grows by this many slots at a time.
pub const GROW_BLOCK: usize = 32;

/// Total order used by a [`SortedIndex`].
pub type CompareFn<T> = fn(&T, &T) -> Ordering;

/// Ordered collection searchable by binary search.
///
/// A single vector serves both as the searchable array and as the traversal
/// order. Elements comparing equal under the active comparator are rejected,
/// so `compare(elems[i - 1], elems[i])` is always `Less`.
pub struct SortedIndex<T> {
    elems: Vec<T>,
    compare: CompareFn<T>,
}

impl<T> SortedIndex<T> {
    pub fn new(compare: CompareFn<T>) -> Self {
        Self {
            elems: Vec::new(),
            compare,
        }
    }

    /// The active comparator
    pub fn compare_fn(&self) -> CompareFn<T> {
        self.compare
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Binary search for `target`.
    ///
    /// `Ok(idx)` when an element compares equal, otherwise `Err(idx)` with
    /// the insertion point. Which of several equal elements is found is
    /// unspecified, but the index never holds equal elements.
    pub fn search(&self, target: &T) -> std::result::Result<usize, usize> {
        let compare = self.compare;
        self.elems.binary_search_by(|elem| compare(elem, target))
    }

    /// Insert an element at its ordered position and return that position.
    pub fn insert(&mut self, elem: T) -> Result<usize>
    where
        T: fmt::Display,
    {
        let idx = match self.search(&elem) {
            Ok(_) => return Err(Error::DuplicateOrder(elem.to_string())),
            Err(idx) => idx,
        };
        if self.elems.len() == self.elems.capacity() {
            self.elems.try_reserve_exact(GROW_BLOCK)?;
        }
        self.elems.insert(idx, elem);
        self.debug_check_order();
        Ok(idx)
    }

    /// Unlink the element at `idx`, shifting the tail left.
    pub fn remove_at(&mut self, idx: usize) -> Option<T> {
        if idx >= self.elems.len() {
            return None;
        }
        Some(self.elems.remove(idx))
    }

    /// Remove the last element.
    pub fn pop(&mut self) -> Option<T> {
        self.elems.pop()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.elems.get(idx)
    }

    /// Mutable access for fields that do not participate in the order.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.elems.get_mut(idx)
    }

    pub fn first(&self) -> Option<&T> {
        self.elems.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.elems.last()
    }

    /// Element following `elem` in traversal order
    pub fn next(&self, elem: &T) -> Option<&T> {
        let idx = self.search(elem).ok()?;
        self.elems.get(idx + 1)
    }

    /// Element preceding `elem` in traversal order
    pub fn prev(&self, elem: &T) -> Option<&T> {
        let idx = self.search(elem).ok()?;
        idx.checked_sub(1).and_then(|i| self.elems.get(i))
    }

    /// Linear lookup for keys the comparator does not order by.
    pub fn position<P>(&self, mut pred: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.elems.iter().position(|elem| pred(elem))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elems.iter()
    }

    /// Replace the comparator and re-sort every element.
    ///
    /// If the new comparator orders two elements as equal, the previous
    /// comparator and order are restored and `DuplicateOrder` is returned.
    pub fn set_compare(&mut self, compare: CompareFn<T>) -> Result<()>
    where
        T: fmt::Display,
    {
        let previous = std::mem::replace(&mut self.compare, compare);
        self.elems.sort_by(compare);

        let duplicate = self
            .elems
            .windows(2)
            .find(|pair| compare(&pair[0], &pair[1]) == Ordering::Equal)
            .map(|pair| pair[1].to_string());

        if let Some(what) = duplicate {
            self.compare = previous;
            self.elems.sort_by(previous);
            return Err(Error::DuplicateOrder(what));
        }

        self.debug_check_order();
        Ok(())
    }

    fn debug_check_order(&self) {
        debug_assert!(
            self.elems
                .windows(2)
                .all(|pair| (self.compare)(&pair[0], &pair[1]) == Ordering::Less),
            "sorted index out of order"
        );
    }
}

impl<'a, T> IntoIterator for &'a SortedIndex<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elems.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending(a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }

    fn descending(a: &u32, b: &u32) -> Ordering {
        b.cmp(a)
    }

    fn by_parity(a: &u32, b: &u32) -> Ordering {
        (a % 2).cmp(&(b % 2))
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut index = SortedIndex::new(ascending);
        for value in [5, 1, 9, 3, 7] {
            index.insert(value).unwrap();
        }
        let values: Vec<u32> = index.iter().copied().collect();
        assert_eq!(values, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_insert_rejects_equal() {
        let mut index = SortedIndex::new(ascending);
        index.insert(4).unwrap();
        let err = index.insert(4).unwrap_err();
        assert!(matches!(err, Error::DuplicateOrder(_)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_growth_in_blocks() {
        let mut index = SortedIndex::new(ascending);
        index.insert(1).unwrap();
        assert!(index.elems.capacity() >= GROW_BLOCK);
        for value in 2..=40 {
            index.insert(value).unwrap();
        }
        assert!(index.elems.capacity() >= 2 * GROW_BLOCK);
    }

    #[test]
    fn test_next_prev() {
        let mut index = SortedIndex::new(ascending);
        for value in [10, 20, 30] {
            index.insert(value).unwrap();
        }
        assert_eq!(index.next(&10), Some(&20));
        assert_eq!(index.prev(&10), None);
        assert_eq!(index.prev(&30), Some(&20));
        assert_eq!(index.next(&30), None);
        assert_eq!(index.next(&15), None);
    }

    #[test]
    fn test_set_compare_round_trip() {
        let mut index = SortedIndex::new(ascending);
        for value in [3, 1, 2] {
            index.insert(value).unwrap();
        }
        index.set_compare(descending).unwrap();
        assert_eq!(index.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        index.set_compare(ascending).unwrap();
        assert_eq!(index.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_set_compare_restores_on_duplicate() {
        let mut index = SortedIndex::new(descending);
        for value in [1, 2, 3, 4] {
            index.insert(value).unwrap();
        }
        let err = index.set_compare(by_parity).unwrap_err();
        assert!(matches!(err, Error::DuplicateOrder(_)));
        assert_eq!(index.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2, 1]);
        index.insert(5).unwrap();
        assert_eq!(index.first(), Some(&5));
    }
}
