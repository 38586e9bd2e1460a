use core::ops::{Index, IndexMut};

use crate::{Error, Result};

/// Growable backing storage addressed by stable indices.
///
/// Elements are only ever appended, so an index handed out by [`Arena::push`] names the same
/// element for the lifetime of the arena. Growth doubles the capacity and relocates the elements
/// in order; it never compacts or reorders them.
pub(crate) struct Arena<T> {
    slots: Vec<T>,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        Ok(Self { slots })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Appends `element` and returns its index.
    pub(crate) fn push(&mut self, element: T) -> Result<usize> {
        if self.slots.len() == self.slots.capacity() {
            let additional = self.slots.capacity().max(1);
            self.slots.try_reserve_exact(additional)?;
        }

        self.slots.push(element);
        Ok(self.slots.len() - 1)
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Result<&T> {
        self.slots.get(index).ok_or(Error::IndexOutOfRange)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        self.slots.get_mut(index).ok_or(Error::IndexOutOfRange)
    }
}

impl<T> Index<usize> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.slots[index]
    }
}

impl<T> IndexMut<usize> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.slots[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn arena_capacity() {
        let arena: Arena<u32> = Arena::with_capacity(10).unwrap();
        assert!(arena.capacity() >= 10);
        assert!(arena.is_empty());
    }

    #[test]
    fn growth_doubles_and_keeps_indices() {
        let mut arena: Arena<u32> = Arena::new();
        let mut capacities = Vec::new();

        for value in 0..100 {
            let index = arena.push(value * 3).unwrap();
            assert_eq!(index, value as usize);
            capacities.push(arena.capacity());
        }

        for pair in capacities.windows(2) {
            assert!(pair[1] == pair[0] || pair[1] >= pair[0] * 2, "{pair:?}");
        }

        for index in 0..100 {
            assert_eq!(arena[index], index as u32 * 3);
        }
    }

    #[test]
    fn out_of_range() {
        let mut arena: Arena<u32> = Arena::new();
        arena.push(7).unwrap();

        assert_eq!(arena.get(1), Err(Error::IndexOutOfRange));
        assert_eq!(arena.get_mut(usize::MAX), Err(Error::IndexOutOfRange));
        assert_eq!(arena.get(0), Ok(&7));
    }

    proptest! {
        #[test]
        fn arena_behaves_like_vec(operations in prop::collection::vec(strategy(), 0..256)) {
            let mut model: Vec<u32> = Vec::new();
            let mut arena: Arena<u32> = Arena::new();

            for operation in operations {
                match operation {
                    Operation::Push(value) => {
                        let index = arena.push(value).unwrap();
                        prop_assert_eq!(index, model.len());
                        model.push(value);
                    }
                    Operation::Get(which) => {
                        let expected = model.get(which % (model.len() + 1));
                        prop_assert_eq!(arena.get(which % (model.len() + 1)).ok(), expected);
                    }
                    Operation::GetMut(which, value) => {
                        if model.is_empty() {
                            continue;
                        }

                        let index = which % model.len();
                        *arena.get_mut(index).unwrap() = value;
                        model[index] = value;
                    }
                }

                prop_assert_eq!(arena.len(), model.len());
                prop_assert_eq!(arena.is_empty(), model.is_empty());

                for (index, &value) in model.iter().enumerate() {
                    prop_assert_eq!(arena[index], value);
                }
            }
        }
    }

    #[derive(Clone, Debug)]
    enum Operation {
        Push(u32),
        Get(usize),
        GetMut(usize, u32),
    }

    fn strategy() -> impl Strategy<Value = Operation> {
        prop_oneof![
            20 => any::<u32>().prop_map(Operation::Push),
            5 => any::<usize>().prop_map(Operation::Get),
            5 => (any::<usize>(), any::<u32>()).prop_map(|(which, value)| Operation::GetMut(which, value)),
        ]
    }
}
