//! Disjoint sets whose members carry additive values that survive unions.
//!
//! Each slot stores `self_offset`, its value *relative to its current parent*. The absolute value
//! of an element is the sum of `self_offset` from the element up to and including its
//! representative, so adding to a representative adds to every member of its set at once.
//!
//! A representative also parks the pending aggregate of its set in `group_offset`. A union folds
//! that aggregate into the other side's members by rewriting a single offset, so no set is ever
//! rescanned. `find` keeps paths short by repointing every visited slot at the representative and
//! telescoping its offset, which leaves every absolute value unchanged.

use core::{
    mem,
    ops::{Add, Neg, Sub},
};

use crate::{arena::Arena, Error, Result};

/// A value that can be decomposed into offsets and summed back together.
pub trait Additive:
    Copy + Default + Add<Output = Self> + Sub<Output = Self> + Neg<Output = Self>
{
}

impl<T> Additive for T where
    T: Copy + Default + Add<Output = T> + Sub<Output = T> + Neg<Output = T>
{
}

/// The payload stored in each slot of a [`LazyUnionFind`].
pub trait Element {
    /// The additive value tracked for every element.
    type Value: Additive;

    fn is_alive(&self) -> bool;

    fn mark_dead(&mut self);
}

/// How a union redistributes the pending aggregates of the two sets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    /// Each side's members gain the other side's pending aggregate.
    Merge,
    /// Only the second side's members gain the first side's pending aggregate, as if the second
    /// set had been appended after the first.
    Absorb,
}

struct Slot<E: Element> {
    payload: E,
    parent: usize,
    // Only meaningful at a representative.
    size: usize,
    self_offset: E::Value,
    // Only meaningful at a representative.
    group_offset: E::Value,
    // Only meaningful at a representative.
    experience: i64,
}

/// An index-addressed disjoint-set forest with union by size, path compression, and lazily
/// distributed additive values.
///
/// Elements are created with [`make_set`](Self::make_set) and addressed by the index it returns
/// for the lifetime of the structure.
pub struct LazyUnionFind<E: Element> {
    slots: Arena<Slot<E>>,
}

impl<E: Element> LazyUnionFind<E> {
    /// Returns a new, empty forest.
    pub const fn new() -> Self {
        Self {
            slots: Arena::new(),
        }
    }

    /// Returns a new, empty forest with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            slots: Arena::with_capacity(capacity)?,
        })
    }

    /// Returns the number of elements ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no element has been created.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of elements the forest can hold before its storage grows.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Appends a singleton set holding `payload`, with a zero value and aggregate.
    pub fn make_set(&mut self, payload: E) -> Result<usize> {
        let zero = E::Value::default();
        self.make_set_with(payload, zero, zero)
    }

    /// Appends a singleton set holding `payload`.
    ///
    /// The new element's value starts at `value`, and its set's pending aggregate (what a later
    /// union folds into the other side) starts at `carry`.
    pub fn make_set_with(&mut self, payload: E, value: E::Value, carry: E::Value) -> Result<usize> {
        let index = self.slots.len();

        self.slots.push(Slot {
            payload,
            parent: index,
            size: 1,
            self_offset: value,
            group_offset: carry,
            experience: 0,
        })
    }

    /// Returns the representative of the set containing `idx`.
    ///
    /// Every slot on the path is repointed at the representative.
    pub fn find(&mut self, idx: usize) -> Result<usize> {
        self.slots.get(idx)?;

        let root = self.root_of(idx);
        self.telescope(idx, root);

        Ok(root)
    }

    // Follows parent links from `idx` without modifying anything.
    fn root_of(&self, mut idx: usize) -> usize {
        loop {
            let parent = self.slots[idx].parent;

            if parent == idx {
                return idx;
            }

            idx = parent;
        }
    }

    // Repoints every slot between `idx` and `root` directly at `root`.
    //
    // A slot's new offset is the sum of the old offsets from the slot up to, but excluding, the
    // root. Adding the root's offset to it gives the same total the old chain did.
    fn telescope(&mut self, idx: usize, root: usize) {
        let mut pending = E::Value::default();
        let mut cur = idx;

        while cur != root {
            let slot = &self.slots[cur];
            pending = pending + slot.self_offset;
            cur = slot.parent;
        }

        #[cfg(feature = "tracing")]
        if idx != root && self.slots[idx].parent != root {
            tracing::trace!(from = idx, root, "compressing path");
        }

        let mut cur = idx;

        while cur != root {
            let slot = &mut self.slots[cur];
            let next = mem::replace(&mut slot.parent, root);
            let own = mem::replace(&mut slot.self_offset, pending);

            pending = pending - own;
            cur = next;
        }
    }

    /// Unions the sets containing `idx1` and `idx2`.
    ///
    /// The representative of the smaller set becomes a child of the larger one's; on a tie,
    /// `idx1`'s representative stays on top. Sizes, pending aggregates and experience of both sets
    /// accumulate on the surviving representative. `order` selects how pending aggregates are
    /// folded into member values.
    pub fn combine(&mut self, idx1: usize, idx2: usize, order: Order) -> Result<()> {
        self.slots.get(idx1)?;
        self.slots.get(idx2)?;

        let (root1, root2) = (self.root_of(idx1), self.root_of(idx2));

        if root1 == root2 {
            return Err(Error::AlreadyUnioned);
        }

        self.telescope(idx1, root1);
        self.telescope(idx2, root2);

        let shift1 = match order {
            Order::Merge => self.slots[root2].group_offset,
            Order::Absorb => E::Value::default(),
        };
        let shift2 = self.slots[root1].group_offset;

        let (top, sub, top_shift, sub_shift) = if self.slots[root1].size >= self.slots[root2].size
        {
            (root1, root2, shift1, shift2)
        } else {
            (root2, root1, shift2, shift1)
        };

        let top_offset = {
            let top_slot = &mut self.slots[top];
            top_slot.self_offset = top_slot.self_offset + top_shift;
            top_slot.self_offset
        };

        // Re-express the old representative's value relative to its new parent, so members below
        // it see the shift without being visited.
        let sub_slot = &mut self.slots[sub];
        sub_slot.parent = top;
        sub_slot.self_offset = sub_slot.self_offset + sub_shift - top_offset;

        let size = sub_slot.size;
        let group = mem::take(&mut sub_slot.group_offset);
        let experience = mem::take(&mut sub_slot.experience);

        let top_slot = &mut self.slots[top];
        top_slot.size += size;
        top_slot.group_offset = top_slot.group_offset + group;
        top_slot.experience += experience;

        #[cfg(feature = "tracing")]
        tracing::debug!(top, sub, size = top_slot.size, ?order, "combined sets");

        Ok(())
    }

    /// Returns the absolute additive value of `idx`.
    pub fn query_additive(&mut self, idx: usize) -> Result<E::Value> {
        let root = self.find(idx)?;
        let base = self.slots[root].self_offset;

        if idx == root {
            Ok(base)
        } else {
            Ok(base + self.slots[idx].self_offset)
        }
    }

    /// Adds `delta` to the value of every member of the set containing `idx`.
    ///
    /// The set's pending aggregate is unchanged.
    pub fn add_to_set(&mut self, idx: usize, delta: E::Value) -> Result<()> {
        let root = self.find(idx)?;
        let slot = &mut self.slots[root];
        slot.self_offset = slot.self_offset + delta;

        Ok(())
    }

    /// Adds `delta` to the value of every member of the set containing `idx`, and to the set's
    /// pending aggregate.
    pub fn contribute(&mut self, idx: usize, delta: E::Value) -> Result<()> {
        let root = self.find(idx)?;
        let slot = &mut self.slots[root];
        slot.self_offset = slot.self_offset + delta;
        slot.group_offset = slot.group_offset + delta;

        Ok(())
    }

    /// Returns the pending aggregate of the set containing `idx`.
    pub fn group_total(&mut self, idx: usize) -> Result<E::Value> {
        let root = self.find(idx)?;
        Ok(self.slots[root].group_offset)
    }

    /// Returns the number of elements in the set containing `idx`.
    pub fn set_size(&mut self, idx: usize) -> Result<usize> {
        let root = self.find(idx)?;
        Ok(self.slots[root].size)
    }

    /// Returns the experience of the set containing `idx`.
    pub fn get_experience(&mut self, idx: usize) -> Result<i64> {
        let root = self.find(idx)?;
        Ok(self.slots[root].experience)
    }

    /// Adds `delta` to the experience stored at `idx` itself.
    ///
    /// Experience is only read at representatives, so callers should pass one; an amount added
    /// elsewhere is not visible through [`get_experience`](Self::get_experience).
    pub fn add_experience(&mut self, idx: usize, delta: i64) -> Result<()> {
        self.slots.get_mut(idx)?.experience += delta;
        Ok(())
    }

    /// Marks the set containing `idx` as dead.
    pub fn mark_dead(&mut self, idx: usize) -> Result<()> {
        let root = self.find(idx)?;
        self.slots[root].payload.mark_dead();
        Ok(())
    }

    /// Returns whether the set containing `idx` is alive.
    pub fn is_alive(&mut self, idx: usize) -> Result<bool> {
        let root = self.find(idx)?;
        Ok(self.slots[root].payload.is_alive())
    }

    /// Returns the payload stored at `idx`.
    pub fn payload(&self, idx: usize) -> Result<&E> {
        Ok(&self.slots.get(idx)?.payload)
    }

    /// Returns the payload stored at `idx` mutably.
    pub fn payload_mut(&mut self, idx: usize) -> Result<&mut E> {
        Ok(&mut self.slots.get_mut(idx)?.payload)
    }
}

impl<E: Element> Default for LazyUnionFind<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, TestMember};

    fn forest(values: &[i64]) -> (LazyUnionFind<TestMember>, Vec<usize>) {
        let mut uf = LazyUnionFind::new();
        let indices = values
            .iter()
            .map(|&value| uf.make_set_with(TestMember::new(), value, value).unwrap())
            .collect();

        (uf, indices)
    }

    #[test]
    fn singleton() {
        let mut uf = LazyUnionFind::new();
        let idx = uf.make_set(TestMember::new()).unwrap();

        assert_eq!(uf.find(idx), Ok(idx));
        assert_eq!(uf.find(idx), Ok(idx));
        assert_eq!(uf.query_additive(idx), Ok(0));
        assert_eq!(uf.set_size(idx), Ok(1));
        assert_eq!(uf.get_experience(idx), Ok(0));
        assert_eq!(uf.is_alive(idx), Ok(true));
    }

    #[test]
    fn merged_sets_share_aggregate() {
        let mut uf = LazyUnionFind::new();
        let a = uf.make_set(TestMember::new()).unwrap();
        let b = uf.make_set(TestMember::new()).unwrap();

        uf.contribute(b, 5).unwrap();
        uf.combine(a, b, Order::Merge).unwrap();

        assert_eq!(uf.query_additive(a), Ok(5));
        assert_eq!(uf.query_additive(b), Ok(5));
        assert_eq!(uf.group_total(a), Ok(5));
        assert_eq!(uf.find(a), uf.find(b));
    }

    #[test]
    fn absorb_appends_in_order() {
        let (mut uf, idx) = forest(&[1, 2, 4, 8]);

        for &next in &idx[1..] {
            uf.combine(idx[0], next, Order::Absorb).unwrap();
        }

        let values: Vec<i64> = idx.iter().map(|&i| uf.query_additive(i).unwrap()).collect();
        assert_eq!(values, [1, 3, 7, 15]);
        assert_eq!(uf.group_total(idx[3]), Ok(15));
        assert_eq!(uf.set_size(idx[2]), Ok(4));
    }

    #[test]
    fn absorb_larger_set_into_smaller() {
        // The absorbed side is larger, so its representative ends up on top.
        let (mut uf, idx) = forest(&[10, 1, 2, 3]);

        uf.combine(idx[1], idx[2], Order::Absorb).unwrap();
        uf.combine(idx[1], idx[3], Order::Absorb).unwrap();
        assert_eq!(uf.query_additive(idx[3]), Ok(6));

        uf.combine(idx[0], idx[1], Order::Absorb).unwrap();
        assert_eq!(uf.find(idx[0]), uf.find(idx[1]));
        assert_ne!(uf.find(idx[0]), Ok(idx[0]));

        let values: Vec<i64> = idx.iter().map(|&i| uf.query_additive(i).unwrap()).collect();
        assert_eq!(values, [10, 11, 13, 16]);
    }

    #[test]
    fn add_to_set_leaves_later_members_untouched() {
        let (mut uf, idx) = forest(&[0, 0, 0]);

        uf.combine(idx[0], idx[1], Order::Merge).unwrap();
        uf.add_to_set(idx[1], 4).unwrap();
        uf.combine(idx[0], idx[2], Order::Merge).unwrap();
        uf.add_to_set(idx[2], 1).unwrap();

        assert_eq!(uf.query_additive(idx[0]), Ok(5));
        assert_eq!(uf.query_additive(idx[1]), Ok(5));
        assert_eq!(uf.query_additive(idx[2]), Ok(1));
        assert_eq!(uf.group_total(idx[0]), Ok(0));
    }

    #[test]
    fn compression_preserves_values() {
        let (mut uf, idx) = forest(&[1, 2, 3, 4, 5, 6, 7, 8]);

        // Build a deep chain of pairwise unions before any compression happens.
        for pair in idx.chunks(2) {
            uf.combine(pair[0], pair[1], Order::Absorb).unwrap();
        }
        uf.combine(idx[0], idx[2], Order::Absorb).unwrap();
        uf.combine(idx[4], idx[6], Order::Absorb).unwrap();
        uf.combine(idx[0], idx[4], Order::Absorb).unwrap();

        let before: Vec<i64> = idx.iter().rev().map(|&i| uf.query_additive(i).unwrap()).collect();
        for &i in &idx {
            uf.find(i).unwrap();
        }
        let after: Vec<i64> = idx.iter().rev().map(|&i| uf.query_additive(i).unwrap()).collect();

        assert_eq!(before, after);
        assert_eq!(after, [36, 28, 21, 15, 10, 6, 3, 1]);
    }

    #[test]
    fn already_unioned_is_rejected_without_changes() {
        let (mut uf, idx) = forest(&[3, 4]);
        uf.combine(idx[0], idx[1], Order::Absorb).unwrap();
        let root = uf.find(idx[0]).unwrap();
        uf.add_experience(root, 9).unwrap();

        assert_eq!(
            uf.combine(idx[1], idx[0], Order::Merge),
            Err(Error::AlreadyUnioned)
        );
        assert_eq!(uf.query_additive(idx[0]), Ok(3));
        assert_eq!(uf.query_additive(idx[1]), Ok(7));
        assert_eq!(uf.set_size(idx[0]), Ok(2));
        assert_eq!(uf.get_experience(idx[1]), Ok(9));
        assert_eq!(uf.group_total(idx[1]), Ok(7));
    }

    #[test]
    fn experience_accumulates_on_representative() {
        let (mut uf, idx) = forest(&[0, 0, 0]);

        uf.add_experience(idx[0], 3).unwrap();
        uf.add_experience(idx[1], 1).unwrap();
        uf.add_experience(idx[2], 5).unwrap();
        uf.combine(idx[0], idx[1], Order::Merge).unwrap();
        uf.combine(idx[2], idx[1], Order::Merge).unwrap();

        for &i in &idx {
            assert_eq!(uf.get_experience(i), Ok(9));
        }
    }

    #[test]
    fn liveness_is_read_through_representative() {
        let (mut uf, idx) = forest(&[0, 0, 0]);
        uf.combine(idx[0], idx[1], Order::Merge).unwrap();

        uf.mark_dead(idx[1]).unwrap();

        assert_eq!(uf.is_alive(idx[0]), Ok(false));
        assert_eq!(uf.is_alive(idx[1]), Ok(false));
        assert_eq!(uf.is_alive(idx[2]), Ok(true));
    }

    #[test]
    fn out_of_range_indices() {
        let (mut uf, idx) = forest(&[1]);

        assert_eq!(uf.find(1), Err(Error::IndexOutOfRange));
        assert_eq!(uf.query_additive(7), Err(Error::IndexOutOfRange));
        assert_eq!(
            uf.combine(idx[0], 1, Order::Merge),
            Err(Error::IndexOutOfRange)
        );
        assert_eq!(uf.add_experience(2, 1), Err(Error::IndexOutOfRange));
        assert!(uf.payload(1).is_err());
        assert_eq!(uf.set_size(idx[0]), Ok(1));
    }

    #[test]
    fn indices_survive_growth() {
        let mut uf = LazyUnionFind::with_capacity(1).unwrap();
        let idx: Vec<usize> = (0..100)
            .map(|value| uf.make_set_with(TestMember::new(), value, value).unwrap())
            .collect();

        assert_eq!(idx, (0..100).collect::<Vec<_>>());
        assert!(uf.capacity() >= 100);

        for (i, &slot) in idx.iter().enumerate() {
            assert_eq!(uf.query_additive(slot), Ok(i as i64));
        }
    }

    proptest::proptest! {
        #[test]
        fn lazy_values_match_eager_model(
            ops in proptest::collection::vec(model::forest_op_strategy(), 0..300)
        ) {
            model::run_forest_equivalence(ops);
        }
    }
}
