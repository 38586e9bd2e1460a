//! Reference-model equivalence harnesses shared by the property tests and the fuzz targets.
//!
//! Each harness replays a sequence of operations against one of the crate's containers and
//! against a straightforward model built on `std`, asserting after every step that both agree.

use std::{collections::BTreeMap, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::{
    prelude::any,
    strategy::{Just, Strategy},
};

use crate::{AugmentedSearchTree, Element, Error, LazyUnionFind, Links, Order, TreeNode};

/// A bare tree node keyed by `u32`, for driving [`AvlTree`](crate::AvlTree) directly.
#[derive(Debug)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr.as_ptr()).links)) }
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// A key chosen either among the keys currently present or at random.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

impl ItemValue {
    fn resolve(self, sorted: &[u32]) -> u32 {
        match self {
            ItemValue::Index(idx) if sorted.is_empty() => idx as u32,
            ItemValue::Index(idx) => sorted[idx % sorted.len()],
            ItemValue::Random(v) => v,
        }
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![
        (0usize..1000).prop_map(ItemValue::Index),
        (0u32..1000).prop_map(ItemValue::Random),
    ]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Search(ItemValue),
    Remove(ItemValue),
    // Reduced modulo `len + 2`, so both out-of-range ranks occur.
    RankSelect(usize),
    RankOf(ItemValue),
    First,
    Last,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        3 => value_strategy().prop_map(Op::Insert),
        1 => value_strategy().prop_map(Op::Search),
        2 => value_strategy().prop_map(Op::Remove),
        2 => any::<usize>().prop_map(Op::RankSelect),
        1 => value_strategy().prop_map(Op::RankOf),
        1 => Just(Op::First),
        1 => Just(Op::Last),
    ]
}

/// Replays `ops` against an [`AugmentedSearchTree`] and a [`BTreeMap`].
///
/// Every value is twice its key, so a value mix-up between nodes is caught too.
pub fn run_map_equivalence(ops: Vec<Op>) {
    let mut btree = BTreeMap::new();
    let mut map = AugmentedSearchTree::new();

    fn sorted_keys(btree: &BTreeMap<u32, u64>) -> Vec<u32> {
        btree.keys().copied().collect()
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let sorted = sorted_keys(&btree);

        match op {
            Op::Insert(item) => {
                let key = item.resolve(&sorted);
                let expected = if btree.contains_key(&key) {
                    Err(Error::DuplicateKey)
                } else {
                    btree.insert(key, u64::from(key) * 2);
                    Ok(())
                };

                assert_eq!(
                    map.insert(key, u64::from(key) * 2),
                    expected,
                    "Op #{op_id}: {op:?}"
                );
            }

            Op::Search(item) => {
                let key = item.resolve(&sorted);
                let expected = btree.get(&key).ok_or(Error::NotFound);

                assert_eq!(map.search(&key), expected, "Op #{op_id}: {op:?}");
                assert_eq!(map.contains_key(&key), expected.is_ok());
            }

            Op::Remove(item) => {
                let key = item.resolve(&sorted);
                let expected = btree.remove(&key).ok_or(Error::NotFound);

                assert_eq!(map.remove(&key), expected, "Op #{op_id}: {op:?}");
            }

            Op::RankSelect(rank) => {
                let rank = rank % (sorted.len() + 2);
                let expected = match rank {
                    0 => Err(Error::IndexOutOfRange),
                    _ => sorted
                        .get(rank - 1)
                        .map(|key| (key, &btree[key]))
                        .ok_or(Error::IndexOutOfRange),
                };

                assert_eq!(map.rank_select(rank), expected, "Op #{op_id}: {op:?}");
            }

            Op::RankOf(item) => {
                let key = item.resolve(&sorted);
                let expected = sorted
                    .binary_search(&key)
                    .map(|pos| pos + 1)
                    .map_err(|_| Error::NotFound);

                assert_eq!(map.rank_of(&key), expected, "Op #{op_id}: {op:?}");
            }

            Op::First => {
                assert_eq!(
                    map.first_key_value(),
                    btree.first_key_value(),
                    "Op #{op_id}: {op:?}"
                );
            }

            Op::Last => {
                assert_eq!(
                    map.last_key_value(),
                    btree.last_key_value(),
                    "Op #{op_id}: {op:?}"
                );
            }
        }

        map.assert_invariants();
        assert_eq!(map.len(), btree.len());
        assert!(map.iter().eq(btree.iter()));
    }
}

/// A union-find payload carrying nothing but liveness.
#[derive(Debug)]
pub struct TestMember {
    alive: bool,
}

impl TestMember {
    pub fn new() -> Self {
        TestMember { alive: true }
    }
}

impl Default for TestMember {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for TestMember {
    type Value = i64;

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn mark_dead(&mut self) {
        self.alive = false;
    }
}

/// An operation on a [`LazyUnionFind`]. Indices are reduced modulo the number of elements.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ForestOp {
    MakeSet { value: i16, carry: i16 },
    AddToSet(usize, i16),
    Contribute(usize, i16),
    Combine { first: usize, second: usize, absorb: bool },
    Find(usize),
    Query(usize),
    AddExperience(usize, i16),
    Kill(usize),
    // Addresses one past the last element.
    OutOfRange,
}

pub fn forest_op_strategy() -> impl Strategy<Value = ForestOp> {
    proptest::prop_oneof![
        3 => (any::<i16>(), any::<i16>())
            .prop_map(|(value, carry)| ForestOp::MakeSet { value, carry }),
        1 => (any::<usize>(), any::<i16>()).prop_map(|(idx, delta)| ForestOp::AddToSet(idx, delta)),
        1 => (any::<usize>(), any::<i16>()).prop_map(|(idx, delta)| ForestOp::Contribute(idx, delta)),
        4 => (any::<usize>(), any::<usize>(), any::<bool>()).prop_map(|(first, second, absorb)| {
            ForestOp::Combine {
                first,
                second,
                absorb,
            }
        }),
        1 => any::<usize>().prop_map(ForestOp::Find),
        2 => any::<usize>().prop_map(ForestOp::Query),
        1 => (any::<usize>(), any::<i16>())
            .prop_map(|(idx, delta)| ForestOp::AddExperience(idx, delta)),
        1 => any::<usize>().prop_map(ForestOp::Kill),
        1 => Just(ForestOp::OutOfRange),
    ]
}

// One set of the eager model. Sets are labelled by the index they were created with.
#[derive(Debug)]
struct ModelSet {
    members: Vec<usize>,
    group: i64,
    experience: i64,
    alive: bool,
}

#[derive(Debug, Default)]
struct ForestModel {
    values: Vec<i64>,
    set_of: Vec<usize>,
    sets: Vec<ModelSet>,
}

impl ForestModel {
    fn set(&mut self, idx: usize) -> &mut ModelSet {
        let label = self.set_of[idx];
        &mut self.sets[label]
    }

    fn shift(&mut self, label: usize, delta: i64) {
        for &member in &self.sets[label].members {
            self.values[member] += delta;
        }
    }

    fn union(&mut self, first: usize, second: usize, order: Order) {
        let (a, b) = (self.set_of[first], self.set_of[second]);
        let (group_a, group_b) = (self.sets[a].group, self.sets[b].group);

        if order == Order::Merge {
            self.shift(a, group_b);
        }
        self.shift(b, group_a);

        // The larger set's representative survives, with ties going to the first.
        let (top, sub) = if self.sets[a].members.len() >= self.sets[b].members.len() {
            (a, b)
        } else {
            (b, a)
        };

        let moved = core::mem::take(&mut self.sets[sub].members);
        for &member in &moved {
            self.set_of[member] = top;
        }

        let (group, experience) = (self.sets[sub].group, self.sets[sub].experience);
        let top = &mut self.sets[top];
        top.members.extend(moved);
        top.group += group;
        top.experience += experience;
    }
}

/// Replays `ops` against a [`LazyUnionFind`] and an eager model that updates every member value
/// immediately.
pub fn run_forest_equivalence(ops: Vec<ForestOp>) {
    let mut forest: LazyUnionFind<TestMember> = LazyUnionFind::new();
    let mut model = ForestModel::default();

    fn check(forest: &mut LazyUnionFind<TestMember>, model: &mut ForestModel, idx: usize) {
        assert_eq!(forest.query_additive(idx), Ok(model.values[idx]), "value of {idx}");

        let set = model.set(idx);
        let (size, group, experience, alive) =
            (set.members.len(), set.group, set.experience, set.alive);
        let first = set.members[0];

        assert_eq!(forest.set_size(idx), Ok(size), "size of set of {idx}");
        assert_eq!(forest.group_total(idx), Ok(group), "group of {idx}");
        assert_eq!(forest.get_experience(idx), Ok(experience));
        assert_eq!(forest.is_alive(idx), Ok(alive));
        assert_eq!(forest.find(idx), forest.find(first));
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let len = model.values.len();

        if let ForestOp::MakeSet { value, carry } = op {
            let (value, carry) = (i64::from(value), i64::from(carry));

            assert_eq!(
                forest.make_set_with(TestMember::new(), value, carry),
                Ok(len),
                "ForestOp #{op_id}: {op:?}"
            );

            model.values.push(value);
            model.set_of.push(len);
            model.sets.push(ModelSet {
                members: vec![len],
                group: carry,
                experience: 0,
                alive: true,
            });

            check(&mut forest, &mut model, len);
            continue;
        }

        if len == 0 {
            continue;
        }

        match op {
            ForestOp::MakeSet { .. } => unreachable!(),

            ForestOp::AddToSet(idx, delta) => {
                let (idx, delta) = (idx % len, i64::from(delta));
                forest.add_to_set(idx, delta).unwrap();

                let label = model.set_of[idx];
                model.shift(label, delta);
                check(&mut forest, &mut model, idx);
            }

            ForestOp::Contribute(idx, delta) => {
                let (idx, delta) = (idx % len, i64::from(delta));
                forest.contribute(idx, delta).unwrap();

                let label = model.set_of[idx];
                model.shift(label, delta);
                model.sets[label].group += delta;
                check(&mut forest, &mut model, idx);
            }

            ForestOp::Combine {
                first,
                second,
                absorb,
            } => {
                let (first, second) = (first % len, second % len);
                let order = if absorb { Order::Absorb } else { Order::Merge };

                if model.set_of[first] == model.set_of[second] {
                    assert_eq!(
                        forest.combine(first, second, order),
                        Err(Error::AlreadyUnioned),
                        "ForestOp #{op_id}: {op:?}"
                    );
                } else {
                    assert_eq!(
                        forest.combine(first, second, order),
                        Ok(()),
                        "ForestOp #{op_id}: {op:?}"
                    );
                    model.union(first, second, order);
                }

                check(&mut forest, &mut model, first);
                check(&mut forest, &mut model, second);
            }

            ForestOp::Find(idx) => {
                let idx = idx % len;
                let root = forest.find(idx).unwrap();

                assert_eq!(model.set_of[root], model.set_of[idx]);
                assert_eq!(forest.find(root), Ok(root));
            }

            ForestOp::Query(idx) => {
                let idx = idx % len;
                assert_eq!(
                    forest.query_additive(idx),
                    Ok(model.values[idx]),
                    "ForestOp #{op_id}: {op:?}"
                );
            }

            ForestOp::AddExperience(idx, delta) => {
                let root = forest.find(idx % len).unwrap();
                forest.add_experience(root, i64::from(delta)).unwrap();

                model.set(root).experience += i64::from(delta);
                check(&mut forest, &mut model, root);
            }

            ForestOp::Kill(idx) => {
                let idx = idx % len;
                forest.mark_dead(idx).unwrap();

                model.set(idx).alive = false;
                check(&mut forest, &mut model, idx);
            }

            ForestOp::OutOfRange => {
                assert_eq!(forest.query_additive(len), Err(Error::IndexOutOfRange));
                assert_eq!(
                    forest.combine(0, len, Order::Merge),
                    Err(Error::IndexOutOfRange)
                );
            }
        }
    }

    for idx in 0..model.values.len() {
        check(&mut forest, &mut model, idx);
    }
}
