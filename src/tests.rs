use std::ops::Range;

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

// Every ordering of `0..n`.
fn permutations(n: u32) -> Vec<Vec<u32>> {
    fn extend(prefix: &mut Vec<u32>, rest: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
        if rest.is_empty() {
            out.push(prefix.clone());
            return;
        }

        for i in 0..rest.len() {
            let key = rest.remove(i);
            prefix.push(key);
            extend(prefix, rest, out);
            prefix.pop();
            rest.insert(i, key);
        }
    }

    let mut out = Vec::new();
    extend(&mut Vec::new(), &mut (0..n).collect(), &mut out);
    out
}

fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).unwrap();
        tree.assert_invariants();
    }

    tree
}

fn keys_of(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }

    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    assert_eq!(keys_of(&tree), sorted);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { tree.remove_at(node) }.key, *key);
        tree.assert_invariants();
    }
    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key)).unwrap();
    }

    for key in keys.iter().rev() {
        assert_eq!(tree.remove(key).map(|node| node.key), Some(*key));
        assert_eq!(tree.remove(key).map(|node| node.key), None);
        tree.assert_invariants();
    }
    assert!(tree.is_empty());
}

#[test]
fn find_all_permutations() {
    for n in 0..=6 {
        for keys in permutations(n) {
            insert_find_all(&keys);
        }
    }
}

#[test]
fn remove_all_permutations() {
    for n in 0..=6 {
        for keys in permutations(n) {
            insert_remove_all(&keys);
        }
    }
}

#[test]
fn remove_in_every_order_from_full_tree() {
    let inserted: Vec<u32> = (0..7).collect();

    for order in permutations(7) {
        let mut tree = tree_of(&inserted);

        for (removed, key) in order.iter().enumerate() {
            assert!(tree.remove(key).is_some());
            tree.assert_invariants();
            assert_eq!(tree.len(), inserted.len() - removed - 1);
        }
    }
}

#[test]
fn ascending_inserts_stay_logarithmic() {
    let keys: Vec<u32> = (0..1023).collect();
    let tree = tree_of(&keys);

    // A perfectly balanced tree of 1023 nodes has height 9.
    assert_eq!(unsafe { tree.height(tree.root) }, 9);
    assert_eq!(tree.len(), 1023);
}

#[test]
fn select_matches_sorted_order() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    let mut sorted = Vec::new();

    for i in 0..200u32 {
        let key = (i * 37) % 211;
        tree.insert(TestNode::new(key)).unwrap();
        sorted.insert(sorted.binary_search(&key).unwrap_err(), key);

        assert!(tree.select(0).is_none());
        assert!(tree.select(sorted.len() + 1).is_none());

        for (pos, key) in sorted.iter().enumerate() {
            let node = tree.select(pos + 1).expect("rank within bounds");
            assert_eq!(node.key, *key);
            assert_eq!(tree.rank_of(key), Some(pos + 1));
        }
    }

    for key in sorted.clone() {
        tree.remove(&key);
        sorted.remove(0);

        for (pos, key) in sorted.iter().enumerate() {
            assert_eq!(tree.select(pos + 1).map(|node| node.key), Some(*key));
        }
    }
}

#[test]
fn select_after_remove() {
    let mut tree = tree_of(&[5, 3, 8, 1, 4, 7, 9]);
    assert_eq!(tree.select(4).map(|node| node.key), Some(5));

    tree.remove(&3);
    tree.assert_invariants();
    assert_eq!(tree.select(4).map(|node| node.key), Some(7));
    assert_eq!(tree.rank_of(&3), None);
    assert_eq!(tree.rank_of(&9), Some(6));
}

#[test]
fn duplicate_insert_keeps_shape() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7, 0]);

    let mut before = String::new();
    tree.dotgraph("dup", &mut before).unwrap();

    let rejected = tree.insert(TestNode::new(3)).unwrap_err();
    assert_eq!(rejected.key, 3);

    let mut after = String::new();
    tree.dotgraph("dup", &mut after).unwrap();

    assert_eq!(before, after);
    assert_eq!(tree.len(), 8);
    tree.assert_invariants();
}

#[test]
fn dotgraph_labels_height_and_weight() {
    let tree = tree_of(&[2, 1, 3]);

    let mut out = String::new();
    tree.dotgraph("t", &mut out).unwrap();

    let expected = concat!(
        "digraph \"graph-t\" {\n",
        " {rank=same; \"t-2\" [label=\"2 (h=1, w=3)\"]; }\n",
        " {rank=same; \"t-1\" [label=\"1 (h=0, w=1)\"]; \"t-missing0\" [shape=point]; ",
        "\"t-missing1\" [shape=point]; \"t-3\" [label=\"3 (h=0, w=1)\"]; ",
        "\"t-missing2\" [shape=point]; \"t-missing3\" [shape=point]; }\n",
        " \"t-2\" -> \"t-1\";\n",
        " \"t-2\" -> \"t-3\";\n",
        " \"t-1\" -> \"t-missing0\";\n",
        " \"t-1\" -> \"t-missing1\";\n",
        " \"t-3\" -> \"t-missing2\";\n",
        " \"t-3\" -> \"t-missing3\";\n",
        "}\n",
    );
    assert_eq!(out, expected);

    let mut empty = String::new();
    AvlTree::<TestNode>::new().dotgraph("e", &mut empty).unwrap();
    assert_eq!(empty, "digraph \"graph-e\" {}");
}

#[test]
fn first_last_and_iter() {
    let mut tree = tree_of(&[10, 30, 20, 50, 40]);

    assert_eq!(tree.first().map(|node| node.key), Some(10));
    assert_eq!(tree.last().map(|node| node.key), Some(50));
    assert_eq!(tree.iter().len(), 5);
    assert_eq!(keys_of(&tree), [10, 20, 30, 40, 50]);

    let mut iter = tree.iter();
    iter.nth(4);
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());

    tree.clear();
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert_eq!(tree.len(), 0);

    tree.insert(TestNode::new(1)).unwrap();
    assert_eq!(keys_of(&tree), [1]);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn map_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_map_equivalence(ops);
    }
}
