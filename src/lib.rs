//! Height-balanced order-statistic trees and lazily aggregated disjoint sets.
//!
//! The crate has two independent cores:
//!
//! - [`AvlTree`], an intrusive AVL tree whose links also record the size of each subtree, so the
//!   `i`-th smallest element can be found in _O(log(n))_ without a traversal.
//!   [`AugmentedSearchTree`] wraps it into an owning key/value map.
//! - [`LazyUnionFind`], an index-addressed disjoint-set forest (union by size, path compression)
//!   whose members carry additive values that stay queryable after any sequence of unions.
//!
//! [`huntech`] composes both into a small squad/hunter ledger, using [`id_table::IdTable`] to map
//! external identifiers onto union-find slots.

// Conventions used in comments:
// - The height of a node `x` is denoted `h(x)`; leaves have height 0 and a missing child -1.
// - The weight of a node `x` is denoted `w(x)`; it counts the nodes of the subtree rooted at `x`,
//   including `x` itself, and a missing child weighs 0.
// - The balance factor of `x` is `h(left(x)) - h(right(x))`.
//
// The invariants of the tree are:
// 1. Every balance factor lies in -1..=1.
// 2. `h(x) = 1 + max(h(left(x)), h(right(x)))`.
// 3. `w(x) = 1 + w(left(x)) + w(right(x))`.
// 4. An in-order walk yields strictly ascending keys.
//
// Parent pointers are non-owning. Ownership of every node is held by the tree as a whole and is
// only handed back through `Linked::from_ptr` on removal or clear.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod arena;
mod debug;
mod error;
mod iter;
mod map;
mod union_find;

pub mod huntech;
pub mod id_table;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use iter::Iter;
pub use map::AugmentedSearchTree;
pub use union_find::{Additive, Element, LazyUnionFind, Order};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree augmented with subtree weights.
///
/// Besides the usual search operations, the weights let [`select`](AvlTree::select) and
/// [`rank_of`](AvlTree::rank_of) answer order-statistic queries in _O(log(n))_.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: i32,
    weight: usize,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    ///
    /// This is the weight of the root, so it completes in _O(1)_ time.
    pub fn len(&self) -> usize {
        unsafe { self.weight(self.root) }
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert_eq!(
                    T::links(root).as_ref().parent(),
                    None,
                    "root must not have a parent"
                );
                self.assert_invariants_at(root, None, None);
            }
        }
    }

    // Checks the subtree rooted at `node`, whose keys must lie strictly between `lower` and
    // `upper`, and returns its height and weight as recomputed from scratch.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
    ) -> (i32, usize) {
        unsafe {
            let links = T::links(node).as_ref();
            let key = node.as_ref().key();

            if let Some(lower) = lower {
                assert!(lower < key, "keys out of order: {lower:?} before {key:?}");
            }

            if let Some(upper) = upper {
                assert!(key < upper, "keys out of order: {key:?} before {upper:?}");
            }

            let mut heights = [-1; 2];
            let mut weights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = links.child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    let (height, weight) = self.assert_invariants_at(child, lower, upper);
                    heights[dir as usize] = height;
                    weights[dir as usize] = weight;
                }
            }

            let height = 1 + heights[0].max(heights[1]);
            let weight = 1 + weights[0] + weights[1];

            assert_eq!(links.height(), height, "stale height at {key:?}");
            assert_eq!(links.weight(), weight, "stale weight at {key:?}");
            assert!(
                (heights[0] - heights[1]).abs() <= 1,
                "unbalanced node {key:?}: heights {heights:?}"
            );

            (height, weight)
        }
    }

    /// Returns `true` if the tree contains an element with the key `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// The key of the returned node must not be modified in a way that changes its ordering.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let mut cur = self.root?;

        unsafe {
            while let Some(right) = T::links(cur).as_ref().right() {
                cur = right;
            }

            Some(Pin::new_unchecked(cur.as_ref()))
        }
    }

    /// Returns the `rank`-th smallest element of the tree, counting from 1.
    ///
    /// Returns `None` unless `1 <= rank <= self.len()`. This operation completes in
    /// _O(log(n))_ time.
    pub fn select(&self, rank: usize) -> Option<Pin<&T>> {
        if rank == 0 || rank > self.len() {
            return None;
        }

        let mut rank = rank;
        let mut cur = self.root?;

        unsafe {
            loop {
                let links = T::links(cur).as_ref();
                let left_weight = self.weight(links.left());

                match rank.cmp(&(left_weight + 1)) {
                    Ordering::Less => cur = links.left()?,
                    Ordering::Equal => return Some(Pin::new_unchecked(cur.as_ref())),
                    Ordering::Greater => {
                        rank -= left_weight + 1;
                        cur = links.right()?;
                    }
                }
            }
        }
    }

    /// Returns the 1-based position of `key` in the sorted order of the tree.
    pub fn rank_of<Q>(&self, key: &Q) -> Option<usize>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut preceding = 0;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                let links = T::links(cur).as_ref();
                let left_weight = self.weight(links.left());

                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = links.left(),
                    Ordering::Equal => return Some(preceding + left_weight + 1),
                    Ordering::Greater => {
                        preceding += left_weight + 1;
                        opt_cur = links.right();
                    }
                }
            }
        }

        None
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of `parent`.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, Some(old_child));
            debug_assert_eq!(
                T::links(parent).as_ref().child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    // Recomputes the height and weight of `node` from its children.
    #[inline]
    unsafe fn update_stats(&mut self, node: NonNull<T>) {
        unsafe {
            let links = T::links(node).as_mut();
            let (left, right) = (links.left(), links.right());

            let height = 1 + self.height(left).max(self.height(right));
            let weight = 1 + self.weight(left) + self.weight(right);

            links.set_stats(height, weight);
        }
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // The heights and weights of both nodes are recomputed, `down` first since it is now the
    // child.
    unsafe fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if T::links(down).as_ref().right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            self.update_stats(down);
            self.update_stats(up);
        }
    }

    // Refreshes `node` and, if it is out of balance, rotates it down.
    //
    // Returns the node now at the top of the subtree formerly rooted at `node`.
    unsafe fn rebalance_at(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            self.update_stats(node);

            let balance = self.balance(node);
            let heavy = if balance > 1 {
                Dir::Left
            } else if balance < -1 {
                Dir::Right
            } else {
                return node;
            };

            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("heavy side of an unbalanced node is never empty");

            // A child leaning away from `node` is first rotated towards it (the LR and RL cases).
            let child_balance = self.balance(child);
            let leans_away = match heavy {
                Dir::Left => child_balance < 0,
                Dir::Right => child_balance > 0,
            };

            #[cfg(feature = "tracing")]
            tracing::trace!(
                key = ?node.as_ref().key(),
                balance,
                double = leans_away,
                "rotating unbalanced node"
            );

            let up = if leans_away {
                let grandchild = T::links(child)
                    .as_ref()
                    .child(!heavy)
                    .expect("child leaning away has an inner child");
                self.rotate_at(child, grandchild);
                grandchild
            } else {
                child
            };

            self.rotate_at(node, up);
            up
        }
    }

    // Walks from `opt_node` to the root, restoring the height, weight and balance of every node
    // on the way.
    fn rebalance_from(&mut self, mut opt_node: Link<T>) {
        while let Some(node) = opt_node {
            unsafe {
                // Continue above the rotated subtree; its new top is already correct.
                let top = self.rebalance_at(node);
                opt_node = T::links(top).as_ref().parent();
            }
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with an equal key, the tree is left untouched and `item`
    /// is handed back as the error.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Result<(), T::Handle> {
        let ptr = T::into_ptr(item);
        unsafe { T::links(ptr).as_mut().reset() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            return Ok(());
        };

        let mut parent = root;

        // Descend the tree, looking for a suitable leaf.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Err(unsafe { T::from_ptr(ptr) }),
                Ordering::Greater => Dir::Right,
            };

            unsafe {
                let parent_links = T::links(parent).as_mut();
                match parent_links.child(dir) {
                    // Descend.
                    Some(child) => parent = child,

                    // Set `item` as child.
                    None => {
                        parent_links.set_child(dir, Some(ptr));
                        T::links(ptr).as_mut().set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        self.rebalance_from(Some(parent));

        Ok(())
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    /// Removes the item with the key `key` from the tree, if present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are two possible shapes:
        //
        // 1. `node` has two children.
        //
        //    `node`'s successor (the least node of its right subtree) has no left child. It is
        //    unlinked, its right child is elevated into its old place, and it then assumes `node`'s
        //    position. Rebalancing starts at the successor's old parent, or at the successor
        //    itself if it was `node`'s right child.
        //
        // 2. `node` has at most one child.
        //
        //    The child (if any) is elevated into `node`'s place, and rebalancing starts at
        //    `node`'s parent.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            let rebalance_start = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    if let Some(successor_parent) = successor_parent {
                        // Elevate the successor's right child to replace it.
                        let successor_right = T::links(successor).as_ref().right();
                        self.replace_child(successor_parent, successor, successor_right);
                        self.maybe_set_parent(successor_right, Some(successor_parent));

                        T::links(successor).as_mut().set_right(Some(right));
                        T::links(right).as_mut().set_parent(Some(successor));
                    }

                    T::links(successor).as_mut().set_left(Some(left));
                    T::links(left).as_mut().set_parent(Some(successor));

                    T::links(successor).as_mut().set_parent(parent);
                    self.replace_child_or_set_root(parent, node, Some(successor));

                    Some(successor_parent.unwrap_or(successor))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    T::links(child).as_mut().set_parent(parent);
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            self.rebalance_from(rebalance_start);

            T::links(node).as_mut().reset();
            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                drop(T::from_ptr(cur));

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
    }

    // Support methods ========================================================

    /// Returns the height of the pointed-to node, or -1 for a missing node.
    #[inline]
    unsafe fn height(&self, node: Link<T>) -> i32 {
        node.map(|n| unsafe { T::links(n).as_ref().height() })
            .unwrap_or(-1)
    }

    /// Returns the weight of the pointed-to node, or 0 for a missing node.
    #[inline]
    unsafe fn weight(&self, node: Link<T>) -> usize {
        node.map(|n| unsafe { T::links(n).as_ref().weight() })
            .unwrap_or(0)
    }

    #[inline]
    unsafe fn balance(&self, node: NonNull<T>) -> i32 {
        unsafe {
            let links = T::links(node).as_ref();
            self.height(links.left()) - self.height(links.right())
        }
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: Link<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == child {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                weight: 1,
                _unpin: PhantomPinned,
            }),
        }
    }

    // Detaches the links, leaving them as those of a lone leaf.
    fn reset(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
        inner.weight = 1;
    }

    #[inline]
    fn height(&self) -> i32 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn weight(&self) -> usize {
        unsafe { (*self.inner.get()).weight }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_stats(&mut self, height: i32, weight: usize) {
        let inner = self.inner.get_mut();
        inner.height = height;
        inner.weight = weight;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .field("weight", &self.weight())
            .finish()
    }
}
