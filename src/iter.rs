use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use crate::{AvlTree, Link, Links, TreeNode};

/// An in-order iterator over the elements of an [`AvlTree`].
///
/// Iteration follows parent links, so it needs no auxiliary stack.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    next: Link<T>,
    remaining: usize,
    _tree: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        let next = tree.root.map(|root| unsafe { tree.min_in_subtree(root).0 });

        Iter {
            next,
            remaining: tree.len(),
            _tree: PhantomData,
        }
    }
}

// Returns the in-order successor of `node`.
//
// If `node` has a right subtree the successor is its minimum. Otherwise it is the first ancestor
// reached from a left child.
unsafe fn successor<T: TreeNode<Links<T>> + ?Sized>(node: NonNull<T>) -> Link<T> {
    unsafe {
        if let Some(mut cur) = T::links(node).as_ref().right() {
            while let Some(left) = T::links(cur).as_ref().left() {
                cur = left;
            }

            return Some(cur);
        }

        let mut cur = node;
        while let Some(parent) = T::links(cur).as_ref().parent() {
            if T::links(parent).as_ref().left() == Some(cur) {
                return Some(parent);
            }

            cur = parent;
        }

        None
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;

        unsafe {
            self.next = successor(cur);
            self.remaining -= 1;

            Some(cur.as_ref())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}
