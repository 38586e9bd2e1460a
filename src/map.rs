use core::{borrow::Borrow, fmt, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Error, Links, Result, TreeNode};

/// An ordered map that can also be indexed by rank.
///
/// Entries live in individually boxed nodes of an [`AvlTree`], so insertion and removal never move
/// existing entries.
pub struct AugmentedSearchTree<K: Ord + fmt::Debug, V> {
    tree: AvlTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

impl<K, V> MapNode<K, V> {
    fn boxed(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        // SAFETY: `ptr` is non-null, so a pointer to one of its fields is too.
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr.as_ptr()).links)) }
    }
}

impl<K: Ord + fmt::Debug, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord + fmt::Debug, V> AugmentedSearchTree<K, V> {
    /// Creates a new, empty map.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the map contains no entries.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map contains an entry for `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Inserts `value` under `key`.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already present, in which case the map is
    /// unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        match self.tree.insert(MapNode::boxed(key, value)) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(len = self.tree.len(), "inserted entry");

                Ok(())
            }
            Err(_rejected) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = ?_rejected.key, "rejected duplicate key");

                Err(Error::DuplicateKey)
            }
        }
    }

    /// Returns a reference to the value stored under `key`.
    #[inline]
    pub fn search<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .get(key)
            .map(|node| &node.get_ref().value)
            .ok_or(Error::NotFound)
    }

    /// Returns a mutable reference to the value stored under `key`.
    #[inline]
    pub fn search_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .get_mut(key)
            // SAFETY: Pinning is not structural for `node.value`.
            .map(|node| unsafe { &mut node.get_unchecked_mut().value })
            .ok_or(Error::NotFound)
    }

    /// Removes the entry stored under `key` and returns its value.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.tree.remove(key).ok_or(Error::NotFound)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(key = ?node.key, len = self.tree.len(), "removed entry");

        Ok(node.value)
    }

    /// Returns the `rank`-th smallest entry, counting from 1.
    ///
    /// Fails with [`Error::IndexOutOfRange`] unless `1 <= rank <= self.len()`.
    pub fn rank_select(&self, rank: usize) -> Result<(&K, &V)> {
        self.tree
            .select(rank)
            .map(|node| {
                let node = node.get_ref();
                (&node.key, &node.value)
            })
            .ok_or(Error::IndexOutOfRange)
    }

    /// Returns the 1-based position of `key` among the keys of the map.
    pub fn rank_of<Q>(&self, key: &Q) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.rank_of(key).ok_or(Error::NotFound)
    }

    /// Returns the entry with the smallest key.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns the entry with the largest key.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns an iterator over the entries in ascending key order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> + '_ {
        self.tree.iter().map(|node| (&node.key, &node.value))
    }

    /// Removes every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord + fmt::Debug, V> Default for AugmentedSearchTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AugmentedSearchTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
