use core::ptr::NonNull;
use std::{collections::VecDeque, fmt};

use crate::{AvlTree, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    /// Writes the tree as a Graphviz digraph, one rank per tree level.
    ///
    /// Each node is labelled `key (h=height, w=weight)`; missing children are drawn as points.
    pub fn dotgraph<W: fmt::Write>(&self, name: &str, mut w: W) -> fmt::Result {
        use fmt::Write;

        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        let mut queue: VecDeque<NonNull<T>> = VecDeque::new();
        queue.push_back(root);

        writeln!(w, "digraph \"graph-{name}\" {{")?;

        let mut missing = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            write!(w, " {{rank=same; ")?;

            for _ in 0..queue.len() {
                let Some(node) = queue.pop_front() else {
                    break;
                };

                let links = unsafe { T::links(node).as_ref() };
                let key = unsafe { node.as_ref().key() };
                write!(
                    w,
                    "\"{name}-{key}\" [label=\"{key} (h={}, w={})\"]; ",
                    links.height(),
                    links.weight()
                )?;

                for child in [links.left(), links.right()] {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };
                            writeln!(edges, " \"{name}-{key}\" -> \"{name}-{child_key}\";")?;
                            queue.push_back(child);
                        }
                        None => {
                            write!(w, "\"{name}-missing{missing}\" [shape=point]; ")?;
                            writeln!(edges, " \"{name}-{key}\" -> \"{name}-missing{missing}\";")?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;
        w.write_str("}\n")
    }
}
