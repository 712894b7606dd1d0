use crate::aabb::Aabb;
use super::BodyKey;
use log::trace;
use std::ops::{Index, IndexMut};

/// Stable address of a branch within its index's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(u32);

/// A slot in the tree: either a branch or a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Branch(BranchId),
    Leaf(BodyKey),
}

/// An internal tree node. Always has exactly two children.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    pub(crate) parent: Option<BranchId>,
    pub(crate) left: Node,
    pub(crate) right: Node,
    /// Union of both children's bounds, once resized.
    pub(crate) aabb: Aabb,
    /// Awaiting a batched resize.
    pub(crate) dirty: bool,
    /// Depth at which the last insertion passing through visited this branch.
    pub(crate) sort: u32,
}
impl Branch {
    #[inline]
    pub fn parent(&self) -> Option<BranchId> {
        self.parent
    }
    #[inline]
    pub fn children(&self) -> (Node, Node) {
        (self.left, self.right)
    }
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Recycles branches released by removals instead of freeing them.
#[derive(Debug, Default)]
pub(crate) struct BranchPool {
    branches: Vec<Branch>,
    free: Vec<BranchId>,
}
impl BranchPool {
    pub(crate) fn with_capacity(capacity: usize) -> BranchPool {
        BranchPool {
            branches: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    pub(crate) fn acquire(&mut self, branch: Branch) -> BranchId {
        //! Every field of a reused slot is overwritten by `branch`.
        if let Some(id) = self.free.pop() {
            self.branches[id.0 as usize] = branch;
            id
        } else {
            let id = BranchId(self.branches.len() as u32);
            trace!("branch pool grown to {}", self.branches.len() + 1);
            self.branches.push(branch);
            id
        }
    }
    #[inline]
    pub(crate) fn release(&mut self, id: BranchId) {
        debug_assert!(!self.free.contains(&id));
        self.free.push(id);
    }

    #[inline]
    pub(crate) fn get(&self, id: BranchId) -> Option<&Branch> {
        //! `None` for released slots.
        self.branches.get(id.0 as usize).filter(|_| !self.free.contains(&id))
    }

    /// Number of branches currently in the tree.
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.branches.len() - self.free.len()
    }
    #[cfg(test)]
    pub(crate) fn pooled(&self) -> usize {
        self.free.len()
    }
}

impl Index<BranchId> for BranchPool {
    type Output = Branch;

    #[inline]
    fn index(&self, id: BranchId) -> &Branch {
        &self.branches[id.0 as usize]
    }
}
impl IndexMut<BranchId> for BranchPool {
    #[inline]
    fn index_mut(&mut self, id: BranchId) -> &mut Branch {
        &mut self.branches[id.0 as usize]
    }
}
