//! Broadphase data and logic module: a dynamic bounding volume hierarchy over padded body bounds.

mod branch;

pub use branch::{Branch, BranchId, Node};

use crate::{aabb::Aabb, body::Body, error::CollisionError, Fp};
use branch::BranchPool;
use fnv::FnvBuildHasher;
use indexmap::IndexSet;
use log::{debug, trace};
use slotmap::{SecondaryMap, SlotMap};
use std::{cmp::Reverse, sync::atomic::{AtomicU64, Ordering}};

slotmap::new_key_type! {
    /// Arena key of a body within one index.
    pub struct BodyKey;
}

/// Identifies one index instance for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(u64);
impl IndexId {
    fn next() -> IndexId {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        IndexId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Refers to a body held by a specific index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    index: IndexId,
    key: BodyKey,
}
impl BodyHandle {
    #[inline]
    pub fn index(&self) -> IndexId {
        self.index
    }
    #[inline]
    pub fn key(&self) -> BodyKey {
        self.key
    }
}

/// Tree bookkeeping of one body, kept beside the body so that replacing the body in place
/// cannot detach it from the tree.
#[derive(Debug, Clone, Copy, Default)]
struct Leaf {
    parent: Option<BranchId>,
    /// Padded bounds the body was last inserted with.
    aabb: Aabb,
    /// Padding the body was last inserted with.
    padding: Fp,
}

/// A bounding volume hierarchy owning its bodies.
///
/// The tree is a full binary tree: bodies are leaves, and every [`Branch`] has two children.
/// Bodies are stored with padded bounds, so movement within the padding costs nothing;
/// [`Bvh::update`] reinserts the bodies that escaped their padded bounds and then tightens the
/// branches left loose by removals, deepest first.
#[derive(Debug)]
pub struct Bvh {
    id: IndexId,
    bodies: SlotMap<BodyKey, Body>,
    leaves: SecondaryMap<BodyKey, Leaf>,
    branches: BranchPool,
    root: Option<Node>,
    /// Branches awaiting a resize.
    dirty: IndexSet<BranchId, FnvBuildHasher>,
    scratch: Vec<BodyKey>,
}

impl Default for Bvh {
    fn default() -> Self {
        Self::new()
    }
}

impl Bvh {
    pub fn new() -> Bvh {
        Bvh::with_capacity(0)
    }
    pub fn with_capacity(bodies: usize) -> Bvh {
        Bvh {
            id: IndexId::next(),
            bodies: SlotMap::with_capacity_and_key(bodies),
            leaves: SecondaryMap::with_capacity(bodies),
            branches: BranchPool::with_capacity(bodies.saturating_sub(1)),
            root: None,
            dirty: IndexSet::default(),
            scratch: Vec::with_capacity(bodies),
        }
    }

    #[inline]
    pub fn id(&self) -> IndexId {
        self.id
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
    #[inline]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.key(handle).is_ok()
    }

    #[inline]
    pub fn handle(&self, key: BodyKey) -> BodyHandle {
        BodyHandle { index: self.id, key }
    }
    fn key(&self, handle: BodyHandle) -> Result<BodyKey, CollisionError> {
        if handle.index != self.id {
            Err(CollisionError::ForeignHandle { owner: handle.index })
        } else if !self.bodies.contains_key(handle.key) {
            Err(CollisionError::UnknownBody)
        } else {
            Ok(handle.key)
        }
    }

    pub fn get(&self, handle: BodyHandle) -> Result<&Body, CollisionError> {
        let key = self.key(handle)?;
        Ok(&self.bodies[key])
    }
    pub fn get_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, CollisionError> {
        let key = self.key(handle)?;
        Ok(&mut self.bodies[key])
    }
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.bodies.iter().map(move |(key, body)| (self.handle(key), body))
    }
    pub fn padded_aabb(&self, handle: BodyHandle) -> Result<Aabb, CollisionError> {
        //! The padded bounds stored when the body was last (re)inserted.
        let key = self.key(handle)?;
        Ok(self.leaves[key].aabb)
    }

    pub(crate) fn refreshed_pair(&mut self, a: BodyHandle, b: BodyHandle) -> Result<(&Body, &Body), CollisionError> {
        //! Brings both bodies' cached geometry up to date.
        let ka = self.key(a)?;
        let kb = self.key(b)?;
        self.bodies[ka].refresh();
        self.bodies[kb].refresh();
        Ok((&self.bodies[ka], &self.bodies[kb]))
    }

    // ---------- Tree Inspection ---------- //

    #[inline]
    pub fn root(&self) -> Option<Node> {
        self.root
    }
    #[inline]
    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        //! `None` once the branch was released. Ids are recycled, so an id kept across
        //! insertions may name a different branch.
        self.branches.get(id)
    }
    #[inline]
    pub fn branch_count(&self) -> usize {
        self.branches.live()
    }
    pub fn node_aabb(&self, node: Node) -> Option<Aabb> {
        //! The bounds stored for `node`: padded bounds for leaves, the children's union for branches.
        //! `None` for nodes no longer in the tree, with the caveat of [`Bvh::branch`].
        match node {
            Node::Branch(id) => self.branches.get(id).map(|b| b.aabb),
            Node::Leaf(key) => self.leaves.get(key).map(|l| l.aabb),
        }
    }
    #[inline]
    fn stored_aabb(&self, node: Node) -> Aabb {
        match node {
            Node::Branch(id) => self.branches[id].aabb,
            Node::Leaf(key) => self.leaves[key].aabb,
        }
    }
    fn parent(&self, node: Node) -> Option<BranchId> {
        match node {
            Node::Branch(id) => self.branches[id].parent,
            Node::Leaf(key) => self.leaves[key].parent,
        }
    }
    fn set_parent(&mut self, node: Node, parent: Option<BranchId>) {
        match node {
            Node::Branch(id) => self.branches[id].parent = parent,
            Node::Leaf(key) => self.leaves[key].parent = parent,
        }
    }
    fn replace_child(&mut self, parent: Option<BranchId>, old: Node, new: Node) {
        //! Puts `new` in the slot `old` occupies under `parent`, or at the root.
        match parent {
            None => self.root = Some(new),
            Some(id) => {
                let branch = &mut self.branches[id];
                if branch.left == old {
                    branch.left = new;
                } else {
                    branch.right = new;
                }
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (Node, Aabb)> + '_ {
        //! Every node with its stored bounds, parents before children, left before right.
        //! Nothing is recomputed, so this is safe to call while drawing.
        let mut stack: Vec<Node> = self.root.into_iter().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            if let Node::Branch(id) = node {
                let branch = &self.branches[id];
                stack.push(branch.right);
                stack.push(branch.left);
            }
            Some((node, self.stored_aabb(node)))
        })
    }

    // ---------- Insertion & Removal ---------- //

    pub fn insert(&mut self, body: Body) -> Result<BodyHandle, CollisionError> {
        //! Takes ownership of `body`, indexing it by its padded bounds.
        if let Some(owner) = body.owner {
            if owner != self.id {
                return Err(CollisionError::ForeignBody { owner });
            }
        }
        Ok(self.adopt(body))
    }
    pub(crate) fn adopt(&mut self, mut body: Body) -> BodyHandle {
        //! Inserts without the ownership check, for freshly built bodies.
        body.owner = Some(self.id);

        let key = self.bodies.insert(body);
        self.leaves.insert(key, Leaf::default());
        self.insert_leaf(key, false);
        debug!("inserted body {:?} into index {:?}", key, self.id);
        self.handle(key)
    }

    pub fn remove(&mut self, handle: BodyHandle) -> Result<Body, CollisionError> {
        //! Hands the body back, no longer owned by any index.
        let key = self.key(handle)?;
        self.remove_leaf(key);

        self.leaves.remove(key);
        let mut body = self.bodies.remove(key).ok_or(CollisionError::UnknownBody)?;
        body.owner = None;
        debug!("removed body {:?} from index {:?}", key, self.id);
        Ok(body)
    }

    fn insert_leaf(&mut self, key: BodyKey, updating: bool) {
        let body = &mut self.bodies[key];
        body.refresh_coords();
        let aabb = body.aabb().expand(body.padding);
        self.leaves[key] = Leaf { parent: None, aabb, padding: body.padding };

        let mut current = match self.root {
            Some(root) => root,
            None => {
                self.root = Some(Node::Leaf(key));
                return;
            }
        };

        let mut sort = 0;
        loop {
            match current {
                Node::Branch(id) => {
                    let Branch { left, right, parent, .. } = self.branches[id];
                    let left_aabb = self.stored_aabb(left);
                    let right_aabb = self.stored_aabb(right);
                    let left_grown = left_aabb.union(&aabb);
                    let right_grown = right_aabb.union(&aabb);
                    // minimum enlargement heuristic
                    let left_cost = left_grown.area() - left_aabb.area();
                    let right_cost = right_grown.area() - right_aabb.area();

                    let branch = &mut self.branches[id];
                    let assumed = branch.aabb.union(&aabb);
                    branch.aabb = left_grown.union(&right_grown);
                    branch.sort = sort;
                    sort += 1;

                    // the branch was just resized from its children, so it no longer needs to be,
                    // but any ancestor sized against its stale bounds does
                    if updating && branch.dirty {
                        branch.dirty = false;
                        let shrunk = branch.aabb != assumed;
                        self.dirty.swap_remove(&id);
                        if let (true, Some(parent)) = (shrunk, parent) {
                            self.mark_dirty(parent);
                        }
                    }

                    current = if left_cost <= right_cost { left } else { right };
                }
                Node::Leaf(sibling) => {
                    let Leaf { parent: grandparent, aabb: sibling_aabb, .. } = self.leaves[sibling];
                    let new_parent = self.branches.acquire(Branch {
                        parent: grandparent,
                        left: current,
                        right: Node::Leaf(key),
                        aabb: sibling_aabb.union(&aabb),
                        dirty: false,
                        sort,
                    });

                    self.leaves[sibling].parent = Some(new_parent);
                    self.leaves[key].parent = Some(new_parent);
                    self.replace_child(grandparent, current, Node::Branch(new_parent));
                    break;
                }
            }
        }
    }

    fn remove_leaf(&mut self, key: BodyKey) {
        //! Splices the body's sibling into its parent's slot, leaving the grandparent loose.
        if self.root == Some(Node::Leaf(key)) {
            self.root = None;
            return;
        }
        let parent = match self.leaves[key].parent {
            Some(parent) => parent,
            None => return, // not in the tree
        };

        let Branch { parent: grandparent, left, right, sort, dirty, .. } = self.branches[parent];
        let sibling = if left == Node::Leaf(key) { right } else { left };

        self.set_parent(sibling, grandparent);
        if let Node::Branch(id) = sibling {
            self.branches[id].sort = sort;
        }
        self.replace_child(grandparent, Node::Branch(parent), sibling);
        if let Some(grandparent) = grandparent {
            self.mark_dirty(grandparent);
        }

        if dirty {
            self.dirty.swap_remove(&parent);
        }
        self.branches.release(parent);
        self.leaves[key].parent = None;
    }

    #[inline]
    fn mark_dirty(&mut self, id: BranchId) {
        let branch = &mut self.branches[id];
        if !branch.dirty {
            branch.dirty = true;
            self.dirty.insert(id);
        }
    }

    // ---------- Update ---------- //

    pub fn update(&mut self) {
        //! Reinserts bodies that left their padded bounds or changed padding, then resizes
        //! every loose branch.
        let mut keys = std::mem::take(&mut self.scratch);
        keys.clear();
        keys.extend(self.bodies.keys());

        let mut reinserted = 0;
        for &key in keys.iter() {
            let body = &mut self.bodies[key];
            // the body may have been replaced in place since the last update
            body.owner = Some(self.id);

            let leaf = &self.leaves[key];
            let moved = if body.padding != leaf.padding {
                true
            } else {
                body.refresh_coords();
                !leaf.aabb.contains(&body.aabb())
            };

            if moved {
                trace!("reinserting body {:?}", key);
                self.remove_leaf(key);
                self.insert_leaf(key, true);
                reinserted += 1;
            }
        }
        self.scratch = keys;

        let resized = self.resize_dirty();
        debug!("index {:?} updated: {} reinserted, {} branches resized", self.id, reinserted, resized);
    }

    fn resize_dirty(&mut self) -> usize {
        let mut dirty: Vec<BranchId> = self.dirty.drain(..).collect();
        let branches = &self.branches;
        dirty.sort_by_key(|id| Reverse(branches[*id].sort));

        let mut resized = 0;
        for id in dirty {
            let mut current = Some(id);
            while let Some(id) = current {
                let Branch { left, right, parent, .. } = self.branches[id];
                let aabb = self.stored_aabb(left).union(&self.stored_aabb(right));

                let branch = &mut self.branches[id];
                branch.aabb = aabb;
                branch.dirty = false;
                resized += 1;

                // a dirty parent gets its own walk later on
                current = parent.filter(|p| !self.branches[*p].dirty);
            }
        }
        resized
    }

    // ---------- Queries ---------- //

    pub fn potentials(&self, handle: BodyHandle) -> Result<Vec<BodyHandle>, CollisionError> {
        let mut results = Vec::new();
        self.potentials_into(handle, &mut results)?;
        Ok(results)
    }
    pub fn potentials_into(&self, handle: BodyHandle, results: &mut Vec<BodyHandle>) -> Result<(), CollisionError> {
        //! Clears `results`, then fills it with every other body whose padded bounds overlap `handle`'s.
        results.clear();
        let key = self.key(handle)?;
        self.traverse(key, |other| results.push(self.handle(other)));
        Ok(())
    }
    pub fn potentials_filtered<F>(&self, handle: BodyHandle, mut filter: F) -> Result<Vec<BodyHandle>, CollisionError>
    where
        F: FnMut(&Body) -> bool,
    {
        let key = self.key(handle)?;
        let mut results = Vec::new();
        self.traverse(key, |other| {
            if filter(&self.bodies[other]) {
                results.push(self.handle(other));
            }
        });
        Ok(results)
    }

    fn traverse<F: FnMut(BodyKey)>(&self, key: BodyKey, mut visit: F) {
        //! Walks the tree through parent links, pruning subtrees that miss the body's padded bounds.
        let aabb = self.leaves[key].aabb;
        let mut current = match self.root {
            Some(root @ Node::Branch(_)) => root,
            _ => return,
        };

        let mut descend = true;
        loop {
            if descend {
                descend = false;
                while let Node::Branch(id) = current {
                    let left = self.branches[id].left;
                    if !self.stored_aabb(left).overlaps(&aabb) {
                        break;
                    }
                    current = left;
                }
            }

            let right = match current {
                Node::Branch(id) => Some(self.branches[id].right),
                Node::Leaf(_) => None,
            };
            match right {
                Some(right) if self.stored_aabb(right).overlaps(&aabb) => {
                    current = right;
                    descend = true;
                }
                _ => {
                    if let Node::Leaf(other) = current {
                        if other != key {
                            visit(other);
                        }
                    }

                    // climb while coming back from a right subtree
                    let mut parent = self.parent(current);
                    while let Some(id) = parent {
                        if self.branches[id].right != current {
                            break;
                        }
                        current = Node::Branch(id);
                        parent = self.branches[id].parent;
                    }
                    match parent {
                        Some(id) => current = Node::Branch(id),
                        None => break,
                    }
                }
            }
        }
    }
}
