//! A balanced ordered map keyed by an `f32` scalar (§4.2).
//!
//! AVL-balanced, augmented with subtree sizes so that rank queries (in
//! particular [`ScalarMap::median`]) are `O(log n)`. Nodes live in a
//! [`slotmap::SlotMap`] arena addressed by [`NodeId`] rather than behind
//! `Rc<RefCell<_>>` pointers, following the arena style the crate uses for
//! the QuickHull face graph and the halfedge mesh (§9 design notes).
//!
//! Callers that need an ordering parameter to drift over time (the sweep
//! status structure in [`crate::triangulate2d`]) use [`ScalarMap::rekey`]
//! and [`ScalarMap::rekey_with`], which detach the node and reinsert it
//! at its new key — exactly the "dynamic-key mode" the spec describes,
//! expressed as an explicit re-keying call at each point the sweep
//! context changes, rather than a hidden comparator — paired with
//! [`ScalarMap::floor`] to locate the entry immediately left of a query
//! position that the map has never stored as a key itself.

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Handle to a node in a [`ScalarMap`]. Stable across rotations and rekeys.
    pub struct NodeId;
}

struct Node<V> {
    key: f32,
    value: V,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
    height: i32,
    size: usize,
}

/// AVL tree keyed by `f32`, augmented with subtree sizes.
pub struct ScalarMap<V> {
    nodes: SlotMap<NodeId, Node<V>>,
    root: Option<NodeId>,
}

impl<V> Default for ScalarMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ScalarMap<V> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.root.map(|r| self.size(Some(r))).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn key(&self, id: NodeId) -> f32 {
        self.nodes[id].key
    }

    pub fn get(&self, id: NodeId) -> Option<&V> {
        self.nodes.get(id).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut V> {
        self.nodes.get_mut(id).map(|n| &mut n.value)
    }

    fn height(&self, id: Option<NodeId>) -> i32 {
        id.map(|id| self.nodes[id].height).unwrap_or(0)
    }

    fn size(&self, id: Option<NodeId>) -> usize {
        id.map(|id| self.nodes[id].size).unwrap_or(0)
    }

    fn balance_factor(&self, id: NodeId) -> i32 {
        self.height(self.nodes[id].left) - self.height(self.nodes[id].right)
    }

    fn refresh(&mut self, id: NodeId) {
        let (l, r) = (self.nodes[id].left, self.nodes[id].right);
        self.nodes[id].height = 1 + self.height(l).max(self.height(r));
        self.nodes[id].size = 1 + self.size(l) + self.size(r);
    }

    /// Inserts `value` under `key` and returns a handle to the new node.
    pub fn insert(&mut self, key: f32, value: V) -> NodeId {
        let id = self.nodes.insert(Node {
            key,
            value,
            left: None,
            right: None,
            parent: None,
            height: 1,
            size: 1,
        });
        self.root = self.insert_node(self.root, id, None);
        id
    }

    /// Inserts an existing (already-allocated) node into the tree.
    /// Used by [`rekey`](Self::rekey) to reinsert a detached node.
    fn insert_node(
        &mut self,
        subtree: Option<NodeId>,
        id: NodeId,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let Some(cur) = subtree else {
            self.nodes[id].parent = parent;
            self.nodes[id].left = None;
            self.nodes[id].right = None;
            self.nodes[id].height = 1;
            self.nodes[id].size = 1;
            return Some(id);
        };

        if self.nodes[id].key < self.nodes[cur].key {
            let new_left = self.insert_node(self.nodes[cur].left, id, Some(cur));
            self.nodes[cur].left = new_left;
        } else {
            let new_right = self.insert_node(self.nodes[cur].right, id, Some(cur));
            self.nodes[cur].right = new_right;
        }

        self.refresh(cur);
        Some(self.rebalance(cur, parent))
    }

    fn rebalance(&mut self, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let balance = self.balance_factor(id);

        let new_root = if balance > 1 {
            if self.balance_factor(self.nodes[id].left.unwrap()) < 0 {
                let left = self.nodes[id].left.unwrap();
                let new_left = self.rotate_left(left);
                self.nodes[id].left = Some(new_left);
            }
            self.rotate_right(id)
        } else if balance < -1 {
            if self.balance_factor(self.nodes[id].right.unwrap()) > 0 {
                let right = self.nodes[id].right.unwrap();
                let new_right = self.rotate_right(right);
                self.nodes[id].right = Some(new_right);
            }
            self.rotate_left(id)
        } else {
            id
        };

        self.nodes[new_root].parent = parent;
        new_root
    }

    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let pivot = self.nodes[id].right.expect("rotate_left needs right child");
        let moved = self.nodes[pivot].left;

        self.nodes[id].right = moved;
        if let Some(moved) = moved {
            self.nodes[moved].parent = Some(id);
        }

        self.nodes[pivot].left = Some(id);
        self.nodes[id].parent = Some(pivot);

        self.refresh(id);
        self.refresh(pivot);
        pivot
    }

    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let pivot = self.nodes[id].left.expect("rotate_right needs left child");
        let moved = self.nodes[pivot].right;

        self.nodes[id].left = moved;
        if let Some(moved) = moved {
            self.nodes[moved].parent = Some(id);
        }

        self.nodes[pivot].right = Some(id);
        self.nodes[id].parent = Some(pivot);

        self.refresh(id);
        self.refresh(pivot);
        pivot
    }

    /// Removes and returns the value stored at `id`.
    pub fn remove(&mut self, id: NodeId) -> Option<V> {
        self.root = self.detach(self.root, id);
        self.nodes.remove(id).map(|n| n.value)
    }

    /// Re-keys the node at `id`, detaching and reinserting it so the tree
    /// stays correctly ordered (§4.2 "rekey is implemented as
    /// detach-then-reinsert").
    pub fn rekey(&mut self, id: NodeId, new_key: f32) {
        self.root = self.detach(self.root, id);
        self.nodes[id].key = new_key;
        self.root = self.insert_node(self.root, id, None);
    }

    /// Re-keys `id` to a key freshly computed from its current value by
    /// `key_fn` (§4.2 "dynamic-key mode"): the ordering comparator a
    /// caller needs lives outside the map, as a function of the value
    /// plus whatever external context has since advanced (the sweep
    /// line's position in [`crate::triangulate2d`]), rather than as a
    /// comparator object stored inside the map itself.
    pub fn rekey_with(&mut self, id: NodeId, key_fn: impl FnOnce(&V) -> f32) {
        let new_key = key_fn(&self.nodes[id].value);
        self.rekey(id, new_key);
    }

    /// The node with the largest key `<= key`, or `None` if every node's
    /// key exceeds `key` (including when the map is empty). Used by a
    /// dynamic-key caller to locate "the entry immediately left of" a
    /// query position without that position itself being a key in the map.
    pub fn floor(&self, key: f32) -> Option<NodeId> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(id) = cur {
            if self.nodes[id].key <= key {
                best = Some(id);
                cur = self.nodes[id].right;
            } else {
                cur = self.nodes[id].left;
            }
        }
        best
    }

    /// Detaches `target` from the subtree rooted at `subtree`, rebalancing
    /// as it goes, without removing it from the arena.
    fn detach(&mut self, subtree: Option<NodeId>, target: NodeId) -> Option<NodeId> {
        let cur = subtree?;

        if cur == target {
            return self.detach_root(cur);
        }

        if self.nodes[target].key < self.nodes[cur].key {
            let new_left = self.detach(self.nodes[cur].left, target);
            self.nodes[cur].left = new_left;
        } else {
            let new_right = self.detach(self.nodes[cur].right, target);
            self.nodes[cur].right = new_right;
        }

        self.refresh(cur);
        Some(self.rebalance(cur, self.nodes[cur].parent))
    }

    fn detach_root(&mut self, id: NodeId) -> Option<NodeId> {
        let (left, right) = (self.nodes[id].left, self.nodes[id].right);

        match (left, right) {
            (None, None) => None,
            (Some(l), None) => {
                self.nodes[l].parent = None;
                Some(l)
            }
            (None, Some(r)) => {
                self.nodes[r].parent = None;
                Some(r)
            }
            (Some(_), Some(_)) => {
                // Splice in the in-order successor (leftmost of the right subtree).
                let mut succ = right.unwrap();
                while let Some(l) = self.nodes[succ].left {
                    succ = l;
                }

                let new_right = self.detach(right, succ);

                self.nodes[succ].left = left;
                self.nodes[left.unwrap()].parent = Some(succ);
                self.nodes[succ].right = new_right;
                if let Some(nr) = new_right {
                    self.nodes[nr].parent = Some(succ);
                }
                self.refresh(succ);
                Some(self.rebalance(succ, None))
            }
        }
    }

    /// Lowest-keyed node, if any.
    pub fn lowest(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(l) = self.nodes[cur].left {
            cur = l;
        }
        Some(cur)
    }

    /// Highest-keyed node, if any.
    pub fn highest(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(r) = self.nodes[cur].right {
            cur = r;
        }
        Some(cur)
    }

    /// The in-order successor of `id`: right-then-leftmost, otherwise
    /// ascend until arriving from the left child.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut cur) = self.nodes[id].right {
            while let Some(l) = self.nodes[cur].left {
                cur = l;
            }
            return Some(cur);
        }

        let mut cur = id;
        let mut parent = self.nodes[cur].parent;
        while let Some(p) = parent {
            if self.nodes[p].left == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    /// The in-order predecessor of `id`: left-then-rightmost, otherwise
    /// ascend until arriving from the right child.
    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut cur) = self.nodes[id].left {
            while let Some(r) = self.nodes[cur].right {
                cur = r;
            }
            return Some(cur);
        }

        let mut cur = id;
        let mut parent = self.nodes[cur].parent;
        while let Some(p) = parent {
            if self.nodes[p].right == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    /// The `rank`-th smallest node (0-indexed). Descends using subtree
    /// sizes: if `rank` equals the size of the left subtree, this node is
    /// the answer; otherwise recurse left or adjust `rank` and recurse
    /// right.
    pub fn select(&self, rank: usize) -> Option<NodeId> {
        let mut cur = self.root?;
        let mut rank = rank;
        loop {
            let left_size = self.size(self.nodes[cur].left);
            if rank == left_size {
                return Some(cur);
            } else if rank < left_size {
                cur = self.nodes[cur].left?;
            } else {
                rank -= left_size + 1;
                cur = self.nodes[cur].right?;
            }
        }
    }

    /// The median element by subtree-size rank (§4.2, used by the BVH
    /// split-axis median in §4.4).
    pub fn median(&self) -> Option<NodeId> {
        let n = self.len();
        if n == 0 {
            return None;
        }
        self.select(n / 2)
    }

    /// In-order iteration over `(key, &value)`.
    pub fn iter(&self) -> impl Iterator<Item = (f32, &V)> {
        let mut stack = Vec::new();
        let mut cur = self.root;
        std::iter::from_fn(move || {
            loop {
                if let Some(c) = cur {
                    stack.push(c);
                    cur = self.nodes[c].left;
                } else if let Some(top) = stack.pop() {
                    cur = self.nodes[top].right;
                    return Some((self.nodes[top].key, &self.nodes[top].value));
                } else {
                    return None;
                }
            }
        })
    }

    /// Consumes the map, returning all values in key order.
    pub fn into_values_sorted(self) -> Vec<V> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        let mut cur = self.root;
        let mut nodes = self.nodes;
        loop {
            if let Some(c) = cur {
                stack.push(c);
                cur = nodes[c].left;
            } else if let Some(top) = stack.pop() {
                cur = nodes[top].right;
                out.push(nodes.remove(top).unwrap().value);
            } else {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_and_order() {
        let mut map = ScalarMap::new();
        for k in [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0] {
            map.insert(k, k);
        }
        let keys: Vec<f32> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1.0, 2.0, 3.0, 5.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn median_matches_sorted_middle() {
        let mut map = ScalarMap::new();
        let mut ids = Vec::new();
        for k in [5.0, 1.0, 9.0, 3.0, 7.0] {
            ids.push(map.insert(k, k));
        }
        let median_id = map.median().unwrap();
        assert_eq!(map.key(median_id), 5.0);
    }

    #[test]
    fn predecessor_successor_roundtrip() {
        let mut map = ScalarMap::new();
        let ids: Vec<_> = (0..20).map(|i| map.insert(i as f32, i)).collect();
        let lowest = map.lowest().unwrap();
        let mut cur = lowest;
        let mut seen = vec![map.key(cur)];
        while let Some(next) = map.successor(cur) {
            cur = next;
            seen.push(map.key(cur));
        }
        assert_eq!(seen, (0..20).map(|i| i as f32).collect::<Vec<_>>());
        assert_eq!(cur, map.highest().unwrap());

        let mut cur = map.highest().unwrap();
        let mut seen_back = vec![map.key(cur)];
        while let Some(prev) = map.predecessor(cur) {
            cur = prev;
            seen_back.push(map.key(cur));
        }
        seen_back.reverse();
        assert_eq!(seen_back, (0..20).map(|i| i as f32).collect::<Vec<_>>());

        let _ = ids;
    }

    #[test]
    fn rekey_preserves_order() {
        let mut map = ScalarMap::new();
        let a = map.insert(1.0, "a");
        let b = map.insert(2.0, "b");
        let c = map.insert(3.0, "c");

        map.rekey(a, 10.0);

        let keys: Vec<_> = map.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(keys, vec![(2.0, "b"), (3.0, "c"), (10.0, "a")]);
        let _ = (b, c);
    }

    #[test]
    fn floor_finds_predecessor_or_equal() {
        let mut map = ScalarMap::new();
        for k in [1.0, 3.0, 5.0, 7.0] {
            map.insert(k, k);
        }
        assert_eq!(map.key(map.floor(5.0).unwrap()), 5.0);
        assert_eq!(map.key(map.floor(6.0).unwrap()), 5.0);
        assert!(map.floor(0.5).is_none());
        assert_eq!(map.key(map.floor(100.0).unwrap()), 7.0);
    }

    #[test]
    fn rekey_with_uses_current_context() {
        let mut map = ScalarMap::new();
        let a = map.insert(10.0, 2.0_f32); // value = the "true" key at some external context
        let b = map.insert(1.0, 8.0_f32);
        // Re-key both nodes from their stored value, as if the external
        // sweep context changed so the right key is now the value itself.
        map.rekey_with(a, |v| *v);
        map.rekey_with(b, |v| *v);
        let keys: Vec<f32> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![2.0, 8.0]);
    }

    #[test]
    fn remove_shrinks_map() {
        let mut map = ScalarMap::new();
        let ids: Vec<_> = (0..50).map(|i| map.insert(i as f32, i)).collect();
        for (i, id) in ids.into_iter().enumerate() {
            if i % 2 == 0 {
                map.remove(id);
            }
        }
        assert_eq!(map.len(), 25);
        let keys: Vec<i32> = map.iter().map(|(_, v)| *v).collect();
        assert!(keys.iter().all(|v| v % 2 == 1));
    }
}
