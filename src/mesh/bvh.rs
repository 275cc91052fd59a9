//! Axis-aligned bounding-volume hierarchy over vertex positions (§4.4),
//! used by [`crate::simplify`] to enumerate near-vertex pairs for
//! aggregation without an `O(n^2)` scan.

use glam::Vec3;
use tracing::instrument;

use crate::containers::scalar_map::ScalarMap;

struct Node {
    min: Vec3,
    max: Vec3,
    /// Point indices, non-empty only for leaves.
    points: Vec<u32>,
    left: Option<usize>,
    right: Option<usize>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left.is_none()
    }

    fn separation(&self, other: &Node) -> f32 {
        let mut sep = 0.0f32;
        for axis in 0..3 {
            let a_lo = self.min[axis];
            let a_hi = self.max[axis];
            let b_lo = other.min[axis];
            let b_hi = other.max[axis];
            let gap = if a_hi < b_lo {
                b_lo - a_hi
            } else if b_hi < a_lo {
                a_lo - b_hi
            } else {
                0.0
            };
            sep += gap * gap;
        }
        sep.sqrt()
    }
}

/// A BVH over a fixed set of vertex positions, addressed by their index
/// into the slice passed to [`VertexBvh::build`].
pub struct VertexBvh {
    nodes: Vec<Node>,
    root: usize,
}

impl VertexBvh {
    /// Builds a BVH over `points`. Splits recursively along the longest
    /// axis at the median coordinate (via [`ScalarMap::median`]); falls
    /// back to the midpoint if the median coincides with an extreme.
    /// Stops splitting below 4 points or when the node's longest-axis
    /// extent is under `min_extent`.
    #[instrument(skip(points))]
    pub fn build(points: &[Vec3], min_extent: f32) -> Self {
        let mut nodes = Vec::new();
        let all: Vec<u32> = (0..points.len() as u32).collect();
        let root = Self::build_node(&mut nodes, points, all, min_extent);
        Self { nodes, root }
    }

    fn bounds(points: &[Vec3], indices: &[u32]) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for &i in indices {
            let p = points[i as usize];
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    fn build_node(
        nodes: &mut Vec<Node>,
        points: &[Vec3],
        indices: Vec<u32>,
        min_extent: f32,
    ) -> usize {
        let (min, max) = Self::bounds(points, &indices);
        let extent = max - min;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        if indices.len() < 4 || extent[axis] < min_extent {
            let idx = nodes.len();
            nodes.push(Node {
                min,
                max,
                points: indices,
                left: None,
                right: None,
            });
            return idx;
        }

        let mut map: ScalarMap<u32> = ScalarMap::new();
        for &i in &indices {
            map.insert(points[i as usize][axis], i);
        }
        let median_id = map.median().unwrap();
        let mut split = map.key(median_id);

        if split == min[axis] || split == max[axis] {
            split = (min[axis] + max[axis]) * 0.5;
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &i in &indices {
            if points[i as usize][axis] <= split {
                left.push(i);
            } else {
                right.push(i);
            }
        }

        // Degenerate split (all points on one side, e.g. many coincident
        // points): stop recursing rather than looping forever.
        if left.is_empty() || right.is_empty() {
            let idx = nodes.len();
            nodes.push(Node {
                min,
                max,
                points: indices,
                left: None,
                right: None,
            });
            return idx;
        }

        let left_idx = Self::build_node(nodes, points, left, min_extent);
        let right_idx = Self::build_node(nodes, points, right, min_extent);

        let idx = nodes.len();
        nodes.push(Node {
            min,
            max,
            points: Vec::new(),
            left: Some(left_idx),
            right: Some(right_idx),
        });
        idx
    }

    /// Calls `cb(a, b)` once for every unordered pair of distinct point
    /// indices with Euclidean distance `< d`, pruning node pairs whose
    /// AABB separation already exceeds `d` (§4.4). `points` must be the
    /// same slice (by index) passed to [`VertexBvh::build`].
    #[instrument(skip(self, points, cb))]
    pub fn pairs(&self, points: &[Vec3], d: f32, mut cb: impl FnMut(u32, u32)) {
        self.pairs_recurse(points, self.root, self.root, d, &mut cb);
    }

    fn pairs_recurse(
        &self,
        points: &[Vec3],
        a: usize,
        b: usize,
        d: f32,
        cb: &mut impl FnMut(u32, u32),
    ) {
        let na = &self.nodes[a];
        let nb = &self.nodes[b];

        if na.separation(nb) >= d {
            return;
        }

        if a == b {
            if na.is_leaf() {
                Self::test_leaf_self(points, na, d, cb);
                return;
            }
            let (l, r) = (na.left.unwrap(), na.right.unwrap());
            self.pairs_recurse(points, l, l, d, cb);
            self.pairs_recurse(points, l, r, d, cb);
            self.pairs_recurse(points, r, r, d, cb);
            return;
        }

        match (na.is_leaf(), nb.is_leaf()) {
            (true, true) => Self::test_leaf_cross(points, na, nb, d, cb),
            (true, false) => {
                let (l, r) = (nb.left.unwrap(), nb.right.unwrap());
                self.pairs_recurse(points, a, l, d, cb);
                self.pairs_recurse(points, a, r, d, cb);
            }
            (false, true) => {
                let (l, r) = (na.left.unwrap(), na.right.unwrap());
                self.pairs_recurse(points, l, b, d, cb);
                self.pairs_recurse(points, r, b, cb);
            }
            (false, false) => {
                let (al, ar) = (na.left.unwrap(), na.right.unwrap());
                let (bl, br) = (nb.left.unwrap(), nb.right.unwrap());
                self.pairs_recurse(points, al, bl, d, cb);
                self.pairs_recurse(points, al, br, d, cb);
                self.pairs_recurse(points, ar, bl, d, cb);
                self.pairs_recurse(points, ar, br, d, cb);
            }
        }
    }

    fn test_leaf_self(points: &[Vec3], node: &Node, d: f32, cb: &mut impl FnMut(u32, u32)) {
        for (i, &a) in node.points.iter().enumerate() {
            for &b in &node.points[i + 1..] {
                if points[a as usize].distance(points[b as usize]) < d {
                    cb(a.min(b), a.max(b));
                }
            }
        }
    }

    fn test_leaf_cross(points: &[Vec3], na: &Node, nb: &Node, d: f32, cb: &mut impl FnMut(u32, u32)) {
        for &a in &na.points {
            for &b in &nb.points {
                if a == b {
                    continue;
                }
                if points[a as usize].distance(points[b as usize]) < d {
                    cb(a.min(b), a.max(b));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hashbrown::HashSet;

    #[test]
    fn pairs_matches_brute_force() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.3, 0.1, 0.0),
            Vec3::new(5.0, 5.0, 5.0),
            Vec3::new(5.05, 5.0, 5.0),
        ];
        let bvh = VertexBvh::build(&points, 0.0);

        let mut found: HashSet<(u32, u32)> = HashSet::new();
        bvh.pairs(&points, 1.0, |a, b| {
            found.insert((a, b));
        });

        let mut expected: HashSet<(u32, u32)> = HashSet::new();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if points[i].distance(points[j]) < 1.0 {
                    expected.insert((i as u32, j as u32));
                }
            }
        }

        assert_eq!(found, expected);
    }

    #[test]
    fn empty_points_builds_empty_tree() {
        let bvh = VertexBvh::build(&[], 0.0);
        let mut count = 0;
        bvh.pairs(&[], 1.0, |_, _| count += 1);
        assert_eq!(count, 0);
    }
}
