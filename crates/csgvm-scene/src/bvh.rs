//! Bounding volume hierarchy over instance world bounds.
//!
//! Median split on the longest centroid axis, stored as a flat node array.
//! Traversal uses a fixed-size stack, so queries never allocate. Instances
//! with empty bounds are left out of the tree.

use crate::settings::{BvhSettings, MAX_BVH_DEPTH};
use csgvm_math::{Aabb3, Point3, Ray};

/// A flattened BVH node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BvhNode {
    /// Leaf holding `count` entries of the index array starting at `first`.
    Leaf {
        /// Bounds of every instance in the leaf.
        bounds: Aabb3,
        /// First slot in the index array.
        first: u32,
        /// Number of instances.
        count: u32,
    },
    /// Internal node with two children.
    Internal {
        /// Bounds of both children.
        bounds: Aabb3,
        /// Left child node index.
        left: u32,
        /// Right child node index.
        right: u32,
    },
}

impl BvhNode {
    /// Bounds of the node.
    pub fn bounds(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Internal { bounds, .. } => bounds,
        }
    }
}

/// Immutable BVH over a set of boxes.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    indices: Vec<u32>,
    depth: usize,
}

const STACK_SIZE: usize = MAX_BVH_DEPTH * 2;

struct BuildItem {
    index: u32,
    bounds: Aabb3,
    centroid: Point3,
}

impl Bvh {
    /// Build over `bounds`; the position of each box is the id reported by
    /// queries. `settings` must already be validated.
    pub fn build(bounds: &[Aabb3], settings: &BvhSettings) -> Self {
        let mut items: Vec<BuildItem> = bounds
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, b)| BuildItem {
                index: i as u32,
                bounds: *b,
                centroid: b.center(),
            })
            .collect();

        let mut bvh = Bvh::default();
        if !items.is_empty() {
            let leaf_size = settings.max_leaf_size.max(1);
            let max_depth = settings.max_depth.clamp(1, MAX_BVH_DEPTH);
            bvh.build_node(&mut items, 1, leaf_size, max_depth);
        }
        log::debug!(
            "built bvh over {} of {} boxes: {} nodes, depth {}",
            bvh.indices.len(),
            bounds.len(),
            bvh.nodes.len(),
            bvh.depth
        );
        bvh
    }

    fn build_node(&mut self, items: &mut [BuildItem], depth: usize, leaf_size: usize, max_depth: usize) -> u32 {
        self.depth = self.depth.max(depth);
        let bounds = items
            .iter()
            .fold(Aabb3::empty(), |acc, item| acc.union(&item.bounds));
        let idx = self.nodes.len() as u32;

        if items.len() <= leaf_size || depth >= max_depth {
            let first = self.indices.len() as u32;
            self.indices.extend(items.iter().map(|item| item.index));
            self.nodes.push(BvhNode::Leaf {
                bounds,
                first,
                count: items.len() as u32,
            });
            return idx;
        }

        let mut centroids = Aabb3::empty();
        for item in items.iter() {
            centroids.include_point(&item.centroid);
        }
        let extent = centroids.extent();
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));

        // Reserve this node's slot; children follow it.
        self.nodes.push(BvhNode::Internal {
            bounds,
            left: 0,
            right: 0,
        });
        let (left_items, right_items) = items.split_at_mut(mid);
        let left = self.build_node(left_items, depth + 1, leaf_size, max_depth);
        let right = self.build_node(right_items, depth + 1, leaf_size, max_depth);
        self.nodes[idx as usize] = BvhNode::Internal { bounds, left, right };
        idx
    }

    /// Flattened nodes; the root is node 0.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Box ids in leaf order.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of levels, 0 for an empty tree.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True if no box was indexed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounds of everything indexed.
    pub fn bounds(&self) -> Aabb3 {
        self.nodes.first().map_or(Aabb3::empty(), |n| *n.bounds())
    }

    /// Visit the ids of leaves whose bounds the ray crosses within
    /// `[t_min, t_max]`, nearer nodes first.
    ///
    /// `visit` receives each id together with the current range end, which it
    /// may shrink to prune farther nodes. Returning `true` stops the
    /// traversal.
    pub fn traverse_ray<F>(&self, ray: &Ray, t_min: f64, mut t_max: f64, mut visit: F)
    where
        F: FnMut(usize, &mut f64) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = [0u32; STACK_SIZE];
        let mut sp = 1usize;

        while sp > 0 {
            sp -= 1;
            let node = &self.nodes[stack[sp] as usize];
            if ray.intersect_aabb(node.bounds(), t_min, t_max).is_none() {
                continue;
            }
            match *node {
                BvhNode::Leaf { first, count, .. } => {
                    let range = first as usize..(first + count) as usize;
                    for &id in &self.indices[range] {
                        if visit(id as usize, &mut t_max) {
                            return;
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    let entry = |i: u32| {
                        ray.intersect_aabb(self.nodes[i as usize].bounds(), t_min, t_max)
                            .map(|(t, _)| t)
                    };
                    let (near, far) = match (entry(left), entry(right)) {
                        (Some(l), Some(r)) if r < l => (Some(right), Some(left)),
                        (Some(_), Some(_)) => (Some(left), Some(right)),
                        (Some(_), None) => (Some(left), None),
                        (None, Some(_)) => (Some(right), None),
                        (None, None) => (None, None),
                    };
                    for child in [far, near].into_iter().flatten() {
                        if sp < STACK_SIZE {
                            stack[sp] = child;
                            sp += 1;
                        }
                    }
                }
            }
        }
    }

    /// Visit the ids whose leaf bounds overlap `aabb`.
    pub fn traverse_overlapping<F>(&self, aabb: &Aabb3, mut visit: F)
    where
        F: FnMut(usize),
    {
        if self.nodes.is_empty() || aabb.is_empty() {
            return;
        }
        let mut stack = [0u32; STACK_SIZE];
        let mut sp = 1usize;

        while sp > 0 {
            sp -= 1;
            let node = &self.nodes[stack[sp] as usize];
            if !node.bounds().overlaps(aabb) {
                continue;
            }
            match *node {
                BvhNode::Leaf { first, count, .. } => {
                    let range = first as usize..(first + count) as usize;
                    for &id in &self.indices[range] {
                        visit(id as usize);
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    for child in [right, left] {
                        if sp < STACK_SIZE {
                            stack[sp] = child;
                            sp += 1;
                        }
                    }
                }
            }
        }
    }
}
