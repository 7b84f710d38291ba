//! CSG tree builder.
//!
//! The tree is an arena of primitives and boolean nodes addressed by typed
//! ids. A node can only reference ids that already exist, so the graph is a
//! DAG by construction: subtrees can be shared, cycles cannot be expressed.
//! Local bounds and depth are computed once, when a node is added.

use crate::error::{Result, StructuralError};
use csgvm_interval::{combine, BooleanOp, IntervalList, MaterialId, Primitive, Shape};
use csgvm_math::{Aabb3, Ray};
use std::fmt;

/// Index of a primitive in a [`CsgTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u32);

/// Index of a boolean node in a [`CsgTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "primitive #{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// A child reference: either a leaf primitive or another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsgRef {
    /// Leaf.
    Primitive(PrimitiveId),
    /// Boolean node.
    Node(NodeId),
}

impl From<PrimitiveId> for CsgRef {
    fn from(id: PrimitiveId) -> Self {
        CsgRef::Primitive(id)
    }
}

impl From<NodeId> for CsgRef {
    fn from(id: NodeId) -> Self {
        CsgRef::Node(id)
    }
}

impl fmt::Display for CsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsgRef::Primitive(id) => write!(f, "{id}"),
            CsgRef::Node(id) => write!(f, "{id}"),
        }
    }
}

/// A boolean node.
#[derive(Debug, Clone, PartialEq)]
pub struct CsgNode {
    /// Operation applied to the children.
    pub op: BooleanOp,
    /// Left operand (the minuend for a difference).
    pub left: CsgRef,
    /// Right operand.
    pub right: CsgRef,
    /// Material forced onto every result interval, or [`MaterialId::NONE`].
    pub material_override: MaterialId,
    /// Conservative local bounds of the result.
    pub bounds: Aabb3,
    /// Longest path to a leaf, counting the leaf level.
    pub depth: usize,
}

/// Arena-backed CSG DAG.
#[derive(Debug, Clone, Default)]
pub struct CsgTree {
    primitives: Vec<Primitive>,
    nodes: Vec<CsgNode>,
    root: Option<CsgRef>,
}

impl CsgTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a primitive. Degenerate shapes are rejected.
    pub fn add_primitive(&mut self, shape: Shape, material: MaterialId) -> Result<PrimitiveId> {
        let primitive = Primitive::new(shape, material)?;
        let id = PrimitiveId(self.primitives.len() as u32);
        self.primitives.push(primitive);
        Ok(id)
    }

    /// Add a boolean node over two existing children.
    pub fn add_node(
        &mut self,
        op: BooleanOp,
        left: impl Into<CsgRef>,
        right: impl Into<CsgRef>,
        material_override: MaterialId,
    ) -> Result<NodeId> {
        let (left, right) = (left.into(), right.into());
        let id = NodeId(self.nodes.len() as u32);
        let context = format!("new {} {}", op.name(), id);
        let (lb, ld) = self.checked(left, &context)?;
        let (rb, rd) = self.checked(right, &context)?;

        let bounds = match op {
            BooleanOp::Union => lb.union(&rb),
            BooleanOp::Intersect => lb.intersection(&rb),
            BooleanOp::Difference => lb,
        };
        self.nodes.push(CsgNode {
            op,
            left,
            right,
            material_override,
            bounds,
            depth: 1 + ld.max(rd),
        });
        Ok(id)
    }

    /// `left ∪ right` without a material override.
    pub fn union(&mut self, left: impl Into<CsgRef>, right: impl Into<CsgRef>) -> Result<NodeId> {
        self.add_node(BooleanOp::Union, left, right, MaterialId::NONE)
    }

    /// `left ∩ right` without a material override.
    pub fn intersect(&mut self, left: impl Into<CsgRef>, right: impl Into<CsgRef>) -> Result<NodeId> {
        self.add_node(BooleanOp::Intersect, left, right, MaterialId::NONE)
    }

    /// `left − right` without a material override.
    pub fn difference(&mut self, left: impl Into<CsgRef>, right: impl Into<CsgRef>) -> Result<NodeId> {
        self.add_node(BooleanOp::Difference, left, right, MaterialId::NONE)
    }

    /// Mark the node (or lone primitive) the program is compiled from.
    pub fn mark_root(&mut self, root: impl Into<CsgRef>) -> Result<()> {
        let root = root.into();
        self.checked(root, "mark_root")?;
        self.root = Some(root);
        Ok(())
    }

    /// The marked root, if any.
    pub fn root(&self) -> Option<CsgRef> {
        self.root
    }

    /// Primitive by id.
    pub fn primitive(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id.0 as usize)
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> Option<&CsgNode> {
        self.nodes.get(id.0 as usize)
    }

    /// Number of primitives.
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Local bounds of a reference.
    pub fn bounds(&self, r: CsgRef) -> Option<Aabb3> {
        self.lookup(r).map(|(bounds, _)| bounds)
    }

    /// Depth of a reference (a primitive has depth 1).
    pub fn depth(&self, r: CsgRef) -> Option<usize> {
        self.lookup(r).map(|(_, depth)| depth)
    }

    fn lookup(&self, r: CsgRef) -> Option<(Aabb3, usize)> {
        match r {
            CsgRef::Primitive(id) => self.primitive(id).map(|p| (p.bounds(), 1)),
            CsgRef::Node(id) => self.node(id).map(|n| (n.bounds, n.depth)),
        }
    }

    fn checked(&self, r: CsgRef, context: &str) -> Result<(Aabb3, usize)> {
        self.lookup(r).ok_or_else(|| {
            let context = context.to_string();
            match r {
                CsgRef::Primitive(id) => StructuralError::UnknownPrimitive { id, context },
                CsgRef::Node(id) => StructuralError::UnknownNode { id, context },
            }
            .into()
        })
    }

    /// Evaluate the root directly, without compiling.
    ///
    /// Intervals overlapping `[t_min, t_max]` are returned unclipped. This is
    /// the reference semantics compiled programs must reproduce.
    pub fn evaluate(&self, ray: &Ray, t_min: f64, t_max: f64) -> Result<IntervalList> {
        let root = self.root.ok_or(StructuralError::NoRoot)?;
        self.evaluate_ref(root, ray, t_min, t_max)
    }

    /// Evaluate any reference directly.
    pub fn evaluate_ref(&self, r: CsgRef, ray: &Ray, t_min: f64, t_max: f64) -> Result<IntervalList> {
        self.checked(r, "evaluate")?;
        Ok(self.eval_unfiltered(r, ray).retain_overlapping(t_min, t_max))
    }

    fn eval_unfiltered(&self, r: CsgRef, ray: &Ray) -> IntervalList {
        match r {
            CsgRef::Primitive(id) => self
                .primitive(id)
                .map(|p| p.intersect(ray))
                .unwrap_or_default(),
            CsgRef::Node(id) => match self.node(id) {
                Some(node) => {
                    let a = self.eval_unfiltered(node.left, ray);
                    let b = self.eval_unfiltered(node.right, ray);
                    combine(node.op, &a, &b)
                        .intervals
                        .with_material_override(node.material_override)
                }
                None => IntervalList::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsgError;
    use csgvm_math::{Point3, Vec3};

    fn sphere(tree: &mut CsgTree, x: f64, r: f64) -> PrimitiveId {
        tree.add_primitive(Shape::sphere(Point3::new(x, 0.0, 0.0), r), MaterialId(0))
            .unwrap()
    }

    #[test]
    fn test_bounds_per_operation() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0);
        let b = sphere(&mut tree, 1.5, 1.0);
        let u = tree.union(a, b).unwrap();
        let i = tree.intersect(a, b).unwrap();
        let d = tree.difference(a, b).unwrap();

        let ub = tree.node(u).unwrap().bounds;
        assert_eq!(ub.min.x, -1.0);
        assert_eq!(ub.max.x, 2.5);
        let ib = tree.node(i).unwrap().bounds;
        assert_eq!(ib.min.x, 0.5);
        assert_eq!(ib.max.x, 1.0);
        assert_eq!(tree.node(d).unwrap().bounds, tree.bounds(a.into()).unwrap());
    }

    #[test]
    fn test_depth_counts_leaf_level() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0);
        let b = sphere(&mut tree, 1.0, 1.0);
        let n1 = tree.union(a, b).unwrap();
        let n2 = tree.difference(n1, a).unwrap();
        assert_eq!(tree.depth(a.into()), Some(1));
        assert_eq!(tree.depth(n1.into()), Some(2));
        assert_eq!(tree.depth(n2.into()), Some(3));
    }

    #[test]
    fn test_unknown_references_rejected() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0);
        let err = tree.union(a, NodeId(7)).unwrap_err();
        match err {
            CsgError::Structural(StructuralError::UnknownNode { id, context }) => {
                assert_eq!(id, NodeId(7));
                assert!(context.contains("union"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            tree.mark_root(PrimitiveId(3)),
            Err(CsgError::Structural(StructuralError::UnknownPrimitive { .. }))
        ));
        // A node cannot reference itself: its id does not exist yet.
        assert!(tree.union(a, NodeId(0)).is_err());
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn test_degenerate_primitive_rejected() {
        let mut tree = CsgTree::new();
        let err = tree
            .add_primitive(Shape::sphere(Point3::origin(), 0.0), MaterialId(0))
            .unwrap_err();
        assert!(matches!(err, CsgError::Geometry(_)));
        assert_eq!(tree.primitive_count(), 0);
    }

    #[test]
    fn test_evaluate_requires_root() {
        let tree = CsgTree::new();
        let ray = Ray::new(Point3::origin(), Vec3::x());
        assert!(matches!(
            tree.evaluate(&ray, 0.0, 1.0),
            Err(CsgError::Structural(StructuralError::NoRoot))
        ));
    }

    #[test]
    fn test_evaluate_applies_override() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0);
        let b = sphere(&mut tree, 5.0, 1.0);
        let n = tree
            .add_node(BooleanOp::Union, a, b, MaterialId(9))
            .unwrap();
        tree.mark_root(n).unwrap();
        let ray = Ray::new(Point3::new(-3.0, 0.0, 0.0), Vec3::x());
        let list = tree.evaluate(&ray, 0.0, f64::INFINITY).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|iv| iv.material == MaterialId(9)));
    }

    #[test]
    fn test_evaluate_filters_without_clipping() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0);
        tree.mark_root(a).unwrap();
        let ray = Ray::new(Point3::origin(), Vec3::x());
        let list = tree.evaluate(&ray, 0.0, 10.0).unwrap();
        assert_eq!(list.as_slice()[0].t_min, -1.0);
        let behind = tree.evaluate(&ray, 2.0, 10.0).unwrap();
        assert!(behind.is_empty());
    }
}
