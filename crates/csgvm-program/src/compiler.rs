//! Tree to program compiler.
//!
//! Post-order walk of the DAG from the root. Optimizations, each switchable
//! through [`CompileSettings`]:
//!
//! - dead code elimination: an intersection of children with disjoint bounds
//!   is empty; a difference whose subtrahend cannot touch the minuend is the
//!   minuend; a union with an empty child is the other child
//! - shared subtree dedup: a node referenced by more than one parent stores
//!   its result in a slot on first evaluation and is recalled afterwards
//! - operand reordering: the cheaper operand of a commutative node goes first
//! - early reject: the second operand of an intersection or difference is
//!   skipped when the first is empty, unless that operand is where a shared
//!   node gets stored; every store stays outside skip regions so a shared
//!   node compiles once
//!
//! Material overrides are pushed down to the leaves as a context (the
//! outermost override wins), so eliminating a node never loses its override.

use crate::error::{Result, StructuralError};
use crate::instruction::{CompiledProgram, Instruction, MAX_STACK_DEPTH};
use crate::settings::CompileSettings;
use crate::tree::{CsgNode, CsgRef, CsgTree, NodeId, PrimitiveId};
use csgvm_interval::{BooleanOp, MaterialId, Primitive};
use std::collections::HashMap;

/// Slack added to bounds comparisons and to the program bounds, covering
/// rounding in primitive interval endpoints.
const BOUNDS_MARGIN: f64 = 1e-7;

/// Compile the tree's root into a program.
pub fn compile(tree: &CsgTree, settings: &CompileSettings) -> Result<CompiledProgram> {
    settings.validate()?;
    let root = tree.root().ok_or(StructuralError::NoRoot)?;
    let depth = tree.depth(root).unwrap_or(0);
    if depth > settings.max_tree_depth {
        if let CsgRef::Node(node) = root {
            return Err(StructuralError::TreeTooDeep {
                node,
                depth,
                limit: settings.max_tree_depth,
            }
            .into());
        }
    }

    let mut compiler = Compiler::new(tree, settings);
    if settings.dedup_shared_subtrees {
        compiler.count_parents(root);
    }

    if settings.dead_code_elimination && compiler.statically_empty(root) {
        log::debug!("root {root} is statically empty, emitting empty program");
        return Ok(CompiledProgram::empty());
    }

    compiler.emit(root, MaterialId::NONE)?;
    compiler.code.push(Instruction::End);

    let mut bounds = tree.bounds(root).unwrap_or_default();
    bounds.expand(BOUNDS_MARGIN);

    let Compiler {
        code,
        primitives,
        eliminated,
        recalled,
        reordered,
        ..
    } = compiler;
    let instruction_count = code.len();
    let program = CompiledProgram::from_parts(code, primitives, bounds)?;
    if program.max_stack_depth() > MAX_STACK_DEPTH {
        return Err(StructuralError::StackTooDeep {
            required: program.max_stack_depth(),
            limit: MAX_STACK_DEPTH,
        }
        .into());
    }

    log::trace!("dce removed {eliminated} nodes, {recalled} recalls, {reordered} reorders");
    log::debug!(
        "compiled {root} (depth {depth}) into {instruction_count} instructions, {} primitives, stack {}",
        program.primitives().len(),
        program.max_stack_depth()
    );
    Ok(program)
}

impl CsgTree {
    /// Compile the root. See [`compile`].
    pub fn compile(&self, settings: &CompileSettings) -> Result<CompiledProgram> {
        compile(self, settings)
    }
}

struct Compiler<'a> {
    tree: &'a CsgTree,
    settings: &'a CompileSettings,
    code: Vec<Instruction>,
    primitives: Vec<Primitive>,
    primitive_index: HashMap<PrimitiveId, u32>,
    parents: Vec<u32>,
    empty_memo: Vec<Option<bool>>,
    cost_memo: Vec<Option<u32>>,
    slots: HashMap<(NodeId, MaterialId), u32>,
    next_slot: u32,
    eliminated: usize,
    recalled: usize,
    reordered: usize,
}

impl<'a> Compiler<'a> {
    fn new(tree: &'a CsgTree, settings: &'a CompileSettings) -> Self {
        let n = tree.node_count();
        Self {
            tree,
            settings,
            code: Vec::new(),
            primitives: Vec::new(),
            primitive_index: HashMap::new(),
            parents: vec![0; n],
            empty_memo: vec![None; n],
            cost_memo: vec![None; n],
            slots: HashMap::new(),
            next_slot: 0,
            eliminated: 0,
            recalled: 0,
            reordered: 0,
        }
    }

    fn node(&self, id: NodeId) -> Result<&'a CsgNode> {
        let tree = self.tree;
        tree.node(id).ok_or_else(|| {
            StructuralError::UnknownNode {
                id,
                context: "compile".into(),
            }
            .into()
        })
    }

    /// Count parent edges of every node reachable from `root`.
    fn count_parents(&mut self, root: CsgRef) {
        let tree = self.tree;
        let mut visited = vec![false; self.parents.len()];
        let mut pending = vec![root];
        while let Some(r) = pending.pop() {
            let CsgRef::Node(id) = r else { continue };
            let Some(node) = tree.node(id) else { continue };
            if std::mem::replace(&mut visited[id.0 as usize], true) {
                continue;
            }
            for child in [node.left, node.right] {
                if let CsgRef::Node(c) = child {
                    self.parents[c.0 as usize] += 1;
                }
                pending.push(child);
            }
        }
    }

    fn is_shared(&self, id: NodeId) -> bool {
        self.parents.get(id.0 as usize).is_some_and(|&n| n > 1)
    }

    fn disjoint(&self, a: CsgRef, b: CsgRef) -> bool {
        match (self.tree.bounds(a), self.tree.bounds(b)) {
            (Some(mut ab), Some(bb)) => {
                ab.expand(BOUNDS_MARGIN);
                !ab.overlaps(&bb)
            }
            _ => false,
        }
    }

    /// True when the bounds prove the subtree evaluates to nothing.
    fn statically_empty(&mut self, r: CsgRef) -> bool {
        let tree = self.tree;
        let CsgRef::Node(id) = r else { return false };
        let Some(node) = tree.node(id) else { return false };
        if let Some(known) = self.empty_memo[id.0 as usize] {
            return known;
        }
        let empty = match node.op {
            BooleanOp::Union => self.statically_empty(node.left) && self.statically_empty(node.right),
            BooleanOp::Intersect => {
                self.disjoint(node.left, node.right)
                    || self.statically_empty(node.left)
                    || self.statically_empty(node.right)
            }
            BooleanOp::Difference => self.statically_empty(node.left),
        };
        self.empty_memo[id.0 as usize] = Some(empty);
        empty
    }

    fn cost(&mut self, r: CsgRef) -> u32 {
        let tree = self.tree;
        match r {
            CsgRef::Primitive(id) => tree.primitive(id).map_or(0, |p| p.kind().cost()),
            CsgRef::Node(id) => {
                if let Some(known) = self.cost_memo[id.0 as usize] {
                    return known;
                }
                let cost = match tree.node(id) {
                    Some(node) => self.cost(node.left).saturating_add(self.cost(node.right)),
                    None => 0,
                };
                self.cost_memo[id.0 as usize] = Some(cost);
                cost
            }
        }
    }

    /// True if emitting `r` under `ctx` would store a shared node, i.e. it
    /// reaches a shared node with no slot yet. Slotted nodes are recalls and
    /// end the walk.
    fn stores_within(&self, r: CsgRef, ctx: MaterialId) -> bool {
        if !self.settings.dedup_shared_subtrees {
            return false;
        }
        let CsgRef::Node(id) = r else { return false };
        let Some(node) = self.tree.node(id) else { return false };
        let ctx = ctx.override_of(node.material_override);
        if self.slots.contains_key(&(id, ctx)) {
            return false;
        }
        self.is_shared(id) || self.stores_within(node.left, ctx) || self.stores_within(node.right, ctx)
    }

    fn emit(&mut self, r: CsgRef, ctx: MaterialId) -> Result<()> {
        let id = match r {
            CsgRef::Primitive(id) => return self.emit_primitive(id, ctx),
            CsgRef::Node(id) => id,
        };
        let node = self.node(id)?;
        let ctx = ctx.override_of(node.material_override);

        if self.settings.dedup_shared_subtrees {
            if let Some(&slot) = self.slots.get(&(id, ctx)) {
                self.code.push(Instruction::Recall { slot });
                self.recalled += 1;
                return Ok(());
            }
        }

        if self.settings.dead_code_elimination {
            match node.op {
                BooleanOp::Union if self.statically_empty(node.left) => {
                    self.eliminated += 1;
                    return self.emit(node.right, ctx);
                }
                BooleanOp::Union if self.statically_empty(node.right) => {
                    self.eliminated += 1;
                    return self.emit(node.left, ctx);
                }
                BooleanOp::Difference
                    if self.statically_empty(node.right) || self.disjoint(node.left, node.right) =>
                {
                    self.eliminated += 1;
                    return self.emit(node.left, ctx);
                }
                _ => {}
            }
        }

        let swapped = self.settings.reorder_operands
            && node.op.is_commutative()
            && self.cost(node.right) < self.cost(node.left);
        let (first, second) = if swapped {
            self.reordered += 1;
            (node.right, node.left)
        } else {
            (node.left, node.right)
        };

        self.emit(first, ctx)?;
        let guarded = self.settings.early_reject
            && node.op != BooleanOp::Union
            && !self.stores_within(second, ctx);
        if guarded {
            let skip_at = self.code.len();
            self.code.push(Instruction::SkipIfEmpty { target: 0 });
            self.emit(second, ctx)?;
            let target = self.code.len() as u32;
            self.code[skip_at] = Instruction::SkipIfEmpty { target };
        } else {
            self.emit(second, ctx)?;
        }

        let store = if self.settings.dedup_shared_subtrees && self.is_shared(id) {
            let slot = self.next_slot;
            self.next_slot += 1;
            self.slots.insert((id, ctx), slot);
            Some(slot)
        } else {
            None
        };
        self.code.push(Instruction::Combine {
            op: node.op,
            swapped,
            store,
        });
        Ok(())
    }

    fn emit_primitive(&mut self, id: PrimitiveId, ctx: MaterialId) -> Result<()> {
        let tree = self.tree;
        let primitive = tree.primitive(id).ok_or_else(|| StructuralError::UnknownPrimitive {
            id,
            context: "compile".into(),
        })?;
        let index = match self.primitive_index.get(&id) {
            Some(&index) => index,
            None => {
                let index = self.primitives.len() as u32;
                self.primitives.push(*primitive);
                self.primitive_index.insert(id, index);
                index
            }
        };
        self.code.push(Instruction::EvalPrimitive {
            kind: primitive.kind(),
            index,
            material: ctx,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsgError;
    use csgvm_interval::Shape;
    use csgvm_math::{Point3, Vec3};

    fn sphere(tree: &mut CsgTree, x: f64, r: f64, m: u32) -> PrimitiveId {
        tree.add_primitive(Shape::sphere(Point3::new(x, 0.0, 0.0), r), MaterialId(m))
            .unwrap()
    }

    fn count(p: &CompiledProgram, pred: impl Fn(&Instruction) -> bool) -> usize {
        p.instructions().iter().filter(|i| pred(i)).count()
    }

    #[test]
    fn test_post_order_layout() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = tree
            .add_primitive(Shape::cuboid(Point3::origin(), Vec3::repeat(0.6)), MaterialId(0))
            .unwrap();
        let d = tree.difference(a, b).unwrap();
        tree.mark_root(d).unwrap();

        let p = compile(&tree, &CompileSettings::unoptimized()).unwrap();
        assert_eq!(
            p.instructions(),
            &[
                Instruction::EvalPrimitive {
                    kind: csgvm_interval::PrimitiveKind::Sphere,
                    index: 0,
                    material: MaterialId::NONE,
                },
                Instruction::EvalPrimitive {
                    kind: csgvm_interval::PrimitiveKind::Box,
                    index: 1,
                    material: MaterialId::NONE,
                },
                Instruction::Combine {
                    op: BooleanOp::Difference,
                    swapped: false,
                    store: None,
                },
                Instruction::End,
            ]
        );
        assert_eq!(p.max_stack_depth(), 2);
    }

    #[test]
    fn test_no_root() {
        let tree = CsgTree::new();
        assert!(matches!(
            compile(&tree, &CompileSettings::default()),
            Err(CsgError::Structural(StructuralError::NoRoot))
        ));
    }

    #[test]
    fn test_tree_too_deep() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let mut top = tree.union(a, a).unwrap();
        for _ in 0..5 {
            top = tree.union(top, a).unwrap();
        }
        tree.mark_root(top).unwrap();
        let settings = CompileSettings {
            max_tree_depth: 4,
            ..CompileSettings::default()
        };
        match compile(&tree, &settings) {
            Err(CsgError::Structural(StructuralError::TreeTooDeep { node, depth, limit })) => {
                assert_eq!(node, top);
                assert_eq!(depth, 7);
                assert_eq!(limit, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dce_disjoint_intersection_is_empty_program() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = sphere(&mut tree, 5.0, 1.0, 0);
        let i = tree.intersect(a, b).unwrap();
        tree.mark_root(i).unwrap();
        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_dce_disjoint_difference_keeps_override() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = sphere(&mut tree, 5.0, 1.0, 1);
        let d = tree
            .add_node(BooleanOp::Difference, a, b, MaterialId(7))
            .unwrap();
        tree.mark_root(d).unwrap();
        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert_eq!(
            p.instructions()[0],
            Instruction::EvalPrimitive {
                kind: csgvm_interval::PrimitiveKind::Sphere,
                index: 0,
                material: MaterialId(7),
            }
        );
        assert_eq!(p.instructions().len(), 2);
        assert_eq!(p.primitives().len(), 1);
    }

    #[test]
    fn test_dce_union_with_empty_branch() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = sphere(&mut tree, 5.0, 1.0, 0);
        let c = sphere(&mut tree, 10.0, 1.0, 0);
        let empty = tree.intersect(a, b).unwrap();
        let u = tree.union(empty, c).unwrap();
        tree.mark_root(u).unwrap();
        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert_eq!(p.instructions().len(), 2);
    }

    #[test]
    fn test_shared_subtree_recalled() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = sphere(&mut tree, 0.5, 1.0, 0);
        let c = sphere(&mut tree, 1.0, 1.0, 0);
        let shared = tree.union(a, b).unwrap();
        let left = tree.union(shared, c).unwrap();
        let right = tree.difference(shared, c).unwrap();
        let root = tree.union(left, right).unwrap();
        tree.mark_root(root).unwrap();

        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert_eq!(count(&p, |i| matches!(i, Instruction::Recall { .. })), 1);
        assert_eq!(p.slot_count(), 1);
        assert_eq!(p.primitives().len(), 3);

        let plain = compile(&tree, &CompileSettings::unoptimized()).unwrap();
        assert_eq!(count(&plain, |i| matches!(i, Instruction::Recall { .. })), 0);
        assert!(plain.instructions().len() > p.instructions().len());
    }

    #[test]
    fn test_shared_subtree_under_different_overrides_compiles_twice() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = sphere(&mut tree, 0.5, 1.0, 0);
        let shared = tree.union(a, b).unwrap();
        let tinted = tree
            .add_node(BooleanOp::Union, shared, a, MaterialId(3))
            .unwrap();
        let root = tree.union(tinted, shared).unwrap();
        tree.mark_root(root).unwrap();

        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert_eq!(count(&p, |i| matches!(i, Instruction::Recall { .. })), 0);
    }

    #[test]
    fn test_shared_operand_stored_outside_skip_region() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 0);
        let b = sphere(&mut tree, 0.5, 1.0, 0);
        let c = sphere(&mut tree, 1.0, 1.0, 0);
        let shared = tree.union(b, c).unwrap();
        // `shared` is first reached as the second operand of a - shared.
        let cut = tree.difference(a, shared).unwrap();
        let root = tree.union(cut, shared).unwrap();
        tree.mark_root(root).unwrap();

        let settings = CompileSettings {
            reorder_operands: false,
            ..CompileSettings::default()
        };
        let p = compile(&tree, &settings).unwrap();
        assert!(p.validate().is_ok());
        assert_eq!(count(&p, |i| matches!(i, Instruction::SkipIfEmpty { .. })), 0);
        assert_eq!(count(&p, |i| matches!(i, Instruction::Recall { .. })), 1);
        assert_eq!(count(&p, |i| matches!(i, Instruction::EvalPrimitive { .. })), 3);
    }

    #[test]
    fn test_skip_kept_once_shared_operand_is_stored() {
        // n1 = (a - n0) - n0 with n0 shared: the inner difference stores n0
        // unguarded, the outer one recalls it behind a skip.
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 2.0, 0);
        let b = sphere(&mut tree, 0.5, 1.0, 0);
        let c = sphere(&mut tree, -0.5, 1.0, 0);
        let n0 = tree.union(b, c).unwrap();
        let m0 = tree.difference(a, n0).unwrap();
        let n1 = tree.difference(m0, n0).unwrap();
        tree.mark_root(n1).unwrap();

        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert_eq!(count(&p, |i| matches!(i, Instruction::SkipIfEmpty { .. })), 1);
        assert_eq!(count(&p, |i| matches!(i, Instruction::Recall { .. })), 1);
        let skip = p
            .instructions()
            .iter()
            .position(|i| matches!(i, Instruction::SkipIfEmpty { .. }))
            .unwrap();
        assert!(matches!(p.instructions()[skip + 1], Instruction::Recall { slot: 0 }));
    }

    #[test]
    fn test_reorder_cheaper_first() {
        let mut tree = CsgTree::new();
        let t = tree
            .add_primitive(
                Shape::torus(Point3::origin(), Vec3::z_axis(), 2.0, 0.5),
                MaterialId(0),
            )
            .unwrap();
        let s = sphere(&mut tree, 0.0, 2.0, 0);
        let i = tree.intersect(t, s).unwrap();
        tree.mark_root(i).unwrap();

        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert!(matches!(
            p.instructions()[0],
            Instruction::EvalPrimitive {
                kind: csgvm_interval::PrimitiveKind::Sphere,
                ..
            }
        ));
        assert!(matches!(p.instructions()[1], Instruction::SkipIfEmpty { target: 3 }));
        assert!(matches!(
            p.instructions()[3],
            Instruction::Combine {
                op: BooleanOp::Intersect,
                swapped: true,
                ..
            }
        ));
    }

    #[test]
    fn test_primitive_root() {
        let mut tree = CsgTree::new();
        let a = sphere(&mut tree, 0.0, 1.0, 4);
        tree.mark_root(a).unwrap();
        let p = compile(&tree, &CompileSettings::default()).unwrap();
        assert_eq!(p.instructions().len(), 2);
        assert_eq!(p.max_stack_depth(), 1);
        assert!(p.local_bounds().contains_point(&Point3::new(1.0, 0.0, 0.0)));
    }
}
