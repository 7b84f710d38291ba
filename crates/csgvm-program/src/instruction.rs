//! Instruction set and the compiled program container.
//!
//! A program is a flat instruction buffer in post order. Every value
//! instruction pushes one interval list; `Combine` pops two and pushes one;
//! `End` returns the top of the stack. Primitive operands are indices into
//! the program's own primitive table, so a program is relocatable and can be
//! shared read-only between threads.

use crate::error::CompileError;
use csgvm_interval::{BooleanOp, MaterialId, Primitive, PrimitiveKind};
use csgvm_math::Aabb3;
use std::fmt;

/// Deepest evaluation stack a program may require.
pub const MAX_STACK_DEPTH: usize = 64;

/// One stack machine instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    /// Push the intervals of `primitives[index]`, with `material` applied as
    /// an override.
    EvalPrimitive {
        /// Shape discriminant, checked against the primitive table.
        kind: PrimitiveKind,
        /// Index into the program's primitive table.
        index: u32,
        /// Effective material override ([`MaterialId::NONE`] for none).
        material: MaterialId,
    },
    /// Pop two lists, combine them, push the result.
    Combine {
        /// Boolean operation.
        op: BooleanOp,
        /// The operands were emitted in reverse order: the top of the stack
        /// is the left operand.
        swapped: bool,
        /// Also store the result in this slot for later `Recall`s.
        store: Option<u32>,
    },
    /// Push a copy of a stored result.
    Recall {
        /// Slot written by an earlier `Combine`.
        slot: u32,
    },
    /// If the top of the stack is empty, push an empty second operand and
    /// jump to `target`. Used where an empty first operand makes the result
    /// empty (intersection, difference).
    SkipIfEmpty {
        /// Offset of the `Combine` consuming both operands.
        target: u32,
    },
    /// Return the top of the stack.
    End,
}

/// An immutable compiled CSG program.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    instructions: Vec<Instruction>,
    primitives: Vec<Primitive>,
    local_bounds: Aabb3,
    max_stack_depth: usize,
    slot_count: usize,
    shadow_exit: Vec<bool>,
}

impl CompiledProgram {
    /// Program that evaluates to nothing.
    pub fn empty() -> Self {
        Self {
            instructions: vec![Instruction::End],
            primitives: Vec::new(),
            local_bounds: Aabb3::empty(),
            max_stack_depth: 0,
            slot_count: 0,
            shadow_exit: vec![false],
        }
    }

    /// Assemble and validate a program from raw parts.
    ///
    /// Stack depth, slot count and shadow exit points are derived from the
    /// instructions.
    pub fn from_parts(
        instructions: Vec<Instruction>,
        primitives: Vec<Primitive>,
        local_bounds: Aabb3,
    ) -> Result<Self, CompileError> {
        let layout = analyze(&instructions, &primitives)?;
        Ok(Self {
            instructions,
            primitives,
            local_bounds,
            max_stack_depth: layout.max_stack_depth,
            slot_count: layout.slot_count,
            shadow_exit: layout.shadow_exit,
        })
    }

    /// Re-run layout validation.
    pub fn validate(&self) -> Result<(), CompileError> {
        analyze(&self.instructions, &self.primitives).map(|_| ())
    }

    /// The instruction buffer.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The program's primitive table.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Conservative bounds of everything the program can produce.
    pub fn local_bounds(&self) -> Aabb3 {
        self.local_bounds
    }

    /// Deepest stack the program reaches.
    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    /// Number of result slots used by `Combine { store }` / `Recall`.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// True if the program always evaluates to nothing.
    pub fn is_empty(&self) -> bool {
        self.instructions.len() == 1
    }

    /// True if a non-empty value pushed by the instruction at `offset`
    /// guarantees a non-empty program result (it reaches `End` only through
    /// unions).
    #[inline]
    pub fn is_shadow_exit(&self, offset: usize) -> bool {
        self.shadow_exit.get(offset).copied().unwrap_or(false)
    }
}

impl Default for CompiledProgram {
    fn default() -> Self {
        Self::empty()
    }
}

struct Layout {
    max_stack_depth: usize,
    slot_count: usize,
    shadow_exit: Vec<bool>,
}

/// Skip region opened by a `SkipIfEmpty`.
struct Region {
    target: usize,
    depth: usize,
    stored: usize,
}

fn invalid(offset: usize, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidLayout {
        offset,
        reason: reason.into(),
    }
}

/// Simulate the stack over the instruction buffer.
///
/// Checks operand counts, primitive references, that every `Recall` reads a
/// slot written on every path reaching it, and that skip regions nest and
/// land on their combine with both operands in place. Records which value
/// instructions feed `End` through unions only.
fn analyze(instructions: &[Instruction], primitives: &[Primitive]) -> Result<Layout, CompileError> {
    let len = instructions.len();
    match instructions.last() {
        Some(Instruction::End) => {}
        _ => return Err(invalid(len.saturating_sub(1), "program must end with End")),
    }

    // Producer offset of each stack entry, and the consumer of each value.
    let mut stack: Vec<usize> = Vec::new();
    let mut consumer: Vec<Option<usize>> = vec![None; len];
    let mut stored: Vec<u32> = Vec::new();
    let mut regions: Vec<Region> = Vec::new();
    let mut max_depth = 0usize;
    let mut slot_count = 0usize;

    for (offset, instr) in instructions.iter().enumerate() {
        while let Some(region) = regions.last() {
            if region.target != offset {
                break;
            }
            if stack.len() != region.depth + 1 {
                return Err(invalid(offset, "skip target reached with unbalanced stack"));
            }
            stored.truncate(region.stored);
            regions.pop();
        }

        match *instr {
            Instruction::EvalPrimitive { kind, index, .. } => {
                let Some(p) = primitives.get(index as usize) else {
                    return Err(invalid(offset, format!("primitive index {index} out of range")));
                };
                if p.kind() != kind {
                    return Err(invalid(
                        offset,
                        format!("primitive {index} is a {}, not a {}", p.kind().name(), kind.name()),
                    ));
                }
                stack.push(offset);
            }
            Instruction::Combine { store, .. } => {
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return Err(invalid(offset, "combine needs two operands"));
                };
                consumer[right] = Some(offset);
                consumer[left] = Some(offset);
                if let Some(slot) = store {
                    stored.push(slot);
                    slot_count = slot_count.max(slot as usize + 1);
                }
                stack.push(offset);
            }
            Instruction::Recall { slot } => {
                if !stored.contains(&slot) {
                    return Err(invalid(offset, format!("slot {slot} read before it is written")));
                }
                stack.push(offset);
            }
            Instruction::SkipIfEmpty { target } => {
                let target = target as usize;
                if stack.is_empty() {
                    return Err(invalid(offset, "skip with empty stack"));
                }
                if target <= offset + 1 || target >= len {
                    return Err(invalid(offset, format!("skip target {target} out of range")));
                }
                if !matches!(instructions[target], Instruction::Combine { .. }) {
                    return Err(invalid(offset, format!("skip target {target} is not a combine")));
                }
                if regions.last().is_some_and(|outer| target > outer.target) {
                    return Err(invalid(offset, "skip regions must nest"));
                }
                regions.push(Region {
                    target,
                    depth: stack.len(),
                    stored: stored.len(),
                });
            }
            Instruction::End => {
                if offset + 1 != len {
                    return Err(invalid(offset, "End before the last instruction"));
                }
                let valid = stack.len() == 1 || (stack.is_empty() && len == 1);
                if !valid {
                    return Err(invalid(
                        offset,
                        format!("End with {} values on the stack", stack.len()),
                    ));
                }
                if let Some(&top) = stack.last() {
                    consumer[top] = Some(offset);
                }
            }
        }
        max_depth = max_depth.max(stack.len());
    }
    if !regions.is_empty() {
        return Err(invalid(len - 1, "unterminated skip region"));
    }

    // Consumers always come later, so a reverse pass sees them first.
    let mut shadow_exit = vec![false; len];
    for offset in (0..len).rev() {
        shadow_exit[offset] = match consumer[offset] {
            Some(c) => match instructions[c] {
                Instruction::End => true,
                Instruction::Combine {
                    op: BooleanOp::Union,
                    ..
                } => shadow_exit[c],
                _ => false,
            },
            None => false,
        };
    }

    Ok(Layout {
        max_stack_depth: max_depth,
        slot_count,
        shadow_exit,
    })
}

impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; {} instructions, {} primitives, stack {}, slots {}",
            self.instructions.len(),
            self.primitives.len(),
            self.max_stack_depth,
            self.slot_count
        )?;
        for (offset, instr) in self.instructions.iter().enumerate() {
            let mark = if self.is_shadow_exit(offset) { '*' } else { ' ' };
            write!(f, "{offset:04}{mark} ")?;
            match *instr {
                Instruction::EvalPrimitive {
                    kind,
                    index,
                    material,
                } => write!(f, "eval      {} #{index} {material}", kind.name())?,
                Instruction::Combine { op, swapped, store } => {
                    write!(f, "combine   {}", op.name())?;
                    if swapped {
                        write!(f, " swapped")?;
                    }
                    if let Some(slot) = store {
                        write!(f, " -> s{slot}")?;
                    }
                }
                Instruction::Recall { slot } => write!(f, "recall    s{slot}")?,
                Instruction::SkipIfEmpty { target } => write!(f, "skip_if_empty {target:04}")?,
                Instruction::End => write!(f, "end")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csgvm_interval::Shape;
    use csgvm_math::Point3;

    fn prims() -> Vec<Primitive> {
        vec![
            Primitive::new(Shape::sphere(Point3::origin(), 1.0), MaterialId(0)).unwrap(),
            Primitive::new(Shape::sphere(Point3::new(1.0, 0.0, 0.0), 1.0), MaterialId(1)).unwrap(),
        ]
    }

    fn eval(index: u32) -> Instruction {
        Instruction::EvalPrimitive {
            kind: PrimitiveKind::Sphere,
            index,
            material: MaterialId::NONE,
        }
    }

    fn combine(op: BooleanOp) -> Instruction {
        Instruction::Combine {
            op,
            swapped: false,
            store: None,
        }
    }

    #[test]
    fn test_empty_program_is_valid() {
        let p = CompiledProgram::empty();
        assert!(p.validate().is_ok());
        assert!(p.is_empty());
        assert_eq!(p.max_stack_depth(), 0);
    }

    #[test]
    fn test_layout_depth_and_shadow_exits() {
        // (s0 ∪ s1) − s0
        let code = vec![
            eval(0),
            eval(1),
            combine(BooleanOp::Union),
            eval(0),
            combine(BooleanOp::Difference),
            Instruction::End,
        ];
        let p = CompiledProgram::from_parts(code, prims(), Aabb3::empty()).unwrap();
        assert_eq!(p.max_stack_depth(), 2);
        assert!(!p.is_shadow_exit(0));
        assert!(!p.is_shadow_exit(2));
        assert!(p.is_shadow_exit(4));
    }

    #[test]
    fn test_union_children_are_shadow_exits() {
        let code = vec![eval(0), eval(1), combine(BooleanOp::Union), Instruction::End];
        let p = CompiledProgram::from_parts(code, prims(), Aabb3::empty()).unwrap();
        assert!(p.is_shadow_exit(0));
        assert!(p.is_shadow_exit(1));
        assert!(p.is_shadow_exit(2));
    }

    #[test]
    fn test_rejects_missing_end() {
        let err = CompiledProgram::from_parts(vec![eval(0)], prims(), Aabb3::empty()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidLayout { offset: 0, .. }));
    }

    #[test]
    fn test_rejects_stack_underflow() {
        let code = vec![eval(0), combine(BooleanOp::Union), Instruction::End];
        let err = CompiledProgram::from_parts(code, prims(), Aabb3::empty()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidLayout { offset: 1, .. }));
    }

    #[test]
    fn test_rejects_bad_primitive_reference() {
        let code = vec![eval(5), Instruction::End];
        assert!(CompiledProgram::from_parts(code, prims(), Aabb3::empty()).is_err());

        let code = vec![
            Instruction::EvalPrimitive {
                kind: PrimitiveKind::Torus,
                index: 0,
                material: MaterialId::NONE,
            },
            Instruction::End,
        ];
        assert!(CompiledProgram::from_parts(code, prims(), Aabb3::empty()).is_err());
    }

    #[test]
    fn test_rejects_recall_of_skippable_store() {
        // The store at 4 sits inside the operand skipped by 1, so the recall
        // at 6 may read a slot that was never written.
        let code = vec![
            eval(0),
            Instruction::SkipIfEmpty { target: 5 },
            eval(1),
            eval(0),
            Instruction::Combine {
                op: BooleanOp::Union,
                swapped: false,
                store: Some(0),
            },
            combine(BooleanOp::Intersect),
            Instruction::Recall { slot: 0 },
            combine(BooleanOp::Union),
            Instruction::End,
        ];
        let err = CompiledProgram::from_parts(code, prims(), Aabb3::empty()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidLayout { offset: 6, .. }));
    }

    #[test]
    fn test_store_on_skipped_combine_is_recallable() {
        let code = vec![
            eval(0),
            Instruction::SkipIfEmpty { target: 3 },
            eval(1),
            Instruction::Combine {
                op: BooleanOp::Intersect,
                swapped: false,
                store: Some(0),
            },
            Instruction::Recall { slot: 0 },
            combine(BooleanOp::Union),
            Instruction::End,
        ];
        let p = CompiledProgram::from_parts(code, prims(), Aabb3::empty()).unwrap();
        assert_eq!(p.slot_count(), 1);
        assert_eq!(p.max_stack_depth(), 2);
    }

    #[test]
    fn test_rejects_leftover_values() {
        let code = vec![eval(0), eval(1), Instruction::End];
        assert!(CompiledProgram::from_parts(code, prims(), Aabb3::empty()).is_err());
    }

    #[test]
    fn test_disassembly_lists_every_instruction() {
        let code = vec![eval(0), eval(1), combine(BooleanOp::Intersect), Instruction::End];
        let p = CompiledProgram::from_parts(code, prims(), Aabb3::empty()).unwrap();
        let text = p.to_string();
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("combine   intersect"));
        assert!(text.contains("eval      sphere #1"));
    }
}
