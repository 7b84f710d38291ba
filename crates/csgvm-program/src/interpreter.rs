//! Stack machine interpreter.
//!
//! [`execute`] is a pure function of (program, ray, range): the caller-owned
//! [`EvalCache`] only holds scratch space and counters. Once the cache has
//! grown to fit the largest program it has seen, evaluation never allocates,
//! so one cache per worker thread is enough for any number of queries.

use crate::instruction::{CompiledProgram, Instruction};
use csgvm_interval::{combine, IntervalList};
use csgvm_math::Ray;

/// Counters accumulated by an [`EvalCache`] across invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Program executions started.
    pub invocations: u64,
    /// Primitive interval functions actually evaluated.
    pub primitive_evals: u64,
    /// `EvalPrimitive` instructions served from the per-invocation cache.
    pub cache_hits: u64,
    /// Combines whose result was merged down to the interval cap.
    pub overflow_merges: u64,
    /// Executions rejected by the program bounds plus operands skipped by
    /// `SkipIfEmpty`.
    pub early_rejects: u64,
}

impl EvalStats {
    /// Fraction of primitive lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.primitive_evals + self.cache_hits;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Scratch state for the interpreter: value stack, primitive memo and
/// stored-result slots.
///
/// Memo entries are stamped with an invocation generation, so starting a new
/// invocation is O(1).
#[derive(Debug, Clone, Default)]
pub struct EvalCache {
    stack: Vec<IntervalList>,
    primitives: Vec<(u32, IntervalList)>,
    slots: Vec<IntervalList>,
    generation: u32,
    stats: EvalStats,
}

impl EvalCache {
    /// Empty cache; grows on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-sized for `program`.
    pub fn for_program(program: &CompiledProgram) -> Self {
        let mut cache = Self::new();
        cache.reserve(program);
        cache
    }

    /// Accumulated counters.
    pub fn stats(&self) -> &EvalStats {
        &self.stats
    }

    /// Reset the counters.
    pub fn reset_stats(&mut self) {
        self.stats = EvalStats::default();
    }

    fn reserve(&mut self, program: &CompiledProgram) {
        let depth = program.max_stack_depth();
        if self.stack.capacity() < depth {
            self.stack.reserve(depth - self.stack.len());
        }
        let prims = program.primitives().len();
        if self.primitives.len() < prims {
            self.primitives.resize(prims, (0, IntervalList::new()));
        }
        if self.slots.len() < program.slot_count() {
            self.slots.resize(program.slot_count(), IntervalList::new());
        }
    }

    fn begin(&mut self, program: &CompiledProgram) {
        self.reserve(program);
        self.stack.clear();
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            for entry in &mut self.primitives {
                entry.0 = 0;
            }
            self.generation = 1;
        }
        self.stats.invocations += 1;
    }

    fn primitive(&mut self, program: &CompiledProgram, index: usize, ray: &Ray) -> IntervalList {
        let generation = self.generation;
        let Some(entry) = self.primitives.get_mut(index) else {
            return IntervalList::new();
        };
        if entry.0 == generation {
            self.stats.cache_hits += 1;
            return entry.1;
        }
        let list = program
            .primitives()
            .get(index)
            .map(|p| p.intersect(ray))
            .unwrap_or_default();
        *entry = (generation, list);
        self.stats.primitive_evals += 1;
        list
    }

    #[inline]
    fn pop(&mut self) -> IntervalList {
        self.stack.pop().unwrap_or_default()
    }
}

/// What a run of the instruction loop should produce.
#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Intervals,
    Shadow,
}

enum Outcome {
    Intervals(IntervalList),
    Hit(bool),
}

/// Run `program` against a program-local ray.
///
/// Returns the intervals overlapping `[t_min, t_max]`, unclipped, in ray
/// parameter order. Intervals are over the whole ray line, so one starting
/// before `t_min` means the range starts inside the solid.
pub fn execute(
    program: &CompiledProgram,
    ray: &Ray,
    t_min: f64,
    t_max: f64,
    cache: &mut EvalCache,
) -> IntervalList {
    match run(program, ray, t_min, t_max, cache, Mode::Intervals) {
        Outcome::Intervals(list) => list,
        Outcome::Hit(_) => IntervalList::new(),
    }
}

/// Presence-only query: true if the program has any interval overlapping
/// `[t_min, t_max]`.
///
/// Returns as soon as a value that reaches the result through unions only
/// is non-empty within range.
pub fn execute_shadow(
    program: &CompiledProgram,
    ray: &Ray,
    t_min: f64,
    t_max: f64,
    cache: &mut EvalCache,
) -> bool {
    match run(program, ray, t_min, t_max, cache, Mode::Shadow) {
        Outcome::Hit(hit) => hit,
        Outcome::Intervals(list) => !list.is_empty(),
    }
}

fn run(
    program: &CompiledProgram,
    ray: &Ray,
    t_min: f64,
    t_max: f64,
    cache: &mut EvalCache,
    mode: Mode,
) -> Outcome {
    cache.begin(program);
    let finish = |list: IntervalList| match mode {
        Mode::Intervals => Outcome::Intervals(list.retain_overlapping(t_min, t_max)),
        Mode::Shadow => Outcome::Hit(list.any_overlapping(t_min, t_max)),
    };

    if ray
        .intersect_aabb(&program.local_bounds(), t_min, t_max)
        .is_none()
    {
        cache.stats.early_rejects += 1;
        return finish(IntervalList::new());
    }

    let code = program.instructions();
    let mut pc = 0usize;
    while let Some(instr) = code.get(pc) {
        match *instr {
            Instruction::EvalPrimitive {
                index, material, ..
            } => {
                let list = cache
                    .primitive(program, index as usize, ray)
                    .with_material_override(material);
                cache.stack.push(list);
            }
            Instruction::Combine { op, swapped, store } => {
                let top = cache.pop();
                let below = cache.pop();
                let (left, right) = if swapped { (top, below) } else { (below, top) };
                let result = combine(op, &left, &right);
                if result.capped {
                    cache.stats.overflow_merges += 1;
                }
                if let Some(slot) = store.and_then(|s| cache.slots.get_mut(s as usize)) {
                    *slot = result.intervals;
                }
                cache.stack.push(result.intervals);
            }
            Instruction::Recall { slot } => {
                let list = cache.slots.get(slot as usize).copied().unwrap_or_default();
                cache.stack.push(list);
            }
            Instruction::SkipIfEmpty { target } => {
                if cache.stack.last().is_some_and(IntervalList::is_empty) {
                    cache.stats.early_rejects += 1;
                    cache.stack.push(IntervalList::new());
                    pc = target as usize;
                    continue;
                }
            }
            Instruction::End => {
                let top = cache.stack.last().copied().unwrap_or_default();
                return finish(top);
            }
        }

        if mode == Mode::Shadow && program.is_shadow_exit(pc) {
            if let Some(top) = cache.stack.last() {
                if top.any_overlapping(t_min, t_max) {
                    return Outcome::Hit(true);
                }
            }
        }
        pc += 1;
    }
    finish(IntervalList::new())
}
