//! Crate `ruler`: the shared-problem layer (spec.md component C10). Holds
//! the original (simplified) clauses, their occurrence lists, the global
//! unit queue, the variable-compaction map, and the witness-reconstruction
//! stack. Grounded in the original solver's `ruler.c`/`witness.c`
//! (`examples/original_source`), since the teacher keeps its whole problem
//! ring-private and has no shared layer at all.
pub mod inprocess;

use crate::{
    barrier::Termination,
    config::Config,
    dimacs::{is_tautology, CNFReader},
    drat::DratTracer,
    types::{int2lit, var2lit, CNFDescription, Lit, LiteralEncoding, MaybeInconsistent, SolverError, VarId, INVALID_LIT},
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI8, Ordering};
use std::sync::{Arc, Mutex};

/// A clause of 3+ literals owned by the ruler. Binary clauses never reach
/// here; they live in `RulerInner::binary_adj`, the implication-graph
/// adjacency that doubles as the ruler's binary store (spec.md §3
/// "irredundant binaries are owned jointly by the ruler's binary array").
#[derive(Clone, Debug)]
pub struct RulerClause {
    pub lits: Vec<Lit>,
    pub garbage: bool,
}

/// `ClauseId` 0 is reserved as "no such clause", matching `cdb::NULL_CLAUSE`.
pub const NULL_RULER_CLAUSE: usize = 0;

/// Shared problem state mutated only while every ring is collectively
/// paused at a simplify barrier (spec.md §5 "Shared-resource policy").
/// The surrounding `Mutex` on `Ruler::inner` is a Rust-idiomatic stand-in
/// for that cooperative discipline: the barrier protocol already
/// guarantees at most one ring ever touches this, so the lock is never
/// contended in practice, but encoding the exclusion in the type system
/// is cheap and removes a whole class of "a future caller forgot to
/// rendezvous first" bugs (documented as an Open Question decision in
/// DESIGN.md, not a deviation from spec.md's semantics).
pub struct RulerInner {
    pub clauses: Vec<RulerClause>,
    /// occurrence lists for long clauses (3+ literals), indexed by literal.
    pub occurs: Vec<Vec<usize>>,
    /// binary implication graph / binary clause store, indexed by literal:
    /// `binary_adj[l]` holds every `other` such that `(¬l ∨ other)` exists.
    pub binary_adj: Vec<Vec<Lit>>,
    pub num_binaries: usize,
    pub eliminate: Vec<bool>,
    pub subsume: Vec<bool>,
    pub eliminated: Vec<bool>,
    /// `INVALID_LIT`-separated groups `(witness, lit_1, .., lit_k)`, most
    /// recently pushed group last (spec.md §3 Extension stack).
    pub extension: Vec<Lit>,
    /// current-index -> original-DIMACS-index map, composed across
    /// successive compaction rounds (spec.md §4.11 step 7).
    pub unmap: Vec<VarId>,
}

impl RulerInner {
    fn new(nv: usize) -> RulerInner {
        RulerInner {
            clauses: vec![RulerClause {
                lits: Vec::new(),
                garbage: true,
            }],
            occurs: vec![Vec::new(); 2 * (nv + 1)],
            binary_adj: vec![Vec::new(); 2 * (nv + 1)],
            num_binaries: 0,
            eliminate: vec![true; nv + 1],
            subsume: vec![true; nv + 1],
            eliminated: vec![false; nv + 1],
            extension: Vec::new(),
            unmap: (0..=nv).collect(),
        }
    }

    fn add_long_clause(&mut self, lits: Vec<Lit>) -> usize {
        let cid = self.clauses.len();
        for &l in &lits {
            self.occurs[l as usize].push(cid);
        }
        self.clauses.push(RulerClause {
            lits,
            garbage: false,
        });
        cid
    }

    fn add_binary(&mut self, a: Lit, b: Lit) {
        self.binary_adj[a.negate() as usize].push(b);
        self.binary_adj[b.negate() as usize].push(a);
        self.num_binaries += 1;
    }

    /// push `(witness, rest...)` as one extension-stack group (spec.md §3,
    /// §4.11: used by both SCC substitution and bounded variable
    /// elimination).
    pub fn push_extension_group(&mut self, witness: Lit, rest: &[Lit]) {
        self.extension.push(INVALID_LIT);
        self.extension.push(witness);
        self.extension.extend_from_slice(rest);
    }
}

/// A unit derived during search or simplification, queued for every ring
/// to import (spec.md §3 "units ring (begin/propagate/end), protected by a
/// mutex").
pub struct UnitsQueue {
    queue: VecDeque<Lit>,
}

/// The shared problem: root-level `values` are read lock-free by every
/// ring on the fast path (spec.md §5); everything else requires either the
/// `units` mutex (search-time unit import) or `inner` (simplify-time
/// structural mutation, guarded by the barrier protocol).
pub struct Ruler {
    /// original DIMACS variable count, fixed for the life of a solve.
    pub num_vars_original: usize,
    /// root-level assignment, 1-indexed by `VarId`; `0` unknown, `1`/`-1`
    /// known. Monotone: once non-zero, never changes (spec.md §5).
    values: Vec<AtomicI8>,
    units: Mutex<UnitsQueue>,
    inner: Mutex<RulerInner>,
    pub term: Arc<Termination>,
    /// the DRAT proof sink (spec.md §6), `DratTracer::Disabled` unless the
    /// CLI passed `--certify`. A separate lock from `inner` since tracing
    /// happens on both the ruler's own inprocessing and every ring's
    /// learnt-clause attachment, never in lockstep with `inner`'s
    /// barrier-guarded structural mutation.
    drat: Mutex<DratTracer>,
}

impl Ruler {
    /// Parse a DIMACS file and build the initial (unsimplified) ruler
    /// state: tautological clauses dropped at parse time, units enqueued
    /// immediately, an empty clause or complementary units detected as
    /// immediate UNSAT (spec.md §6, §8 boundary behaviors).
    pub fn from_dimacs(reader: &mut CNFReader) -> Result<Ruler, SolverError> {
        let nv = reader.cnf.num_of_variables;
        let ruler = Ruler {
            num_vars_original: nv,
            values: (0..=nv).map(|_| AtomicI8::new(0)).collect(),
            units: Mutex::new(UnitsQueue {
                queue: VecDeque::new(),
            }),
            inner: Mutex::new(RulerInner::new(nv)),
            term: Arc::new(Termination::new()),
            drat: Mutex::new(DratTracer::disabled()),
        };
        while let Some(lits) = reader.next_clause()? {
            if is_tautology(&lits) {
                continue;
            }
            match lits.len() {
                0 => return Err(SolverError::Inconsistent),
                1 => {
                    ruler.assign_root(lits[0])?;
                }
                2 => {
                    ruler.inner.lock().unwrap().add_binary(lits[0], lits[1]);
                }
                _ => {
                    ruler.inner.lock().unwrap().add_long_clause(lits);
                }
            }
        }
        Ok(ruler)
    }

    /// Sized by the *current* (possibly compacted) variable count, since
    /// this is what every ring's private `AssignStack`/`VarDB`/`ClauseDB`
    /// gets instantiated against (spec.md §4.11 step 7).
    pub fn cnf_description(&self, pathname: &str) -> CNFDescription {
        CNFDescription {
            num_of_variables: self.num_vars_current(),
            num_of_clauses: self.inner.lock().unwrap().clauses.len().saturating_sub(1),
            pathname: pathname.to_string(),
        }
    }

    /// Install the proof sink chosen by `--certify`/`--ascii` (spec.md §6).
    /// Called once, before the ruler is wrapped in an `Arc` and handed to
    /// ring threads, so there is no contention on the swap itself.
    pub fn set_drat(&self, tracer: DratTracer) {
        *self.drat.lock().unwrap_or_else(|e| e.into_inner()) = tracer;
    }

    pub fn drat_enabled(&self) -> bool {
        self.drat.lock().unwrap_or_else(|e| e.into_inner()).is_enabled()
    }

    /// Trace a clause derivation (learnt attach, resolution, BVE resolvent,
    /// strengthening -- spec.md §6 "add"). A no-op when proof tracing is
    /// disabled.
    pub fn drat_add(&self, lits: &[Lit]) {
        self.drat.lock().unwrap_or_else(|e| e.into_inner()).add_clause(lits);
    }

    /// Trace a clause removal (satisfied-clause removal, subsumption,
    /// binary dedup -- spec.md §6 "delete").
    pub fn drat_delete(&self, lits: &[Lit]) {
        self.drat.lock().unwrap_or_else(|e| e.into_inner()).delete_clause(lits);
    }

    /// Trace the empty clause derived at an unconditional (root-level)
    /// conflict -- the UNSAT certificate's final line.
    pub fn drat_add_empty(&self) {
        self.drat.lock().unwrap_or_else(|e| e.into_inner()).add_empty();
    }

    pub fn flush_drat(&self) {
        self.drat.lock().unwrap_or_else(|e| e.into_inner()).flush();
    }

    /// lock-free fast-path read of the root-level assignment (spec.md §5).
    #[inline]
    pub fn value(&self, l: Lit) -> Option<bool> {
        match self.values[l.vi()].load(Ordering::Acquire) {
            0 => None,
            v => Some((v > 0) == l.positive()),
        }
    }

    pub fn is_eliminated(&self, vi: VarId) -> bool {
        self.inner.lock().unwrap().eliminated[vi]
    }

    /// Assign `l` at the root level, queueing it for every ring to import.
    /// Errs if already falsified (spec.md §4.2 `assign_at_rootlevel`,
    /// generalized to the shared ruler).
    pub fn assign_root(&self, l: Lit) -> MaybeInconsistent {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        match self.value(l) {
            Some(true) => Ok(()),
            Some(false) => Err(SolverError::Inconsistent),
            None => {
                let sign: i8 = if l.positive() { 1 } else { -1 };
                self.values[l.vi()].store(sign, Ordering::Release);
                units.queue.push_back(l);
                Ok(())
            }
        }
    }

    /// Drain every unit enqueued since a ring last called this, for that
    /// ring to assign into its own trail (spec.md §4.12 simplify
    /// rendezvous step (c): "import/propagate units until all workers'
    /// unit cursors converge"). Each ring keeps its own cursor externally
    /// (as the number of units already seen), so this returns everything
    /// from `since` onward rather than truly draining a shared queue --
    /// multiple rings each read the same backlog independently.
    ///
    /// Units are queued in original DIMACS-variable space (`assign_root`
    /// is always called with original ids), but the caller is a ring
    /// working in the current, possibly compacted, space -- so each
    /// literal is translated through `unmap` before being handed back.
    /// `inner` is locked and dropped before `units` is taken, matching
    /// the nesting order `propagate_units_to_fixpoint` already uses
    /// (lock `inner`, then call `assign_root` which locks `units`), so
    /// this never holds both at once in a new order.
    pub fn units_since(&self, since: usize) -> Vec<Lit> {
        let orig_to_current = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            original_to_current(&inner.unmap, self.num_vars_original)
        };
        let units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        units
            .queue
            .iter()
            .skip(since)
            .map(|&l| var2lit(orig_to_current[l.vi()], l.positive()))
            .collect()
    }

    pub fn num_units(&self) -> usize {
        self.units.lock().unwrap_or_else(|e| e.into_inner()).queue.len()
    }

    /// Run one full simplification round: propagate to fixpoint, flush
    /// garbage, SCC-substitute, dedup binaries, subsume/strengthen, run
    /// bounded variable elimination, compact (spec.md §4.11). Invoked once
    /// at startup and at every periodic simplify rendezvous.
    pub fn simplify_round(&self, config: &Config) -> MaybeInconsistent {
        inprocess::run_round(self, config)
    }

    /// Snapshot the current (simplified) clause set for a newly spawned
    /// ring: every live long clause's literals, and every distinct binary
    /// edge exactly once (spec.md §3 Ownership: "first shares structure,
    /// others deep-copy" -- we deep-copy for every ring uniformly, which is
    /// simpler and no less correct since `RulerClause` payloads are cheap
    /// `Vec<Lit>`s, not large shared allocations). Literals are translated
    /// from original DIMACS ids to the current (possibly compacted) space
    /// rings actually work in (spec.md §4.11 step 7); `unmap_var` inverts
    /// this translation for witness reporting.
    pub fn export_clauses(&self) -> (Vec<Vec<Lit>>, Vec<(Lit, Lit)>) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let orig_to_current = original_to_current(&inner.unmap, self.num_vars_original);
        let remap = |l: Lit| var2lit(orig_to_current[l.vi()], l.positive());
        let longs = inner
            .clauses
            .iter()
            .skip(1)
            .filter(|c| !c.garbage)
            .map(|c| c.lits.iter().map(|&l| remap(l)).collect())
            .collect();
        let mut binaries = Vec::new();
        for l in 2..inner.binary_adj.len() {
            let lit = l as Lit;
            for &other in &inner.binary_adj[lit as usize] {
                // clause (a ∨ b) is stored twice, once from a.negate() and
                // once from b.negate(); emit it only from the smaller side.
                let a = lit.negate();
                if a < other {
                    binaries.push((remap(a), remap(other)));
                }
            }
        }
        (longs, binaries)
    }

    pub fn num_vars_current(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).unmap.len() - 1
    }

    /// Map a current (possibly compacted) variable id back to its original
    /// DIMACS index, for reporting a witness.
    pub fn unmap_var(&self, vi: VarId) -> VarId {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).unmap[vi]
    }

    /// Reconstruct a full original-space model from a partial one found by
    /// a ring on the (possibly compacted) live problem (spec.md §4.11
    /// "Witness extension"). `model` is indexed by *original* `VarId` and
    /// must already carry every value the ring and the root assignment
    /// fixed, remapped through `unmap_var`; unassigned (eliminated or
    /// never-touched) entries get a default phase here, then the
    /// extension stack is replayed backwards to fix up eliminated/SCC'd
    /// variables so every original clause is satisfied.
    pub fn witness_extend(&self, model: &mut [Option<bool>]) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for vi in 1..model.len() {
            if model[vi].is_none() {
                model[vi] = Some(true); // arbitrary default phase.
            }
        }
        let stack = &inner.extension;
        let mut i = stack.len();
        while i > 0 {
            debug_assert_eq!(stack[i - 1], INVALID_LIT, "extension stack must end on a group boundary");
            i -= 1; // step over the INVALID_LIT marker.
            let mut start = i;
            while start > 0 && stack[start - 1] != INVALID_LIT {
                start -= 1;
            }
            let group = &stack[start..i];
            if let Some((&witness, rest)) = group.split_first() {
                let satisfied = rest.iter().any(|&l| literal_holds(model, l));
                if !satisfied {
                    model[witness.vi()] = Some(witness.positive());
                }
            }
            i = start;
        }
    }
}

fn literal_holds(model: &[Option<bool>], l: Lit) -> bool {
    model[l.vi()] == Some(l.positive())
}

/// invert `unmap` (current id -> original id) into original id -> current
/// id, sized to the full original variable range; entries for a variable
/// `unmap` no longer lists (eliminated or fixed at the root) stay `0` and
/// are never looked up, since no surviving clause literal can name one.
fn original_to_current(unmap: &[VarId], num_vars_original: usize) -> Vec<VarId> {
    let mut inverse = vec![0 as VarId; num_vars_original + 1];
    for (current, &original) in unmap.iter().enumerate().skip(1) {
        inverse[original] = current as VarId;
    }
    inverse
}

/// convenience used only by tests and the CLI glue: build a `Ruler`
/// directly from a list of DIMACS-signed-int clauses.
#[cfg(test)]
pub fn ruler_from_ints(nv: usize, clauses: &[Vec<i32>]) -> Result<Ruler, SolverError> {
    let ruler = Ruler {
        num_vars_original: nv,
        values: (0..=nv).map(|_| AtomicI8::new(0)).collect(),
        units: Mutex::new(UnitsQueue {
            queue: VecDeque::new(),
        }),
        inner: Mutex::new(RulerInner::new(nv)),
        term: Arc::new(Termination::new()),
        drat: Mutex::new(DratTracer::disabled()),
    };
    for c in clauses {
        let lits: Vec<Lit> = c.iter().map(|&x| int2lit(x)).collect();
        if is_tautology(&{
            let mut s = lits.clone();
            s.sort_unstable();
            s
        }) {
            continue;
        }
        match lits.len() {
            0 => return Err(SolverError::Inconsistent),
            1 => ruler.assign_root(lits[0])?,
            2 => ruler.inner.lock().unwrap().add_binary(lits[0], lits[1]),
            _ => {
                ruler.inner.lock().unwrap().add_long_clause(lits);
            }
        }
    }
    Ok(ruler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_root_then_value_roundtrips() {
        let ruler = ruler_from_ints(3, &[vec![1, 2, 3]]).unwrap();
        ruler.assign_root(int2lit(1)).unwrap();
        assert_eq!(ruler.value(int2lit(1)), Some(true));
        assert_eq!(ruler.value(int2lit(-1)), Some(false));
    }

    #[test]
    fn complementary_units_are_inconsistent() {
        let ruler = ruler_from_ints(1, &[vec![1]]).unwrap();
        assert!(matches!(ruler.assign_root(int2lit(-1)), Err(SolverError::Inconsistent)));
    }

    #[test]
    fn export_clauses_emits_each_binary_edge_once() {
        let ruler = ruler_from_ints(2, &[vec![1, 2]]).unwrap();
        let (longs, binaries) = ruler.export_clauses();
        assert!(longs.is_empty());
        assert_eq!(binaries.len(), 1);
    }

    #[test]
    fn witness_extend_applies_a_forced_group() {
        let ruler = ruler_from_ints(2, &[]).unwrap();
        {
            let mut inner = ruler.inner.lock().unwrap();
            // group: witness=+1, rest=[-2]; since var 2 isn't satisfying
            // -2 in the model below, the witness must be forced true.
            inner.push_extension_group(int2lit(1), &[int2lit(-2)]);
        }
        let mut model = vec![None, None, Some(true)]; // var2 = true, so -2 is false
        ruler.witness_extend(&mut model);
        assert_eq!(model[1], Some(true));
    }
}
