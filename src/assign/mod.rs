//! Crate `assign`: the trail and the two-watched-literal propagator (spec.md
//! components C2/C3), grounded in the teacher's `AssignStack::propagate`
//! (`src/assign.rs`) and generalized from its unified `Watch{binary, blocker,
//! c}` record to the `cdb::watch::Watch` enum.
pub mod heap;
pub mod vmtf;

pub use heap::VarIdHeap;
pub use vmtf::Vmtf;

use crate::{
    cdb::{ClauseDBIF, Watch},
    config::Config,
    types::{CNFDescription, DecisionLevel, Instantiate, Lit, LiteralEncoding},
    var::VarDB,
};

/// why a literal is on the trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignReason {
    Decision,
    /// implied by a binary clause; the other literal is this one, negated.
    Binary(Lit),
    /// implied by a long clause.
    Long(usize),
}

/// the outcome of hitting a falsified clause during propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conflict {
    Binary(Lit, Lit),
    Long(usize),
}

/// The trail: per-variable assignment/level/reason plus the literal log
/// itself, and the stable-mode heap / focused-mode queue used to pick the
/// next decision (spec.md §3 Trail, Heap, VMTF queue).
#[derive(Debug)]
pub struct AssignStack {
    assign: Vec<Option<bool>>,
    level: Vec<DecisionLevel>,
    reason: Vec<AssignReason>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    /// `trail_pos[vi]` is the index `vi`'s literal sits at in `trail` while
    /// assigned; stale once unassigned, only read for currently-assigned
    /// variables (mailbox import's force-repropagate).
    trail_pos: Vec<usize>,
    q_head: usize,
    root_level: DecisionLevel,
    pub heap: VarIdHeap,
    pub vmtf: Vmtf,
    /// `true` selects the stable-mode heap for decisions, `false` the
    /// focused-mode VMTF queue (spec.md §4.4 mode switch).
    pub stable: bool,
    num_propagation: u64,
    num_conflict: u64,
    num_decision: u64,
    num_restart: u64,
}

impl Instantiate for AssignStack {
    fn instantiate(config: &Config, cnf: &CNFDescription) -> AssignStack {
        let nv = cnf.num_of_variables;
        let _ = config;
        AssignStack {
            assign: vec![None; nv + 1],
            level: vec![0; nv + 1],
            reason: vec![AssignReason::Decision; nv + 1],
            trail: Vec::with_capacity(nv),
            trail_lim: Vec::new(),
            trail_pos: vec![0; nv + 1],
            q_head: 0,
            root_level: 0,
            heap: VarIdHeap::new(nv),
            vmtf: Vmtf::new(nv),
            stable: true,
            num_propagation: 0,
            num_conflict: 0,
            num_decision: 0,
            num_restart: 0,
        }
    }
}

impl AssignStack {
    pub fn num_vars(&self) -> usize {
        self.assign.len() - 1
    }
    #[inline]
    pub fn value(&self, l: Lit) -> Option<bool> {
        self.assign[l.vi()].map(|b| b == l.positive())
    }
    #[inline]
    pub fn assigned(&self, vi: crate::types::VarId) -> Option<bool> {
        self.assign[vi]
    }
    #[inline]
    pub fn level(&self, vi: crate::types::VarId) -> DecisionLevel {
        self.level[vi]
    }
    #[inline]
    pub fn reason(&self, vi: crate::types::VarId) -> AssignReason {
        self.reason[vi]
    }
    pub fn decision_level(&self) -> DecisionLevel {
        self.trail_lim.len() as DecisionLevel
    }
    pub fn root_level(&self) -> DecisionLevel {
        self.root_level
    }
    pub fn is_root_level(&self) -> bool {
        self.decision_level() == self.root_level
    }
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }
    pub fn num_assigns(&self) -> usize {
        self.trail.len()
    }
    pub fn remains(&self) -> bool {
        self.q_head < self.trail.len()
    }
    /// Is `c`, the reason the unit propagation at `cid` exists for, still
    /// locking the first literal of the trail entry it produced? (spec.md
    /// §4.6 Reduce must never touch a clause this returns `true` for.)
    pub fn locked_long(&self, first_lit: Lit, cid: usize) -> bool {
        let vi = first_lit.vi();
        self.assign[vi].is_some() && self.reason[vi] == AssignReason::Long(cid)
    }

    /// trail index of `vi`'s current assignment; only meaningful while
    /// `vi` is assigned.
    pub fn trail_pos(&self, vi: crate::types::VarId) -> usize {
        self.trail_pos[vi]
    }

    /// rewind the propagation cursor so the next `propagate` call
    /// re-examines the trail entry that falsifies `lit`, forcing it to
    /// notice a watch just registered on `lit`'s bucket (mailbox import:
    /// an imported clause can arrive already falsified at one of its
    /// chosen watches, so the FIFO cursor must be walked back to the
    /// point that would have triggered it).
    pub fn force_repropagate(&mut self, lit: Lit) {
        debug_assert_eq!(self.value(lit), Some(false));
        let pos = self.trail_pos[lit.vi()];
        debug_assert_eq!(self.trail[pos], lit.negate());
        self.q_head = self.q_head.min(pos);
    }

    fn bump_var(&mut self, vi: crate::types::VarId, vdb: &mut VarDB, timestamp: u64) {
        vdb.bump_activity(vi);
        self.heap.update(vdb, vi);
        vdb.bump_timestamp(vi);
        self.vmtf.bump(vi, timestamp);
    }

    fn push_trail(&mut self, l: Lit, reason: AssignReason, lv: DecisionLevel) {
        let vi = l.vi();
        self.assign[vi] = Some(l.positive());
        self.level[vi] = lv;
        self.reason[vi] = reason;
        self.trail_pos[vi] = self.trail.len();
        self.trail.push(l);
    }

    /// assign `l` at the root level as a precondition (unit clauses, the
    /// ruler's simplification results). errs if already falsified.
    pub fn assign_at_rootlevel(&mut self, l: Lit) -> crate::types::MaybeInconsistent {
        match self.value(l) {
            Some(true) => Ok(()),
            Some(false) => Err(crate::types::SolverError::Inconsistent),
            None => {
                self.push_trail(l, AssignReason::Decision, self.root_level);
                Ok(())
            }
        }
    }
    pub fn assign_by_implication(&mut self, l: Lit, reason: AssignReason, lv: DecisionLevel) {
        debug_assert_eq!(self.value(l), None);
        self.push_trail(l, reason, lv);
    }
    pub fn assign_by_decision(&mut self, vdb: &mut VarDB, l: Lit) {
        self.trail_lim.push(self.trail.len());
        self.num_decision += 1;
        self.push_trail(l, AssignReason::Decision, self.decision_level());
        let _ = vdb;
    }

    /// backjump to `lv`, unassigning everything above it and restoring the
    /// saved phase (spec.md §4.6 Backtrack).
    pub fn cancel_until(&mut self, vdb: &mut VarDB, lv: DecisionLevel) {
        if self.decision_level() <= lv {
            return;
        }
        let lim = self.trail_lim[lv as usize];
        for i in (lim..self.trail.len()).rev() {
            let l = self.trail[i];
            let vi = l.vi();
            vdb[vi].saved.set(l.positive());
            self.assign[vi] = None;
            if !self.heap.contains(vi) {
                self.heap.insert(vdb, vi);
            }
        }
        self.trail.truncate(lim);
        self.trail_lim.truncate(lv as usize);
        self.q_head = self.q_head.min(self.trail.len());
        self.vmtf.reset_search();
    }

    /// Boolean constraint propagation to fixpoint: drains the trail,
    /// returning the first conflicting clause it finds, if any (spec.md
    /// §4.3). Mirrors the teacher's blocker-cached, middle-pointer-rotated
    /// watch scan, generalized across the binary/long watch split.
    pub fn propagate(&mut self, cdb: &mut impl ClauseDBIF) -> Option<Conflict> {
        while self.q_head < self.trail.len() {
            let p = self.trail[self.q_head];
            self.q_head += 1;
            self.num_propagation += 1;
            let false_lit = p.negate();
            // a clause watching `false_lit` registered at `negate(false_lit) == p`
            // (cdb::registration_index); that's the list to re-examine now.
            let mut source = std::mem::take(cdb.watcher_list_mut(p));
            let mut i = 0;
            let mut conflict = None;
            while i < source.len() {
                let w = source[i];
                match w {
                    Watch::Binary { redundant: _, other } => match self.value(other) {
                        Some(true) => i += 1,
                        Some(false) => {
                            conflict = Some(Conflict::Binary(false_lit, other));
                            break;
                        }
                        None => {
                            self.assign_by_implication(
                                other,
                                AssignReason::Binary(false_lit),
                                self.level(false_lit.vi()),
                            );
                            i += 1;
                        }
                    },
                    Watch::Long { cid, blocker, search_from } => {
                        if self.value(blocker) == Some(true) {
                            i += 1;
                            continue;
                        }
                        let first = {
                            let clause = cdb.clause_mut(cid);
                            if clause.lits[0] == false_lit {
                                clause.lits.swap(0, 1);
                            }
                            clause.lits[0]
                        };
                        let first_value = self.value(first);
                        if first != blocker && first_value == Some(true) {
                            source[i] = Watch::Long {
                                cid,
                                blocker: first,
                                search_from,
                            };
                            i += 1;
                            continue;
                        }
                        let len = cdb.clause(cid).lits.len();
                        let mut relocated = None;
                        let mut k = search_from.max(2);
                        while k < len {
                            if self.value(cdb.clause(cid).lits[k]) != Some(false) {
                                relocated = Some(k);
                                break;
                            }
                            k += 1;
                        }
                        if let Some(k) = relocated {
                            let clause = cdb.clause_mut(cid);
                            clause.lits.swap(1, k);
                            let new_watch_lit = clause.lits[1];
                            source.swap_remove(i);
                            cdb.watcher_list_mut(new_watch_lit.negate()).push(Watch::Long {
                                cid,
                                blocker: first,
                                search_from: k + 1,
                            });
                            continue;
                        }
                        if first_value == Some(false) {
                            conflict = Some(Conflict::Long(cid));
                            break;
                        }
                        let lv = cdb.clause(cid).lits[1..]
                            .iter()
                            .map(|l| self.level(l.vi()))
                            .max()
                            .unwrap_or(self.root_level);
                        self.assign_by_implication(first, AssignReason::Long(cid), lv);
                        i += 1;
                    }
                }
            }
            *cdb.watcher_list_mut(p) = source;
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    pub fn satisfies(&self, c: &[Lit]) -> bool {
        c.iter().any(|&l| self.value(l) == Some(true))
    }

    /// `Some(true)`/`Some(false)` when the clause is already decided,
    /// `None` while at least one literal is unassigned (spec.md §4.1).
    pub fn status(&self, c: &[Lit]) -> Option<bool> {
        let mut has_unassigned = false;
        for &l in c {
            match self.value(l) {
                Some(true) => return Some(true),
                Some(false) => {}
                None => has_unassigned = true,
            }
        }
        if has_unassigned {
            None
        } else {
            Some(false)
        }
    }

    /// pick the next decision literal from the active heuristic's order,
    /// skipping assigned/eliminated variables (spec.md §4.4).
    pub fn select_decision_literal(&mut self, vdb: &mut VarDB) -> Option<Lit> {
        let vi = if self.stable {
            loop {
                let vi = self.heap.pop_root(vdb)?;
                if self.assigned(vi).is_none() && !vdb[vi].is(crate::types::VarFlag::ELIMINATED) {
                    break vi;
                }
            }
        } else {
            let assign = &self.assign;
            let vdb_ref = &*vdb;
            self.vmtf.next_unassigned(|v| {
                assign[v].is_some() || vdb_ref[v].is(crate::types::VarFlag::ELIMINATED)
            })?
        };
        let positive = vdb[vi].decide_phase(self.stable, true);
        Some(crate::types::var2lit(vi, positive))
    }

    pub fn rebuild_heap(&mut self, vdb: &VarDB) {
        self.heap.clear();
        for vi in 1..=self.num_vars() {
            if self.assigned(vi).is_none() && !vdb[vi].is(crate::types::VarFlag::ELIMINATED) {
                self.heap.insert(vdb, vi);
            }
        }
    }

    pub fn bump_on_conflict(&mut self, vi: crate::types::VarId, vdb: &mut VarDB, timestamp: u64) {
        self.bump_var(vi, vdb, timestamp);
    }
    pub fn num_conflict(&self) -> u64 {
        self.num_conflict
    }
    pub fn count_conflict(&mut self) {
        self.num_conflict += 1;
    }
    pub fn num_decision(&self) -> u64 {
        self.num_decision
    }
    pub fn num_propagation(&self) -> u64 {
        self.num_propagation
    }
    pub fn num_restart(&self) -> u64 {
        self.num_restart
    }
    pub fn count_restart(&mut self) {
        self.num_restart += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cdb::ClauseDB,
        types::{int2lit, CNFDescription},
    };

    fn setup(nv: usize) -> (AssignStack, VarDB, ClauseDB, Config) {
        let config = Config::default();
        let cnf = CNFDescription {
            num_of_variables: nv,
            ..CNFDescription::default()
        };
        (
            AssignStack::instantiate(&config, &cnf),
            VarDB::instantiate(&config, &cnf),
            ClauseDB::instantiate(&config, &cnf),
            config,
        )
    }

    #[test]
    fn binary_propagation_chains_through_implications() {
        let (mut asg, mut vdb, mut cdb, _c) = setup(3);
        // (¬1 ∨ 2): if 1 is true, 2 must become true.
        cdb.attach_binary(int2lit(-1), int2lit(2), false);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        let conflict = asg.propagate(&mut cdb);
        assert!(conflict.is_none());
        assert_eq!(asg.value(int2lit(2)), Some(true));
    }

    #[test]
    fn long_clause_propagates_once_only_one_literal_remains_unfalsified() {
        let (mut asg, mut vdb, mut cdb, _c) = setup(4);
        let lits = vec![int2lit(-1), int2lit(-2), int2lit(3)];
        let cid = cdb.new_clause(lits, false, 0, 0);
        let _ = cid;
        asg.assign_by_decision(&mut vdb, int2lit(1));
        assert!(asg.propagate(&mut cdb).is_none());
        asg.assign_by_decision(&mut vdb, int2lit(2));
        assert!(asg.propagate(&mut cdb).is_none());
        assert_eq!(asg.value(int2lit(3)), Some(true));
    }

    #[test]
    fn conflicting_binary_clause_is_detected() {
        let (mut asg, mut vdb, mut cdb, _c) = setup(2);
        // (¬1 ∨ ¬2): assigning both 1 and 2 true is a conflict.
        cdb.attach_binary(int2lit(-1), int2lit(-2), false);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        asg.assign_by_decision(&mut vdb, int2lit(2));
        let conflict = asg.propagate(&mut cdb);
        assert!(matches!(conflict, Some(Conflict::Binary(_, _))));
    }

    #[test]
    fn cancel_until_restores_unassigned_state_and_saves_phase() {
        let (mut asg, mut vdb, _cdb, _c) = setup(3);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        asg.assign_by_decision(&mut vdb, int2lit(-2));
        assert_eq!(asg.decision_level(), 2);
        asg.cancel_until(&mut vdb, 0);
        assert_eq!(asg.decision_level(), 0);
        assert_eq!(asg.value(int2lit(1)), None);
        assert_eq!(vdb[1].saved.get(), Some(true));
    }
}
