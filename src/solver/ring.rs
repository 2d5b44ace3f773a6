//! One worker ring's main loop (spec.md component C9, §4.9). A ring owns
//! its private `AssignStack`/`VarDB`/`ClauseDB`, cloned from the ruler's
//! simplified problem at spawn time, and drives the pseudocode spec.md
//! §4.9 lays out: propagate, analyze conflicts, or otherwise restart,
//! reduce, switch mode, rephase, probe, rendezvous to simplify, import a
//! shared clause, or decide.
use crate::{
    assign::{AssignReason, AssignStack},
    barrier::{Barriers, Termination},
    cdb::{ClauseDB, ClauseDBIF},
    config::Config,
    mailbox::{Imported, Mailbox},
    ruler::Ruler,
    solver::{conflict, probe, restart::RestartController, vivify, walker::Walker},
    types::{var2lit, Certificate, Instantiate, Lit, LiteralEncoding, SolverError, VarId},
    var::VarDB,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

/// `(rank, tiebreak)` for choosing which two literals of an imported clause
/// to watch: true literals rank above unassigned ones, which rank above
/// false ones; within a rank, a true literal prefers the lowest decision
/// level (most likely to stay true) and a false literal prefers the
/// highest (soonest to become unassigned again on backtrack). Mirrors
/// gimsatul's `find_literal_to_watch` (`import.c`).
fn import_watch_rank(asg: &AssignStack, l: Lit) -> (i32, i64) {
    match asg.value(l) {
        Some(true) => (2, -(asg.level(l.vi()) as i64)),
        None => (1, 0),
        Some(false) => (0, asg.level(l.vi()) as i64),
    }
}

/// pick the best two literals of an imported clause (or binary pair) to
/// watch, best-ranked first.
fn pick_import_watches(asg: &AssignStack, lits: &[Lit]) -> (Lit, Lit) {
    let mut best = 0;
    for i in 1..lits.len() {
        if import_watch_rank(asg, lits[i]) > import_watch_rank(asg, lits[best]) {
            best = i;
        }
    }
    let mut second = if best == 0 { 1 } else { 0 };
    for i in 0..lits.len() {
        if i == best {
            continue;
        }
        if import_watch_rank(asg, lits[i]) > import_watch_rank(asg, lits[second]) {
            second = i;
        }
    }
    (lits[best], lits[second])
}

/// reorder `lits` so `lit` and `other` land at positions 0 and 1 (the two
/// watched slots `ClauseDB::attach` always uses).
fn reorder_for_watches(lits: &mut [Lit], lit: Lit, other: Lit) {
    let p0 = lits.iter().position(|&l| l == lit).unwrap();
    lits.swap(0, p0);
    let p1 = lits.iter().position(|&l| l == other).unwrap();
    lits.swap(1, p1);
}

/// having picked `lit` (best watch) and `other` (second-best), decide
/// whether attaching the clause now would leave both watches already
/// falsified (or about to be, on the very next propagation pass) and, if
/// so, which literal's trail position the importing ring's propagation
/// cursor must rewind to so it notices the new watch. Mirrors gimsatul's
/// `import_binary`/`import_large_clause` decision tree (`import.c`).
fn import_repropagate_target(asg: &AssignStack, lit: Lit, other: Lit) -> Option<Lit> {
    if asg.value(other) != Some(false) {
        return None;
    }
    if asg.value(lit) == Some(true) && asg.level(lit.vi()) <= asg.level(other.vi()) {
        return None;
    }
    if asg.value(lit) == Some(false) {
        let lit_level = asg.level(lit.vi());
        let other_level = asg.level(other.vi());
        if lit_level == other_level && asg.trail_pos(lit.vi()) > asg.trail_pos(other.vi()) {
            return Some(lit);
        }
    }
    Some(other)
}

pub struct Ring {
    id: usize,
    asg: AssignStack,
    vdb: VarDB,
    cdb: ClauseDB,
    restart: RestartController,
    probe_cursor: VarId,
    next_probe: u64,
    next_simplify: u64,
    units_imported: usize,
    walked_initially: bool,
    conflict_tick: u64,
    ruler: Arc<Ruler>,
    mailbox: Arc<Mailbox>,
    barriers: Arc<Barriers>,
    term: Arc<Termination>,
    config: Config,
    rng: StdRng,
}

impl Ring {
    pub fn new(id: usize, config: Config, ruler: Arc<Ruler>, mailbox: Arc<Mailbox>, barriers: Arc<Barriers>, term: Arc<Termination>) -> Ring {
        let cnf = ruler.cnf_description(&config.cnf_filename.display().to_string());
        let asg = AssignStack::instantiate(&config, &cnf);
        let vdb = VarDB::instantiate(&config, &cnf);
        let mut cdb = ClauseDB::instantiate(&config, &cnf);
        let (long, binaries) = ruler.export_clauses();
        for (a, b) in binaries {
            cdb.attach_binary(a, b, false);
        }
        for lits in long {
            cdb.new_clause(lits, false, 0, 0);
        }
        Ring {
            id,
            asg,
            vdb,
            cdb,
            restart: RestartController::new(&config),
            probe_cursor: 0,
            next_probe: 3000,
            next_simplify: 5000,
            units_imported: 0,
            walked_initially: false,
            conflict_tick: 0,
            ruler,
            mailbox,
            barriers,
            term,
            config,
            rng: StdRng::seed_from_u64(id as u64 + 1),
        }
    }

    /// Run to completion and report this ring's final statistics
    /// alongside its verdict. `Some(certificate)` only from the ring that
    /// actually claims the winner slot; every other ring (including one
    /// that ran out of conflict budget or observed `term` set by another
    /// ring) reports `None`.
    pub fn run_to_completion(mut self) -> (Option<Certificate>, crate::state::RingStats) {
        let verdict = self.run();
        let stats = self.stats();
        (verdict, stats)
    }

    fn run(&mut self) -> Option<Certificate> {
        if self.import_root_units_blocking().is_err() {
            return self.conclude_unsat();
        }
        loop {
            if self.term.is_terminated() {
                return None;
            }
            match self.asg.propagate(&mut self.cdb) {
                Some(conflict) => {
                    self.asg.count_conflict();
                    if self.asg.decision_level() == self.asg.root_level() {
                        return self.conclude_unsat();
                    }
                    self.conflict_tick += 1;
                    let analysis = conflict::analyze(&mut self.asg, &mut self.vdb, &mut self.cdb, conflict, self.conflict_tick);
                    self.ruler.drat_add(&analysis.learnt);
                    self.restart.update_emas(analysis.glue, self.asg.trail().len());
                    self.asg.cancel_until(&mut self.vdb, analysis.backjump_level);
                    let uip = analysis.learnt[0];
                    match analysis.learnt.len() {
                        1 => {
                            if self.asg.assign_at_rootlevel(uip).is_err() {
                                return self.conclude_unsat();
                            }
                        }
                        2 => {
                            self.cdb.attach_binary(analysis.learnt[0], analysis.learnt[1], true);
                            self.asg
                                .assign_by_implication(uip, AssignReason::Binary(analysis.learnt[1]), analysis.backjump_level);
                        }
                        _ => {
                            let cid = self.cdb.new_clause(analysis.learnt.clone(), true, analysis.glue as usize, self.id as u8);
                            self.asg.assign_by_implication(uip, AssignReason::Long(cid), analysis.backjump_level);
                        }
                    }
                    if !self.config.no_share {
                        conflict::share_learnt(&self.mailbox, self.id, &analysis.learnt, analysis.glue);
                    }
                }
                None => {
                    if self.asg.num_assigns() == self.asg.num_vars() {
                        return self.conclude_sat();
                    }
                    if self.config.conflict_limit > 0 && self.asg.num_conflict() >= self.config.conflict_limit {
                        return None;
                    }
                    if self.config.walk_initially && !self.walked_initially {
                        self.walked_initially = true;
                        self.local_search();
                        continue;
                    }
                    if self.restart.should_reduce(self.asg.num_conflict()) {
                        if self.run_vivify_pass().is_err() {
                            return self.conclude_unsat();
                        }
                        self.restart.reduce(&mut self.cdb);
                        continue;
                    }
                    if self.restart.should_restart() {
                        self.asg.cancel_until(&mut self.vdb, self.asg.root_level());
                        self.asg.count_restart();
                        continue;
                    }
                    if self.restart.should_switch_mode(self.asg.num_conflict()) {
                        self.asg.stable = self.restart.stable;
                        self.asg.rebuild_heap(&self.vdb);
                        continue;
                    }
                    if self.restart.should_rephase(self.asg.num_conflict()) {
                        if self.restart.is_walk_phase() && !self.config.no_walk {
                            self.local_search();
                        } else {
                            self.restart.rephase(&self.asg, &mut self.vdb);
                        }
                        continue;
                    }
                    if self.asg.is_root_level() && !self.config.no_simplify {
                        if self.probe_due() {
                            let mut cursor = self.probe_cursor;
                            let result = probe::probe_round(&mut self.asg, &mut self.vdb, &mut self.cdb, &mut cursor, 64);
                            self.probe_cursor = cursor;
                            if result.is_err() {
                                return self.conclude_unsat();
                            }
                            continue;
                        }
                        if self.simplify_due() {
                            match self.simplify_ring() {
                                Ok(true) => continue,
                                Ok(false) => return None,
                                Err(_) => return self.conclude_unsat(),
                            }
                        }
                    }
                    if !self.import_shared() {
                        if let Some(lit) = self.asg.select_decision_literal(&mut self.vdb) {
                            self.asg.assign_by_decision(&mut self.vdb, lit);
                        }
                    }
                }
            }
        }
    }

    fn conclude_unsat(&mut self) -> Option<Certificate> {
        self.ruler.drat_add_empty();
        if self.term.claim_winner() {
            self.barriers.disable_and_abort_all();
            Some(Certificate::UNSAT)
        } else {
            None
        }
    }

    fn conclude_sat(&mut self) -> Option<Certificate> {
        if self.term.claim_winner() {
            self.barriers.disable_and_abort_all();
            Some(self.build_model())
        } else {
            None
        }
    }

    fn build_model(&self) -> Certificate {
        // `self.asg`'s variable ids are this ring's current (possibly
        // compacted) space; `witness_extend`'s extension stack and the
        // final reported model are both in original DIMACS space, so
        // every ring-local value is scattered through `unmap_var` before
        // handing the array off.
        let nv_original = self.ruler.num_vars_original;
        let mut model: Vec<Option<bool>> = vec![None; nv_original + 1];
        let nv = self.asg.num_vars();
        for vi in 1..=nv {
            let original = self.ruler.unmap_var(vi);
            model[original] = self.asg.value(var2lit(vi, true));
        }
        self.ruler.witness_extend(&mut model);
        let lits = (1..=nv_original)
            .map(|vi| if model[vi].unwrap_or(true) { vi as i32 } else { -(vi as i32) })
            .collect();
        Certificate::SAT(lits)
    }

    fn probe_due(&mut self) -> bool {
        if self.asg.num_conflict() >= self.next_probe {
            self.next_probe = self.asg.num_conflict() + 3000;
            true
        } else {
            false
        }
    }

    fn simplify_due(&mut self) -> bool {
        if self.asg.num_conflict() >= self.next_simplify {
            self.next_simplify = self.asg.num_conflict() + 5000;
            true
        } else {
            false
        }
    }

    /// The simplify rendezvous sequence (spec.md §4.12): agree to
    /// simplify, surrender clause ownership, let one ring run the ruler's
    /// inprocessing, everyone rebuilds their `ClauseDB` from the result,
    /// then resume. Returns `Ok(false)` if a barrier was aborted mid-way
    /// (another ring already concluded) rather than an error of this
    /// ring's own making.
    fn simplify_ring(&mut self) -> Result<bool, SolverError> {
        if !self.barriers.start.wait() {
            return Ok(false);
        }
        if !self.barriers.unclone.wait() {
            return Ok(false);
        }
        if self.id == 0 {
            if let Err(e) = self.ruler.simplify_round(&self.config) {
                self.barriers.disable_and_abort_all();
                return Err(e);
            }
        }
        if !self.barriers.run.wait() {
            return Ok(false);
        }
        let (long, binaries) = self.ruler.export_clauses();
        self.rebuild_local_state(&long, &binaries);
        if !self.barriers.copy.wait() {
            return Ok(false);
        }
        if self.import_root_units_blocking().is_err() {
            self.barriers.disable_and_abort_all();
            return Err(SolverError::Inconsistent);
        }
        if !self.barriers.end.wait() {
            return Ok(false);
        }
        Ok(true)
    }

    /// Rebuild this ring's private clause database and, since
    /// simplification's compaction step may have renumbered variables,
    /// its assignment stack and decision heuristics too (spec.md §4.11
    /// step 7). This only ever runs at root level -- the simplify
    /// rendezvous is reached only when `asg.is_root_level()` -- so the
    /// only state a fresh `AssignStack`/`VarDB` loses is heuristic warm
    /// state (VSIDS activity, VMTF timestamps, saved phases); the root
    /// assignments themselves are recovered right after by re-importing
    /// every unit the ruler has queued (`import_root_units_blocking`,
    /// called next in `simplify_ring`).
    fn rebuild_local_state(&mut self, long: &[Vec<Lit>], binaries: &[(Lit, Lit)]) {
        let cnf = self.ruler.cnf_description(&self.config.cnf_filename.display().to_string());
        self.asg = AssignStack::instantiate(&self.config, &cnf);
        self.vdb = VarDB::instantiate(&self.config, &cnf);
        self.probe_cursor = 0;
        let mut cdb = ClauseDB::instantiate(&self.config, &cnf);
        for &(a, b) in binaries {
            cdb.attach_binary(a, b, false);
        }
        for lits in long {
            cdb.new_clause(lits.clone(), false, 0, 0);
        }
        self.cdb = cdb;
        self.units_imported = 0;
    }

    fn import_root_units_blocking(&mut self) -> Result<(), SolverError> {
        for l in self.ruler.units_since(self.units_imported) {
            self.asg.assign_at_rootlevel(l)?;
        }
        self.units_imported = self.ruler.num_units();
        if self.asg.propagate(&mut self.cdb).is_some() {
            return Err(SolverError::Inconsistent);
        }
        Ok(())
    }

    /// Import a clause from another ring's mailbox (spec.md §4.10 Import).
    /// The clause's watches are chosen from the importing ring's current
    /// assignment rather than taken as given, and if both chosen watches
    /// would already be falsified, the propagation cursor is rewound so
    /// `propagate` notices the new watch on its next pass instead of
    /// silently leaving the two-watch invariant broken until some later,
    /// unrelated backtrack happens to touch it.
    fn import_shared(&mut self) -> bool {
        if self.config.no_share {
            return false;
        }
        match self.mailbox.import(self.id, &mut self.rng) {
            Some(Imported::Binary(word)) => {
                let (redundant, a, b) = crate::cdb::watch::untag_binary(word);
                let (lit, other) = pick_import_watches(&self.asg, &[a, b]);
                if let Some(target) = import_repropagate_target(&self.asg, lit, other) {
                    self.asg.force_repropagate(target);
                }
                self.cdb.attach_binary(lit, other, redundant);
                true
            }
            Some(Imported::Large(shared)) => {
                let mut lits = shared.lits.clone();
                let (lit, other) = pick_import_watches(&self.asg, &lits);
                if let Some(target) = import_repropagate_target(&self.asg, lit, other) {
                    self.asg.force_repropagate(target);
                }
                reorder_for_watches(&mut lits, lit, other);
                self.cdb.new_clause(lits, true, shared.glue as usize, shared.origin_ring);
                true
            }
            None => false,
        }
    }

    /// One walker pass (spec.md §4.8), used both for `--walk-initially`
    /// and the restart controller's "walk" rephase kind.
    fn local_search(&mut self) {
        let (long, binaries) = self.ruler.export_clauses();
        let nv = self.asg.num_vars();
        if nv == 0 {
            return;
        }
        let vdb = &self.vdb;
        let mut walker = Walker::new(nv, &long, &binaries, |vi| vdb[vi].saved.get().unwrap_or(true));
        let budget = (0.02 * self.asg.num_propagation() as f64) as u64 + 1000;
        walker.run(&mut self.rng, budget);
        for vi in 1..=nv {
            self.vdb[vi].saved.set(walker.value(vi));
        }
    }

    /// A snapshot of this ring's running counters (spec.md §3
    /// Statistics), for the CLI's progress/summary output.
    pub fn stats(&self) -> crate::state::RingStats {
        crate::state::RingStats::collect(self.id, &self.asg, &self.cdb)
    }

    fn run_vivify_pass(&mut self) -> Result<(), SolverError> {
        if self.config.without_reduce {
            return Ok(());
        }
        let candidates = self.cdb.live_clause_ids();
        vivify::vivify_round(&mut self.asg, &mut self.vdb, &mut self.cdb, self.id as u8, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assign::Conflict, cdb::ClauseDB, config::Config, types::int2lit, var::VarDB};

    fn setup(nv: usize) -> (AssignStack, VarDB, ClauseDB) {
        let config = Config::default();
        let cnf = crate::types::CNFDescription {
            num_of_variables: nv,
            ..crate::types::CNFDescription::default()
        };
        (
            AssignStack::instantiate(&config, &cnf),
            VarDB::instantiate(&config, &cnf),
            ClauseDB::instantiate(&config, &cnf),
        )
    }

    #[test]
    fn pick_import_watches_prefers_unassigned_literals() {
        let (mut asg, mut vdb, _cdb) = setup(3);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        // lit 1 is true, lit -1 is false, lit 2 and 3 unassigned.
        let lits = vec![int2lit(-1), int2lit(2), int2lit(3)];
        let (w0, w1) = pick_import_watches(&asg, &lits);
        assert_ne!(w0, int2lit(-1));
        assert_ne!(w1, int2lit(-1));
    }

    #[test]
    fn import_repropagate_target_is_none_when_a_watch_is_safe() {
        let (mut asg, mut vdb, _cdb) = setup(2);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        // other (2) is unassigned, so nothing needs to repropagate.
        assert_eq!(import_repropagate_target(&asg, int2lit(-1), int2lit(2)), None);
    }

    #[test]
    fn importing_a_clause_already_falsified_at_both_watches_is_caught_on_the_next_propagation() {
        // Two independent decisions each falsify one literal of the binary
        // clause (-1 v -2) we're about to import; attaching it naively
        // (always watching the literals as given, no cursor rewind) would
        // leave the two-watch invariant broken until some unrelated
        // backtrack happened to touch it, silently hiding the conflict.
        let (mut asg, mut vdb, mut cdb) = setup(2);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        assert!(asg.propagate(&mut cdb).is_none());
        asg.assign_by_decision(&mut vdb, int2lit(2));
        assert!(asg.propagate(&mut cdb).is_none());

        let a = int2lit(-1);
        let b = int2lit(-2);
        let (lit, other) = pick_import_watches(&asg, &[a, b]);
        if let Some(target) = import_repropagate_target(&asg, lit, other) {
            asg.force_repropagate(target);
        }
        cdb.attach_binary(lit, other, true);

        let conflict = asg.propagate(&mut cdb);
        assert!(matches!(conflict, Some(Conflict::Binary(_, _))), "imported clause must be recognized as violated, not silently lost: {:?}", conflict);
    }

    #[test]
    fn reorder_for_watches_places_chosen_literals_at_the_front() {
        let mut lits = vec![int2lit(1), int2lit(2), int2lit(3), int2lit(4)];
        reorder_for_watches(&mut lits, int2lit(3), int2lit(1));
        assert_eq!(lits[0], int2lit(3));
        assert_eq!(lits[1], int2lit(1));
        assert_eq!(lits.iter().collect::<std::collections::HashSet<_>>().len(), 4);
    }
}
