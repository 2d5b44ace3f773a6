//! Crate `cdb`: the clause store (spec.md component C1). Owns the slab of
//! long (3+ literal) clauses and the per-literal watch lists binaries and
//! long clauses share. Binary clauses are never allocated here; they live
//! purely as tagged values inside watch lists (`cdb::watch`).
//!
//! A `ClauseDB` is ring-private: each worker clones the ruler's simplified
//! clause set into its own slab at spawn time (spec.md §3 Ownership), so
//! nothing here needs cross-thread synchronization. Cross-ring sharing of
//! learnt clauses happens one layer up, at the mailbox (`crate::mailbox`),
//! which moves a clause's literals as an immutable snapshot rather than
//! reaching into another ring's `ClauseDB`.
pub mod clause;
pub mod watch;

pub use clause::Clause;
pub use watch::{Watch, WatchListIF};

use crate::{
    config::Config,
    types::{ClauseFlag, ClauseId, CNFDescription, Export, Instantiate, Lit, LiteralEncoding, NULL_CLAUSE},
};

/// Running counters exported to the progress line (spec.md §3 Statistics).
#[derive(Clone, Copy, Debug, Default)]
pub struct ClauseDBStats {
    pub num_original: usize,
    pub num_learnt: usize,
    pub num_binary_learnt: usize,
    pub num_reduced: usize,
}

/// API other modules (the propagator, conflict analysis, the reducer) use
/// against a clause store, mirroring the teacher's `ClauseDBIF`.
pub trait ClauseDBIF {
    fn watcher_list_mut(&mut self, l: Lit) -> &mut Vec<Watch>;
    fn watcher_lists(&self) -> &[Vec<Watch>];
    fn clause(&self, cid: ClauseId) -> &Clause;
    fn clause_mut(&mut self, cid: ClauseId) -> &mut Clause;
    fn new_clause(&mut self, lits: Vec<Lit>, redundant: bool, glue: usize, origin_ring: u8) -> ClauseId;
    fn detach(&mut self, cid: ClauseId);
    fn num_clause(&self) -> usize;
    fn bump_activity(&mut self, cid: ClauseId, decay: f64);
    /// drop the worst half of removable learnt clauses (spec.md §4.6 Reduce).
    fn reduce(&mut self);
    /// register a binary clause `(a ∨ b)` into both literals' watch lists.
    /// Binary clauses are never detached individually; they die only when
    /// the ruler rebuilds the watch lists from scratch after elimination.
    fn attach_binary(&mut self, a: Lit, b: Lit, redundant: bool);
    /// every non-garbage long-clause id currently live, for passes (e.g.
    /// vivification) that need to walk the whole store rather than react
    /// to a single watch hit.
    fn live_clause_ids(&self) -> Vec<ClauseId>;
}

/// `watch_lists[i]` is examined exactly when literal `i` is pushed onto the
/// trail (i.e. becomes true); a clause watching literal `L` therefore
/// registers at `negate(L)`, the literal whose assignment falsifies `L`.
#[inline]
fn registration_index(watched: Lit) -> usize {
    watched.negate() as usize
}

pub struct ClauseDB {
    clauses: Vec<Clause>,
    free_list: Vec<ClauseId>,
    watch_lists: Vec<Vec<Watch>>,
    num_original: usize,
    num_learnt: usize,
    next_stable_id: u64,
    activity_increment: f64,
    without_reduce: bool,
}

const ACTIVITY_RESCALE_THRESHOLD: f64 = 1e150;

impl Instantiate for ClauseDB {
    fn instantiate(config: &Config, cnf: &CNFDescription) -> ClauseDB {
        let nv = cnf.num_of_variables;
        ClauseDB {
            clauses: vec![Clause::new(Vec::new(), false, 0, 0, 0)], // slot 0 == NULL_CLAUSE
            free_list: Vec::new(),
            watch_lists: vec![Vec::new(); 2 * (nv + 1)],
            num_original: 0,
            num_learnt: 0,
            next_stable_id: 1,
            activity_increment: 1.0,
            without_reduce: config.without_reduce,
        }
    }
}

impl ClauseDB {
    /// grow the watch lists after the variable count changes (new variables
    /// can never be introduced after parsing, but the ruler may shrink and
    /// then remap the set, so this stays available for re-sizing on reload).
    pub fn reserve_vars(&mut self, nv: usize) {
        let want = 2 * (nv + 1);
        if self.watch_lists.len() < want {
            self.watch_lists.resize_with(want, Vec::new);
        }
    }

    fn alloc_slot(&mut self, clause: Clause) -> ClauseId {
        if let Some(cid) = self.free_list.pop() {
            self.clauses[cid] = clause;
            cid
        } else {
            self.clauses.push(clause);
            self.clauses.len() - 1
        }
    }

    /// register the two watched literals (always positions 0 and 1 of the
    /// clause) into the lists triggered when each is falsified.
    fn attach(&mut self, cid: ClauseId) {
        let (l0, l1) = {
            let c = &self.clauses[cid];
            (c.lits[0], c.lits[1])
        };
        self.watch_lists[registration_index(l0)].register_long(cid, l1);
        self.watch_lists[registration_index(l1)].register_long(cid, l0);
    }
}

impl ClauseDBIF for ClauseDB {
    fn watcher_list_mut(&mut self, l: Lit) -> &mut Vec<Watch> {
        &mut self.watch_lists[l as usize]
    }
    fn watcher_lists(&self) -> &[Vec<Watch>] {
        &self.watch_lists
    }
    fn clause(&self, cid: ClauseId) -> &Clause {
        &self.clauses[cid]
    }
    fn clause_mut(&mut self, cid: ClauseId) -> &mut Clause {
        &mut self.clauses[cid]
    }
    fn new_clause(&mut self, lits: Vec<Lit>, redundant: bool, glue: usize, origin_ring: u8) -> ClauseId {
        debug_assert!(lits.len() >= 2, "binary and unit clauses never enter the clause store");
        let id = self.next_stable_id;
        self.next_stable_id += 1;
        let clause = Clause::new(lits, redundant, glue, id, origin_ring);
        let cid = self.alloc_slot(clause);
        self.attach(cid);
        if redundant {
            self.num_learnt += 1;
        } else {
            self.num_original += 1;
        }
        cid
    }
    fn detach(&mut self, cid: ClauseId) {
        debug_assert_ne!(cid, NULL_CLAUSE);
        let (l0, l1, redundant) = {
            let c = &self.clauses[cid];
            (c.lits[0], c.lits[1], c.is(ClauseFlag::REDUNDANT))
        };
        self.watch_lists[registration_index(l0)].detach_with(cid);
        self.watch_lists[registration_index(l1)].detach_with(cid);
        self.clauses[cid].turn_on(ClauseFlag::GARBAGE);
        self.clauses[cid].lits.clear();
        self.free_list.push(cid);
        if redundant {
            self.num_learnt -= 1;
        } else {
            self.num_original -= 1;
        }
    }
    fn num_clause(&self) -> usize {
        self.num_original + self.num_learnt
    }
    fn bump_activity(&mut self, cid: ClauseId, decay: f64) {
        let c = &mut self.clauses[cid];
        c.activity += self.activity_increment;
        if c.activity > ACTIVITY_RESCALE_THRESHOLD {
            for c in self.clauses.iter_mut() {
                c.activity *= 1.0 / ACTIVITY_RESCALE_THRESHOLD;
            }
            self.activity_increment *= 1.0 / ACTIVITY_RESCALE_THRESHOLD;
        }
        self.activity_increment /= decay;
    }
    fn reduce(&mut self) {
        if self.without_reduce {
            return;
        }
        let mut candidates: Vec<ClauseId> = (1..self.clauses.len())
            .filter(|&cid| !self.clauses[cid].is(ClauseFlag::GARBAGE) && self.clauses[cid].removable())
            .collect();
        // worst first: high glue, low activity dies before low glue, high activity.
        candidates.sort_by(|&a, &b| {
            let ca = &self.clauses[a];
            let cb = &self.clauses[b];
            cb.glue
                .cmp(&ca.glue)
                .then(ca.activity.partial_cmp(&cb.activity).unwrap())
        });
        let drop_count = candidates.len() / 2;
        for &cid in candidates.iter().take(drop_count) {
            self.detach(cid);
        }
        for c in self.clauses.iter_mut() {
            c.turn_off(ClauseFlag::USED);
        }
    }
    fn attach_binary(&mut self, a: Lit, b: Lit, redundant: bool) {
        self.watch_lists[registration_index(a)].register_binary(redundant, b);
        self.watch_lists[registration_index(b)].register_binary(redundant, a);
    }
    fn live_clause_ids(&self) -> Vec<ClauseId> {
        (1..self.clauses.len()).filter(|&cid| !self.clauses[cid].is(ClauseFlag::GARBAGE)).collect()
    }
}

impl Export<ClauseDBStats> for ClauseDB {
    fn exports(&self) -> ClauseDBStats {
        let num_binary_learnt = self
            .watch_lists
            .iter()
            .flatten()
            .filter(|w| matches!(w, Watch::Binary { redundant: true, .. }))
            .count()
            / 2;
        ClauseDBStats {
            num_original: self.num_original,
            num_learnt: self.num_learnt,
            num_binary_learnt,
            num_reduced: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cnf(nv: usize) -> CNFDescription {
        CNFDescription {
            num_of_variables: nv,
            num_of_clauses: 0,
            pathname: String::new(),
        }
    }

    #[test]
    fn new_clause_registers_two_watchers() {
        let config = Config::default();
        let mut cdb = ClauseDB::instantiate(&config, &cnf(5));
        let lits = vec![crate::types::int2lit(1), crate::types::int2lit(2), crate::types::int2lit(3)];
        let cid = cdb.new_clause(lits, false, 0, 0);
        assert_eq!(cdb.num_clause(), 1);
        let l0 = cdb.clause(cid).lits[0];
        let l1 = cdb.clause(cid).lits[1];
        assert!(cdb.watcher_lists()[l0.negate() as usize]
            .iter()
            .any(|w| w.clause_id() == Some(cid)));
        assert!(cdb.watcher_lists()[l1.negate() as usize]
            .iter()
            .any(|w| w.clause_id() == Some(cid)));
    }

    #[test]
    fn attach_binary_registers_symmetric_watchers() {
        let config = Config::default();
        let mut cdb = ClauseDB::instantiate(&config, &cnf(3));
        let a = crate::types::int2lit(-1);
        let b = crate::types::int2lit(2);
        cdb.attach_binary(a, b, false);
        assert!(cdb.watcher_lists()[a.negate() as usize]
            .iter()
            .any(|w| matches!(w, Watch::Binary { other, .. } if *other == b)));
        assert!(cdb.watcher_lists()[b.negate() as usize]
            .iter()
            .any(|w| matches!(w, Watch::Binary { other, .. } if *other == a)));
    }

    #[test]
    fn detach_removes_both_watchers_and_recycles_the_slot() {
        let config = Config::default();
        let mut cdb = ClauseDB::instantiate(&config, &cnf(5));
        let lits = vec![crate::types::int2lit(1), crate::types::int2lit(2), crate::types::int2lit(3)];
        let cid = cdb.new_clause(lits, true, 2, 0);
        cdb.detach(cid);
        assert_eq!(cdb.num_clause(), 0);
        let new_lits = vec![crate::types::int2lit(4), crate::types::int2lit(5), crate::types::int2lit(1)];
        let reused = cdb.new_clause(new_lits, false, 0, 0);
        assert_eq!(reused, cid, "freed slots are recycled");
    }

    #[test]
    fn reduce_keeps_protected_and_recently_used_clauses() {
        let config = Config::default();
        let mut cdb = ClauseDB::instantiate(&config, &cnf(16));
        let mut kept = None;
        for i in 0..10i32 {
            let lits = vec![
                crate::types::int2lit(1 + i),
                crate::types::int2lit(2 + i),
                crate::types::int2lit(3 + i),
            ];
            let cid = cdb.new_clause(lits, true, 10, 0);
            if i == 0 {
                cdb.clause_mut(cid).turn_on(ClauseFlag::PROTECTED);
                kept = Some(cid);
            }
        }
        cdb.reduce();
        assert!(!cdb.clause(kept.unwrap()).is(ClauseFlag::GARBAGE));
    }
}
