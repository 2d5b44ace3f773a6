//! Crate `var` provides the `Var` record and its owner `VarDB` (spec.md §3
//! Variable record). Decision level, trail position and reason link live on
//! the trail (`assign::AssignStack`), matching the teacher's split between
//! `Var` (activity/phase/flags) and `AssignStack` (level/reason/trail).
use crate::{
    config::Config,
    types::{CNFDescription, Instantiate, VarFlag, VarId},
};

/// One of `saved` / `target` / `best` phase slots (spec.md §3), each holding
/// the last, best-so-far, or best-full-assignment polarity of a variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Phase(Option<bool>);

impl Phase {
    pub fn get(self) -> Option<bool> {
        self.0
    }
    pub fn set(&mut self, b: bool) {
        self.0 = Some(b);
    }
    pub fn flip(&mut self) {
        self.0 = self.0.map(|b| !b);
    }
}

/// Per-variable state outside the trail: activity (VSIDS), a VMTF
/// timestamp, saved/target/best phases, and transient analysis flags.
#[derive(Clone, Debug)]
pub struct Var {
    pub index: VarId,
    /// VSIDS-style activity score, bumped in stable mode.
    pub activity: f64,
    /// VMTF timestamp, bumped in focused mode; higher = more recently used.
    pub timestamp: u64,
    pub saved: Phase,
    pub target: Phase,
    pub best: Phase,
    flags: VarFlag,
    /// number of occurrences in the (shared) original formula, used by
    /// vivification's literal reordering and BVE's occurrence caps.
    pub occurrences: usize,
}

impl Var {
    fn new(index: VarId) -> Var {
        Var {
            index,
            activity: 0.0,
            timestamp: 0,
            saved: Phase::default(),
            target: Phase::default(),
            best: Phase::default(),
            flags: VarFlag::empty(),
            occurrences: 0,
        }
    }
    #[inline]
    pub fn is(&self, f: VarFlag) -> bool {
        self.flags.contains(f)
    }
    #[inline]
    pub fn turn_on(&mut self, f: VarFlag) {
        self.flags.insert(f);
    }
    #[inline]
    pub fn turn_off(&mut self, f: VarFlag) {
        self.flags.remove(f);
    }
    /// The phase to decide with: `target` in stable mode if set, else
    /// `saved`, else an arbitrary default (spec.md §4.4 Phase policy).
    pub fn decide_phase(&self, stable: bool, default_positive: bool) -> bool {
        if stable {
            if let Some(b) = self.target.get() {
                return b;
            }
        }
        self.saved.get().unwrap_or(default_positive)
    }
}

/// Owns every `Var` record plus the decayed activity increment used for
/// VSIDS-style bumping (spec.md §3 Heap: "increment" rescaled alongside
/// scores once any exceeds 10^150).
#[derive(Debug)]
pub struct VarDB {
    vars: Vec<Var>,
    activity_increment: f64,
    activity_decay: f64,
    timestamp_counter: u64,
}

impl Instantiate for VarDB {
    fn instantiate(config: &Config, cnf: &CNFDescription) -> VarDB {
        let nv = cnf.num_of_variables;
        let mut vars = Vec::with_capacity(nv + 1);
        for i in 0..=nv {
            vars.push(Var::new(i));
        }
        let _ = config;
        VarDB {
            vars,
            activity_increment: 1.0,
            activity_decay: 0.95,
            timestamp_counter: 0,
        }
    }
}

const ACTIVITY_RESCALE_THRESHOLD: f64 = 1e150;

impl VarDB {
    pub fn len(&self) -> usize {
        self.vars.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vars.len() <= 1
    }
    pub fn iter(&self) -> impl Iterator<Item = &Var> {
        self.vars.iter()
    }
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Var> {
        self.vars.iter_mut()
    }
    pub fn activity(&self, vi: VarId) -> f64 {
        self.vars[vi].activity
    }
    /// VSIDS-style bump: add the current increment, rescaling everything by
    /// the maximum the moment any score exceeds the threshold (spec.md §3,
    /// §9 "Heap with external score rescaling": a single-pass divide, never
    /// a per-key update).
    pub fn bump_activity(&mut self, vi: VarId) {
        self.vars[vi].activity += self.activity_increment;
        if self.vars[vi].activity > ACTIVITY_RESCALE_THRESHOLD {
            let max = self
                .vars
                .iter()
                .map(|v| v.activity)
                .fold(0.0_f64, f64::max)
                .max(1.0);
            let inv = 1.0 / max;
            for v in &mut self.vars {
                v.activity *= inv;
            }
            self.activity_increment *= inv;
        }
    }
    pub fn decay_activity(&mut self) {
        self.activity_increment /= self.activity_decay;
    }
    /// VMTF restamp: move `vi` to the front of recency order (spec.md §4.5
    /// Bump: "sort analyzed by current trail order and bump").
    pub fn bump_timestamp(&mut self, vi: VarId) {
        self.timestamp_counter += 1;
        self.vars[vi].timestamp = self.timestamp_counter;
    }
    pub fn timestamp(&self, vi: VarId) -> u64 {
        self.vars[vi].timestamp
    }
}

impl std::ops::Index<VarId> for VarDB {
    type Output = Var;
    fn index(&self, i: VarId) -> &Var {
        &self.vars[i]
    }
}

impl std::ops::IndexMut<VarId> for VarDB {
    fn index_mut(&mut self, i: VarId) -> &mut Var {
        &mut self.vars[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_rescales_without_reordering_the_winner() {
        let config = Config::default();
        let cnf = CNFDescription {
            num_of_variables: 4,
            ..CNFDescription::default()
        };
        let mut vdb = VarDB::instantiate(&config, &cnf);
        vdb.bump_activity(1);
        vdb.bump_activity(1);
        vdb.bump_activity(2);
        assert!(vdb.activity(1) > vdb.activity(2));
        // force a rescale
        for v in vdb.iter_mut() {
            v.activity = ACTIVITY_RESCALE_THRESHOLD * 2.0;
        }
        vdb.bump_activity(1);
        assert!(vdb.activity(1) <= 1.0 + 1e-6);
        assert!(vdb.activity(1) > vdb.activity(2));
    }
}
