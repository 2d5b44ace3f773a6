//! Crate `state`: per-ring running statistics and the human-readable
//! progress line the CLI prints on a timer (spec.md §1's "logging
//! formatting" is explicitly an external collaborator; this module only
//! gathers the numbers and renders one line, the way the teacher's
//! `src/state.rs` does).
use crate::{
    assign::AssignStack,
    cdb::{ClauseDB, ClauseDBStats},
    types::Export,
};

/// A snapshot of one ring's running counters, gathered from its
/// `AssignStack` and `ClauseDB` (spec.md §3 Statistics).
#[derive(Clone, Copy, Debug, Default)]
pub struct RingStats {
    pub ring_id: usize,
    pub num_conflict: u64,
    pub num_decision: u64,
    pub num_propagation: u64,
    pub num_restart: u64,
    pub clauses: ClauseDBStats,
}

impl RingStats {
    pub fn collect(ring_id: usize, asg: &AssignStack, cdb: &ClauseDB) -> RingStats {
        RingStats {
            ring_id,
            num_conflict: asg.num_conflict(),
            num_decision: asg.num_decision(),
            num_propagation: asg.num_propagation(),
            num_restart: asg.num_restart(),
            clauses: cdb.exports(),
        }
    }

    pub fn header() -> &'static str {
        "c  ring  conflicts   decisions propagations restarts   learnt   binary  reduced"
    }

    /// One `c`-prefixed progress line matching `header()`'s columns.
    pub fn render(&self) -> String {
        format!(
            "c {:>5} {:>10} {:>11} {:>12} {:>8} {:>8} {:>8} {:>8}",
            self.ring_id,
            self.num_conflict,
            self.num_decision,
            self.num_propagation,
            self.num_restart,
            self.clauses.num_learnt,
            self.clauses.num_binary_learnt,
            self.clauses.num_reduced,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, types::CNFDescription, types::Instantiate};

    #[test]
    fn a_fresh_ring_renders_an_all_zero_line() {
        let config = Config::default();
        let cnf = CNFDescription {
            num_of_variables: 3,
            ..CNFDescription::default()
        };
        let asg = AssignStack::instantiate(&config, &cnf);
        let cdb = ClauseDB::instantiate(&config, &cnf);
        let stats = RingStats::collect(0, &asg, &cdb);
        let line = stats.render();
        assert!(line.starts_with("c"));
        assert_eq!(stats.num_conflict, 0);
    }
}
