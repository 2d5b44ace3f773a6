//! Local-search walker (spec.md component C8, §4.8). Runs a probSAT-style
//! break-count walk over the ring's flat clause set between CDCL phases,
//! used both for rephasing (spec.md §4.6 "Walk" rephase kind) and, with
//! `--walk-initially`, as a warm-up pass before the first search.
use crate::types::{Lit, LiteralEncoding, VarId};
use rand::Rng;

/// `(average clause length, base)` anchors the break-weight table
/// interpolates between (spec.md §4.8: "base is interpolated from a fixed
/// table of (avg-length, base) anchors"), values taken from the usual
/// probSAT calibration for 3..6-SAT instances.
const BASE_TABLE: &[(f64, f64)] = &[(3.0, 2.06), (4.0, 2.85), (5.0, 3.70), (6.0, 5.10), (7.0, 7.00)];

fn interpolate_base(avg_len: f64) -> f64 {
    if avg_len <= BASE_TABLE[0].0 {
        return BASE_TABLE[0].1;
    }
    for w in BASE_TABLE.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if avg_len <= x1 {
            let t = (avg_len - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    BASE_TABLE[BASE_TABLE.len() - 1].1
}

/// A flat, ring-owned copy of the simplified formula the walker flips
/// variables over. Built once from the ruler's exported clauses and kept
/// across walker invocations so occurrence lists aren't rebuilt every call.
pub struct Walker {
    clauses: Vec<Vec<Lit>>,
    pos_occ: Vec<Vec<usize>>,
    neg_occ: Vec<Vec<usize>>,
    true_count: Vec<u32>,
    values: Vec<bool>,
    unsat: Vec<usize>,
    unsat_pos: Vec<usize>,
    base: f64,
    parity: bool,
}

const NOT_IN_UNSAT: usize = usize::MAX;

impl Walker {
    /// `long_clauses` and `binaries` come from `Ruler::export_clauses`;
    /// `num_vars` sizes the per-variable tables. `init` seeds the starting
    /// assignment (typically the ring's saved phases).
    pub fn new(num_vars: usize, long_clauses: &[Vec<Lit>], binaries: &[(Lit, Lit)], init: impl Fn(VarId) -> bool) -> Walker {
        let mut clauses: Vec<Vec<Lit>> = binaries.iter().map(|&(a, b)| vec![a, b]).collect();
        clauses.extend(long_clauses.iter().cloned());
        let mut pos_occ = vec![Vec::new(); num_vars + 1];
        let mut neg_occ = vec![Vec::new(); num_vars + 1];
        for (ci, c) in clauses.iter().enumerate() {
            for &l in c {
                if l.positive() {
                    pos_occ[l.vi()].push(ci);
                } else {
                    neg_occ[l.vi()].push(ci);
                }
            }
        }
        let mut values = vec![false; num_vars + 1];
        for vi in 1..=num_vars {
            values[vi] = init(vi);
        }
        let (true_count, unsat, unsat_pos) = Walker::recompute(&clauses, &values);
        let avg_len = if clauses.is_empty() {
            3.0
        } else {
            clauses.iter().map(|c| c.len()).sum::<usize>() as f64 / clauses.len() as f64
        };
        Walker {
            clauses,
            pos_occ,
            neg_occ,
            true_count,
            values,
            unsat,
            unsat_pos,
            base: interpolate_base(avg_len),
            parity: false,
        }
    }

    /// recompute `true_count`/`unsat`/`unsat_pos` for a given assignment
    /// from scratch, shared by construction and by `run`'s end-of-budget
    /// restore of the best assignment seen.
    fn recompute(clauses: &[Vec<Lit>], values: &[bool]) -> (Vec<u32>, Vec<usize>, Vec<usize>) {
        let mut true_count = vec![0u32; clauses.len()];
        for (ci, c) in clauses.iter().enumerate() {
            true_count[ci] = c.iter().filter(|l| l.positive() == values[l.vi()]).count() as u32;
        }
        let mut unsat = Vec::new();
        let mut unsat_pos = vec![NOT_IN_UNSAT; clauses.len()];
        for (ci, &tc) in true_count.iter().enumerate() {
            if tc == 0 {
                unsat_pos[ci] = unsat.len();
                unsat.push(ci);
            }
        }
        (true_count, unsat, unsat_pos)
    }

    pub fn num_unsat(&self) -> usize {
        self.unsat.len()
    }

    pub fn value(&self, vi: VarId) -> bool {
        self.values[vi]
    }

    fn mark(&mut self, ci: usize) {
        let was_unsat = self.unsat_pos[ci] != NOT_IN_UNSAT;
        let is_unsat = self.true_count[ci] == 0;
        if is_unsat && !was_unsat {
            self.unsat_pos[ci] = self.unsat.len();
            self.unsat.push(ci);
        } else if !is_unsat && was_unsat {
            let pos = self.unsat_pos[ci];
            let last = self.unsat.pop().unwrap();
            if pos < self.unsat.len() {
                self.unsat[pos] = last;
                self.unsat_pos[last] = pos;
            }
            self.unsat_pos[ci] = NOT_IN_UNSAT;
        }
    }

    fn break_count(&self, vi: VarId) -> usize {
        let occ = if self.values[vi] { &self.pos_occ[vi] } else { &self.neg_occ[vi] };
        occ.iter().filter(|&&ci| self.true_count[ci] == 1).count()
    }

    fn flip(&mut self, vi: VarId) {
        let old = self.values[vi];
        for &ci in &self.pos_occ[vi].clone() {
            if old {
                self.true_count[ci] -= 1;
            } else {
                self.true_count[ci] += 1;
            }
            self.mark(ci);
        }
        for &ci in &self.neg_occ[vi].clone() {
            if old {
                self.true_count[ci] += 1;
            } else {
                self.true_count[ci] -= 1;
            }
            self.mark(ci);
        }
        self.values[vi] = !old;
    }

    /// One walker step (spec.md §4.8): pick an unsatisfied clause
    /// uniformly, weight its literals by `exp(-break_count/base)`, flip
    /// the winner. `base` alternates slightly by step parity for
    /// diversification (spec.md: "the walker's parity").
    pub fn step(&mut self, rng: &mut impl Rng) {
        if self.unsat.is_empty() {
            return;
        }
        self.parity = !self.parity;
        let effective_base = if self.parity { self.base } else { self.base * 1.15 };
        let ci = self.unsat[rng.gen_range(0..self.unsat.len())];
        let lits = self.clauses[ci].clone();
        let weights: Vec<f64> = lits.iter().map(|l| (-(self.break_count(l.vi()) as f64) / effective_base).exp()).collect();
        let total: f64 = weights.iter().sum();
        let mut pick = rng.gen_range(0.0..total.max(f64::MIN_POSITIVE));
        let mut chosen = lits[lits.len() - 1].vi();
        for (l, w) in lits.iter().zip(weights.iter()) {
            if pick < *w {
                chosen = l.vi();
                break;
            }
            pick -= w;
        }
        self.flip(chosen);
    }

    /// Run up to `budget` flips, tracking the best (lowest-unsat) assignment
    /// seen along the way; on return `self.value` reflects that best
    /// assignment rather than wherever the walk happened to end up (spec.md
    /// §4.8: "tracks minimum unsatisfied count; when improved, saves the
    /// current polarities; on exit writes saved phases back").
    pub fn run(&mut self, rng: &mut impl Rng, budget: u64) -> usize {
        let mut best = self.unsat.len();
        let mut best_values = self.values.clone();
        for _ in 0..budget {
            if self.unsat.is_empty() {
                break;
            }
            self.step(rng);
            if self.unsat.len() < best {
                best = self.unsat.len();
                best_values.copy_from_slice(&self.values);
            }
        }
        self.values = best_values;
        let (true_count, unsat, unsat_pos) = Walker::recompute(&self.clauses, &self.values);
        self.true_count = true_count;
        self.unsat = unsat;
        self.unsat_pos = unsat_pos;
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::int2lit;
    use rand::SeedableRng;

    #[test]
    fn a_trivially_satisfiable_clause_set_reaches_zero_unsat() {
        let clauses = vec![vec![int2lit(1), int2lit(2)], vec![int2lit(-1), int2lit(2)]];
        let mut walker = Walker::new(2, &clauses, &[], |_| false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let best = walker.run(&mut rng, 200);
        assert_eq!(best, 0);
    }

    #[test]
    fn run_restores_the_best_seen_assignment_not_the_final_one() {
        // unsatisfiable over 2 vars: every assignment violates exactly one
        // of these three clauses, so the walk never reaches zero and keeps
        // wandering for the whole budget; `run` must hand back whichever
        // assignment had the fewest violations along the way.
        let clauses = vec![
            vec![int2lit(1), int2lit(2)],
            vec![int2lit(-1), int2lit(-2)],
            vec![int2lit(1), int2lit(-2)],
        ];
        let mut walker = Walker::new(2, &clauses, &[], |_| false);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let best = walker.run(&mut rng, 50);
        let recomputed_unsat = clauses
            .iter()
            .filter(|c| !c.iter().any(|&l| l.positive() == walker.value(l.vi())))
            .count();
        // `num_unsat`/`true_count` bookkeeping must be resynced to the
        // *restored* assignment, not left over from wherever the budget
        // happened to end.
        assert_eq!(walker.num_unsat(), recomputed_unsat);
        assert_eq!(walker.num_unsat(), best);
    }

    #[test]
    fn interpolation_clamps_outside_the_table_range() {
        assert_eq!(interpolate_base(1.0), BASE_TABLE[0].1);
        assert_eq!(interpolate_base(100.0), BASE_TABLE[BASE_TABLE.len() - 1].1);
    }
}
