//! First-UIP conflict analysis (spec.md component C5, §4.5). Grounded in the
//! deleted predecessor of this file's resolution/minimization shape (an
//! older `splr` conflict analyzer kept only long enough to study before this
//! rewrite) and in the teacher's general analysis-then-backjump structure,
//! retargeted at this crate's `AssignReason::{Decision,Binary,Long}` and
//! `VarFlag` instead of the teacher's single `Implication(cid, lit)` reason.
use crate::{
    assign::{AssignReason, AssignStack, Conflict},
    cdb::ClauseDBIF,
    mailbox::Mailbox,
    types::{DecisionLevel, Lit, LiteralEncoding, VarFlag, VarId},
    var::VarDB,
};

/// The learnt clause and the information needed to install it (spec.md
/// §4.5: glue for mailbox tiering, backjump level for `cancel_until`).
pub struct Analysis {
    /// `[¬UIP, other literals...]`, highest-level-first after `other[0]`.
    pub learnt: Vec<Lit>,
    pub backjump_level: DecisionLevel,
    pub glue: u8,
}

/// A fixed clause-activity decay used for the reason-clause bumps conflict
/// analysis does in passing (spec.md §4.5 Bump: "optionally... reason-side
/// literals"); distinct from the ring's own reduce-time decay policy.
const REASON_BUMP_DECAY: f64 = 0.999;

/// First-UIP resolution from `conflict` back to the unique implication
/// point at the current decision level, then minimize and report glue and
/// backjump target. `timestamp` is a monotonically increasing per-conflict
/// counter the caller bumps once, used to VMTF-restamp analyzed variables
/// in focused mode (spec.md §4.5 Bump).
pub fn analyze(
    asg: &mut AssignStack,
    vdb: &mut VarDB,
    cdb: &mut impl ClauseDBIF,
    conflict: Conflict,
    timestamp: u64,
) -> Analysis {
    let conflict_level = asg.decision_level();
    let mut learnt: Vec<Lit> = Vec::new();
    let mut levels: Vec<DecisionLevel> = Vec::new();
    let mut analyzed: Vec<VarId> = Vec::new();
    let mut open = 0usize;

    let mut reason_lits: Vec<Lit> = match conflict {
        Conflict::Binary(a, b) => vec![a, b],
        Conflict::Long(cid) => cdb.clause(cid).lits.clone(),
    };

    let trail = asg.trail().to_vec();
    let mut trail_idx = trail.len();
    let mut p: Option<Lit> = None;

    loop {
        for &lit in &reason_lits {
            if Some(lit) == p {
                continue;
            }
            let vi = lit.vi();
            if vdb[vi].is(VarFlag::SEEN) {
                continue;
            }
            vdb[vi].turn_on(VarFlag::SEEN);
            analyzed.push(vi);
            asg.bump_on_conflict(vi, vdb, timestamp);
            let lv = asg.level(vi);
            if lv == conflict_level {
                open += 1;
            } else if lv > 0 {
                learnt.push(lit.negate());
                levels.push(lv);
            }
        }

        loop {
            trail_idx -= 1;
            let lit = trail[trail_idx];
            if vdb[lit.vi()].is(VarFlag::SEEN) {
                p = Some(lit);
                break;
            }
        }
        open -= 1;
        if open == 0 {
            break;
        }
        let vi = p.unwrap().vi();
        reason_lits = match asg.reason(vi) {
            AssignReason::Decision => Vec::new(),
            AssignReason::Binary(other) => vec![p.unwrap(), other],
            AssignReason::Long(cid) => {
                cdb.bump_activity(cid, REASON_BUMP_DECAY);
                cdb.clause(cid).lits.clone()
            }
        };
    }

    let uip = p.unwrap();
    learnt.insert(0, uip.negate());

    // glue (LBD) counts distinct levels among the *non-UIP* literals only;
    // the conflict level itself (the UIP's own level) never contributes, so
    // a clause can shrink straight to a binary `[uip, x]` with glue 1 when
    // every other literal shares one common level below the UIP's.
    let mut glue_levels = levels.clone();
    glue_levels.sort_unstable();
    glue_levels.dedup();
    let glue = glue_levels.len().min(u8::MAX as usize) as u8;

    let shrunk = glue == 1 && learnt.len() > 2 && shrink(&mut learnt, asg, vdb, cdb);
    if !shrunk {
        minimize(&mut learnt, asg, vdb, cdb);
    }

    for &vi in &analyzed {
        vdb[vi].turn_off(VarFlag::SEEN);
        vdb[vi].turn_off(VarFlag::POISON);
    }

    let backjump_level = learnt[1..].iter().map(|l| asg.level(l.vi())).max().unwrap_or(0);

    Analysis {
        learnt,
        backjump_level,
        glue,
    }
}

/// Recursive-minimization check (spec.md §4.5 "Minimize"): `l` is redundant
/// in the learnt clause if it's root-fixed, already in the cut (`SEEN`), or
/// every literal of its own reason clause is redundant, explored to
/// `depth`. `VarFlag::POISON` memoizes a negative result within one call so
/// overlapping reason chains aren't re-walked.
fn literal_is_redundant(l: Lit, asg: &AssignStack, vdb: &mut VarDB, cdb: &impl ClauseDBIF, depth: u32, marked: &mut Vec<VarId>) -> bool {
    let vi = l.vi();
    if asg.level(vi) == 0 || vdb[vi].is(VarFlag::SEEN) {
        return true;
    }
    if vdb[vi].is(VarFlag::POISON) || depth == 0 {
        return false;
    }
    let reason_lits: Vec<Lit> = match asg.reason(vi) {
        AssignReason::Decision => return false,
        AssignReason::Binary(other) => vec![other],
        AssignReason::Long(cid) => cdb.clause(cid).lits.iter().copied().filter(|x| x.vi() != vi).collect(),
    };
    for r in reason_lits {
        if !literal_is_redundant(r, asg, vdb, cdb, depth - 1, marked) {
            vdb[vi].turn_on(VarFlag::POISON);
            return false;
        }
    }
    vdb[vi].turn_on(VarFlag::SEEN);
    marked.push(vi);
    true
}

/// Shrink (spec.md §4.5 "Shrink", only tried when `glue == 1 && size > 2`):
/// glue 1 means every non-UIP literal of `learnt` shares one common
/// decision level (not necessarily the UIP's own, higher, level), so the
/// whole tail is one same-level block. Resolve it against its own reason
/// chains, entirely within that level, to find the literal that dominates
/// the rest; on success the clause collapses to the binary
/// `[¬uip, ¬new_uip]`. Returns `false` (leaving `learnt` untouched) if some
/// reason literal escapes to a different nonzero level, in which case the
/// caller falls back to `minimize`.
fn shrink(learnt: &mut Vec<Lit>, asg: &AssignStack, vdb: &mut VarDB, cdb: &impl ClauseDBIF) -> bool {
    debug_assert!(learnt.len() > 2);
    let level = asg.level(learnt[1].vi());
    debug_assert!(level > 0);

    let mut marked: Vec<VarId> = Vec::new();
    let mut max_pos = 0usize;
    let mut open = 0usize;
    for &lit in &learnt[1..] {
        let vi = lit.vi();
        debug_assert_eq!(asg.level(vi), level);
        if !vdb[vi].is(VarFlag::SHRINKABLE) {
            vdb[vi].turn_on(VarFlag::SHRINKABLE);
            marked.push(vi);
        }
        max_pos = max_pos.max(asg.trail_pos(vi));
        open += 1;
    }

    let trail = asg.trail().to_vec();
    let mut pos = max_pos;
    let mut new_uip = None;
    let mut failed = false;

    while open > 0 {
        let cand = trail[pos];
        pos = pos.wrapping_sub(1);
        let vi = cand.vi();
        if asg.level(vi) != level || !vdb[vi].is(VarFlag::SHRINKABLE) {
            continue;
        }
        let reason_lits: Vec<Lit> = match asg.reason(vi) {
            AssignReason::Decision => Vec::new(),
            AssignReason::Binary(other) => vec![other],
            AssignReason::Long(cid) => cdb.clause(cid).lits.iter().copied().filter(|l| l.vi() != vi).collect(),
        };
        for other in reason_lits {
            if other == cand {
                continue;
            }
            let ovi = other.vi();
            let olevel = asg.level(ovi);
            if olevel == 0 {
                continue;
            }
            if olevel != level {
                failed = true;
                break;
            }
            if vdb[ovi].is(VarFlag::SHRINKABLE) {
                continue;
            }
            vdb[ovi].turn_on(VarFlag::SHRINKABLE);
            marked.push(ovi);
            open += 1;
        }
        if failed {
            break;
        }
        open -= 1;
        new_uip = Some(cand);
    }

    for vi in marked {
        vdb[vi].turn_off(VarFlag::SHRINKABLE);
    }

    if failed {
        return false;
    }
    let uip = new_uip.expect("a well-formed same-level block always resolves to a UIP");
    learnt[1] = uip.negate();
    learnt.truncate(2);
    true
}

fn minimize(learnt: &mut Vec<Lit>, asg: &AssignStack, vdb: &mut VarDB, cdb: &impl ClauseDBIF) {
    const MAX_DEPTH: u32 = 1000;
    let mut marked_extra = Vec::new();
    let mut i = 1;
    while i < learnt.len() {
        let l = learnt[i];
        let redundant = match asg.reason(l.vi()) {
            AssignReason::Decision => false,
            AssignReason::Binary(other) => literal_is_redundant(other, asg, vdb, cdb, MAX_DEPTH, &mut marked_extra),
            AssignReason::Long(cid) => cdb
                .clause(cid)
                .lits
                .iter()
                .copied()
                .filter(|x| x.vi() != l.vi())
                .all(|x| literal_is_redundant(x, asg, vdb, cdb, MAX_DEPTH, &mut marked_extra)),
        };
        if redundant {
            learnt.swap_remove(i);
        } else {
            i += 1;
        }
    }
    for vi in marked_extra {
        vdb[vi].turn_off(VarFlag::SEEN);
        vdb[vi].turn_off(VarFlag::POISON);
    }
}

/// Publish a freshly learnt clause through the mailbox, tier-categorized by
/// glue (spec.md §4.5 Backjump: "Export the clause via the mailbox fabric").
/// Binary learnts carry no payload; size 3+ go through `Mailbox::export_large`.
pub fn share_learnt(mailbox: &Mailbox, ring_id: usize, learnt: &[Lit], glue: u8) {
    if mailbox.threads() < 2 {
        return;
    }
    if learnt.len() == 2 {
        let word = crate::cdb::watch::tag_binary(true, learnt[0], learnt[1]);
        mailbox.export_binary(ring_id, word);
    } else if learnt.len() > 2 {
        mailbox.export_large(ring_id, learnt.to_vec(), glue, ring_id as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assign::AssignReason,
        cdb::ClauseDB,
        config::Config,
        types::{int2lit, CNFDescription, Instantiate},
    };

    fn setup(nv: usize) -> (AssignStack, VarDB, ClauseDB) {
        let config = Config::default();
        let cnf = CNFDescription {
            num_of_variables: nv,
            ..CNFDescription::default()
        };
        (
            AssignStack::instantiate(&config, &cnf),
            VarDB::instantiate(&config, &cnf),
            ClauseDB::instantiate(&config, &cnf),
        )
    }

    #[test]
    fn analyze_a_binary_conflict_at_level_one_learns_the_negated_decision() {
        let (mut asg, mut vdb, mut cdb) = setup(2);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        asg.assign_by_implication(int2lit(2), AssignReason::Binary(int2lit(-1)), asg.decision_level());
        let analysis = analyze(&mut asg, &mut vdb, &mut cdb, Conflict::Binary(int2lit(-2), int2lit(-1)), 1);
        assert_eq!(analysis.learnt.len(), 1);
        assert_eq!(analysis.learnt[0], int2lit(-1));
        assert_eq!(analysis.backjump_level, 0);
    }

    #[test]
    fn shrink_collapses_a_glue_one_block_to_a_binary_clause() {
        // level 1: decision `a`, then `c` implied from `a` alone.
        // level 2: decision `b`, then `x` (from `a`), `y` (from `c`) and
        // finally `w` (from `a`) implied, with `x`, `y`, `w` jointly
        // violating a ternary clause. The level-1 block (`a`, `c`) is a
        // single glue (both at level 1), and `c`'s own reason is just `a`,
        // so shrink should resolve it away and learn `[¬x, ¬a]`.
        let (mut asg, mut vdb, mut cdb) = setup(6);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        asg.assign_by_implication(int2lit(5), AssignReason::Binary(int2lit(-1)), asg.decision_level());
        asg.assign_by_decision(&mut vdb, int2lit(2));
        asg.assign_by_implication(int2lit(3), AssignReason::Binary(int2lit(-1)), asg.decision_level());
        asg.assign_by_implication(int2lit(4), AssignReason::Binary(int2lit(-5)), asg.decision_level());
        asg.assign_by_implication(int2lit(6), AssignReason::Binary(int2lit(-1)), asg.decision_level());

        let cid = cdb.new_clause(vec![int2lit(-3), int2lit(-4), int2lit(-6)], false, 0, 0);
        let analysis = analyze(&mut asg, &mut vdb, &mut cdb, Conflict::Long(cid), 1);

        assert_eq!(analysis.glue, 1);
        assert_eq!(analysis.learnt, vec![int2lit(-3), int2lit(-1)]);
    }

    #[test]
    fn glue_counts_distinct_nonzero_levels() {
        let (mut asg, mut vdb, mut cdb) = setup(3);
        asg.assign_by_decision(&mut vdb, int2lit(1));
        asg.assign_by_decision(&mut vdb, int2lit(2));
        let cid = cdb.new_clause(vec![int2lit(-1), int2lit(-2), int2lit(3)], false, 0, 0);
        let _ = cid;
        let analysis = analyze(&mut asg, &mut vdb, &mut cdb, Conflict::Long(cid), 1);
        assert!(analysis.glue >= 1);
    }
}
