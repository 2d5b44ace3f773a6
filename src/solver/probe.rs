//! Failed-literal probing with lifting (spec.md component C7, §4.7, first
//! bullet). Ring-local: runs against the ring's own `AssignStack` at the
//! root decision level, between search bursts.
use crate::{
    assign::AssignStack,
    cdb::ClauseDBIF,
    types::{var2lit, Lit, LiteralEncoding, MaybeInconsistent, VarFlag, VarId},
    var::VarDB,
};

/// Try one literal as a level-1 decision and propagate. `Ok(None)` means
/// the probe hit a conflict and its negation was forced in as a root unit
/// instead (spec.md: "if conflict, the negation is a forced unit").
/// `Ok(Some(implied))` carries every literal propagation derived, for the
/// caller's lifting step.
fn probe_literal(
    asg: &mut AssignStack,
    vdb: &mut VarDB,
    cdb: &mut impl ClauseDBIF,
    lit: Lit,
) -> Result<Option<Vec<Lit>>, crate::types::SolverError> {
    let start = asg.trail().len();
    asg.assign_by_decision(vdb, lit);
    if asg.propagate(cdb).is_some() {
        asg.cancel_until(vdb, asg.root_level());
        asg.assign_at_rootlevel(lit.negate())?;
        if asg.propagate(cdb).is_some() {
            return Err(crate::types::SolverError::Inconsistent);
        }
        return Ok(None);
    }
    let implied = asg.trail()[start..].to_vec();
    asg.cancel_until(vdb, asg.root_level());
    Ok(Some(implied))
}

/// Probe up to `budget` variables starting from the rolling `cursor`
/// (spec.md: "iterates active literals starting from a rolling cursor").
/// Only valid to call at the root decision level.
pub fn probe_round(
    asg: &mut AssignStack,
    vdb: &mut VarDB,
    cdb: &mut impl ClauseDBIF,
    cursor: &mut VarId,
    budget: usize,
) -> MaybeInconsistent {
    let nv = asg.num_vars();
    if nv == 0 {
        return Ok(());
    }
    for _ in 0..budget {
        *cursor = if *cursor >= nv { 1 } else { *cursor + 1 };
        let vi = *cursor;
        if asg.assigned(vi).is_some() || vdb[vi].is(VarFlag::ELIMINATED) {
            continue;
        }
        let pos = var2lit(vi, true);
        let neg = pos.negate();
        let implied_pos = match probe_literal(asg, vdb, cdb, pos)? {
            Some(implied) => implied,
            None => continue, // vi got fixed by the forced-negation branch
        };
        let implied_neg = match probe_literal(asg, vdb, cdb, neg)? {
            Some(implied) => implied,
            None => continue,
        };
        // Lifting (spec.md §4.7): a literal implied by both l and ¬l
        // holds unconditionally.
        for &u in &implied_pos {
            if u.vi() != vi && implied_neg.contains(&u) {
                asg.assign_at_rootlevel(u)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cdb::ClauseDB,
        config::Config,
        types::{int2lit, CNFDescription, Instantiate},
    };

    #[test]
    fn a_literal_whose_positive_branch_always_conflicts_is_forced_false() {
        let config = Config::default();
        let cnf = CNFDescription {
            num_of_variables: 2,
            ..CNFDescription::default()
        };
        let mut asg = AssignStack::instantiate(&config, &cnf);
        let mut vdb = VarDB::instantiate(&config, &cnf);
        let mut cdb = ClauseDB::instantiate(&config, &cnf);
        // (¬1 ∨ 2) and (¬1 ∨ ¬2): deciding 1 true always conflicts.
        cdb.attach_binary(int2lit(-1), int2lit(2), false);
        cdb.attach_binary(int2lit(-1), int2lit(-2), false);
        let mut cursor = 0;
        probe_round(&mut asg, &mut vdb, &mut cdb, &mut cursor, 4).unwrap();
        assert_eq!(asg.value(int2lit(1)), Some(false));
    }
}
