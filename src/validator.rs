//! Crate `validator`: an independent model checker, the final step spec.md
//! §6 implies but leaves external ("the core reports SAT/UNSAT; checking
//! the witness is a consumer's job"). Re-reads the original DIMACS file
//! rather than trusting any in-memory formula, so a bug in the ruler's
//! simplification can't also corrupt the check of its own output.
use crate::types::{Lit, LiteralEncoding, SolverError};
use std::path::Path;

/// `true` iff every clause of the DIMACS file at `path` is satisfied by
/// `model` (a signed-literal list in the `Certificate::SAT` shape: each
/// original variable appears exactly once, positive or negated).
pub fn validate(path: &Path, model: &[i32]) -> Result<bool, SolverError> {
    let mut reader = crate::dimacs::CNFReader::open(path)?;
    let mut values = vec![None; reader.cnf.num_of_variables + 1];
    for &signed in model {
        let vi = signed.unsigned_abs() as usize;
        if vi < values.len() {
            values[vi] = Some(signed > 0);
        }
    }
    while let Some(clause) = reader.next_clause()? {
        if !clause_satisfied(&clause, &values) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_satisfied(clause: &[Lit], values: &[Option<bool>]) -> bool {
    clause.iter().any(|&l| values[l.vi()] == Some(l.positive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::File, io::Write};

    fn write_cnf(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn a_matching_model_validates() {
        let path = write_cnf("splr-ring-validator-ok.cnf", "p cnf 2 2\n1 2 0\n-1 2 0\n");
        assert!(validate(&path, &[1, 2]).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn a_model_violating_a_clause_is_rejected() {
        let path = write_cnf("splr-ring-validator-bad.cnf", "p cnf 2 2\n1 2 0\n-1 -2 0\n");
        assert!(!validate(&path, &[1, 2]).unwrap());
        let _ = std::fs::remove_file(&path);
    }
}
