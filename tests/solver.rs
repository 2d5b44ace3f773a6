//! End-to-end scenarios, S1-S6.
use splr_ring::{config::Config, solver, types::Certificate, validator};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

static COUNTER: AtomicU64 = AtomicU64::new(0);

struct TempCnf {
    path: PathBuf,
}

impl TempCnf {
    fn new(contents: &str) -> TempCnf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("splr-ring-e2e-{}-{}.cnf", std::process::id(), n));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        TempCnf { path }
    }
}

impl Drop for TempCnf {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn solve_path(path: &Path, threads: usize) -> Result<Certificate, splr_ring::types::SolverError> {
    let mut config = Config::from(path.to_path_buf());
    config.threads = threads;
    solver::solve(config)
}

fn expect_sat_and_valid(path: &Path, threads: usize) -> Vec<i32> {
    match solve_path(path, threads) {
        Ok(Certificate::SAT(model)) => {
            assert!(validator::validate(path, &model).unwrap(), "witness failed to satisfy the original formula");
            model
        }
        other => panic!("expected SAT, got {:?}", other),
    }
}

fn expect_unsat(path: &Path, threads: usize) {
    match solve_path(path, threads) {
        Ok(Certificate::UNSAT) => {}
        other => panic!("expected UNSAT, got {:?}", other),
    }
}

#[test]
fn s1_three_literal_sat() {
    let cnf = TempCnf::new("p cnf 3 2\n1 2 0\n-1 3 0\n");
    let model = expect_sat_and_valid(&cnf.path, 1);
    assert!(model.contains(&1) || (model.contains(&-1) && model.contains(&3)));
}

#[test]
fn s2_unit_chain_forces_a_unique_model() {
    let cnf = TempCnf::new("p cnf 4 4\n1 0\n-1 2 0\n-2 3 0\n-3 4 0\n");
    let model = expect_sat_and_valid(&cnf.path, 1);
    assert_eq!(model, vec![1, 2, 3, 4]);
}

#[test]
fn s3_immediate_unsat() {
    let cnf = TempCnf::new("p cnf 2 2\n1 0\n-1 0\n");
    expect_unsat(&cnf.path, 1);
}

#[test]
fn s4_pigeonhole_three_into_two_is_unsat_regardless_of_thread_count() {
    let clauses = "\
p cnf 6 9
1 2 0
3 4 0
5 6 0
-1 -3 0
-1 -5 0
-3 -5 0
-2 -4 0
-2 -6 0
-4 -6 0
";
    let cnf = TempCnf::new(clauses);
    expect_unsat(&cnf.path, 1);
    let cnf4 = TempCnf::new(clauses);
    expect_unsat(&cnf4.path, 4);
}

#[test]
fn s5_xor_chain_is_sat_and_stays_valid_without_the_walker() {
    // (a XOR b) AND (b XOR c) AND (c XOR d), Tseitin-free 4-variable XOR
    // chain encoded directly as its 8 forbidding clauses.
    let clauses = "\
p cnf 4 6
1 2 0
-1 -2 0
2 3 0
-2 -3 0
3 4 0
-3 -4 0
";
    let cnf = TempCnf::new(clauses);
    let mut config = Config::from(cnf.path.clone());
    config.no_walk = true;
    let result = solver::solve(config).unwrap();
    match result {
        Certificate::SAT(model) => {
            assert!(validator::validate(&cnf.path, &model).unwrap());
        }
        Certificate::UNSAT => panic!("expected SAT"),
    }
}

#[test]
fn s6_an_eliminable_variable_still_reconstructs_a_valid_witness() {
    let cnf = TempCnf::new("p cnf 3 3\n1 2 0\n-1 3 0\n1 -3 0\n");
    expect_sat_and_valid(&cnf.path, 1);
}

#[test]
fn complementary_units_are_unsat_at_root_level() {
    let cnf = TempCnf::new("p cnf 1 2\n1 0\n-1 0\n");
    expect_unsat(&cnf.path, 1);
}

#[test]
fn a_single_unit_clause_is_sat_and_assigns_it() {
    let cnf = TempCnf::new("p cnf 1 1\n1 0\n");
    let model = expect_sat_and_valid(&cnf.path, 1);
    assert_eq!(model, vec![1]);
}

#[test]
fn certify_writes_an_empty_clause_line_for_unsat() {
    let cnf = TempCnf::new("p cnf 1 2\n1 0\n-1 0\n");
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let proof_path = std::env::temp_dir().join(format!("splr-ring-e2e-proof-{}-{}.drat", std::process::id(), n));
    let mut config = Config::from(cnf.path.clone());
    config.use_certification = true;
    config.drat_ascii = true;
    config.proof_filename = proof_path.clone();
    match solver::solve(config) {
        Ok(Certificate::UNSAT) => {}
        other => panic!("expected UNSAT, got {:?}", other),
    }
    let proof = std::fs::read_to_string(&proof_path).expect("proof file should have been written");
    assert!(proof.lines().any(|line| line.trim() == "0"), "expected an empty-clause line in {:?}", proof);
    let _ = std::fs::remove_file(&proof_path);
}
