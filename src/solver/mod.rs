//! Crate `solver`: the top-level entry point that ties every other module
//! together (spec.md §2 "Data/control flow"). Parses the CNF into a
//! `Ruler`, runs the first simplify round, spawns one ring per configured
//! thread, and reports whichever ring claims the winner slot first.
pub mod conflict;
pub mod probe;
pub mod restart;
pub mod ring;
pub mod vivify;
pub mod walker;

use crate::{
    barrier::{Barriers, Termination},
    config::Config,
    dimacs::CNFReader,
    mailbox::Mailbox,
    ruler::Ruler,
    types::{Certificate, SolverResult},
};
use ring::Ring;
use std::sync::Arc;
use std::thread;

/// Parse, simplify once, fan out a ring per thread, and wait for a
/// verdict (spec.md §2: "C10 parses and owns the initial formula; C12
/// simplifies it; C9 workers are cloned from C10... run C3/C5/C6 in a
/// loop... the first worker to reach SAT or UNSAT sets a winner").
pub fn solve(config: Config) -> SolverResult {
    let config = config.sanitize();
    let mut reader = CNFReader::open(&config.cnf_filename)?;
    let ruler = match Ruler::from_dimacs(&mut reader) {
        Ok(ruler) => ruler,
        Err(crate::types::SolverError::Inconsistent) => {
            // complementary root units or an explicit empty clause at
            // parse time (spec.md §8 boundary behaviors): normal UNSAT,
            // not an error -- still owed a one-line proof if the caller
            // asked to certify.
            if config.use_certification {
                if let Ok(mut tracer) = crate::drat::DratTracer::open(&config.proof_filename, config.drat_ascii) {
                    tracer.add_empty();
                    tracer.flush();
                }
            }
            return Ok(Certificate::UNSAT);
        }
        Err(e) => return Err(e),
    };
    log::info!("c parsed {}", ruler.cnf_description(&config.cnf_filename.display().to_string()));

    if config.use_certification {
        match crate::drat::DratTracer::open(&config.proof_filename, config.drat_ascii) {
            Ok(tracer) => ruler.set_drat(tracer),
            Err(e) => return Err(crate::types::SolverError::IO(e)),
        }
    }

    if !config.no_simplify {
        if let Err(e) = ruler.simplify_round(&config) {
            ruler.flush_drat();
            return if matches!(e, crate::types::SolverError::Inconsistent) {
                Ok(Certificate::UNSAT)
            } else {
                Err(e)
            };
        }
    }

    let threads = config.threads;
    let ruler = Arc::new(ruler);
    let mailbox = Arc::new(Mailbox::new(threads, config.elim_grow_limit > 4));
    let barriers = Arc::new(Barriers::new(threads));
    let term = Arc::new(Termination::new());

    let handles: Vec<_> = (0..threads)
        .map(|id| {
            let config = config.clone();
            let ruler = Arc::clone(&ruler);
            let mailbox = Arc::clone(&mailbox);
            let barriers = Arc::clone(&barriers);
            let term = Arc::clone(&term);
            thread::Builder::new()
                .name(format!("ring-{}", id))
                .spawn(move || Ring::new(id, config, ruler, mailbox, barriers, term).run_to_completion())
                .expect("failed to spawn a ring thread")
        })
        .collect();

    let mut verdict = None;
    for handle in handles {
        if let Ok((result, stats)) = handle.join() {
            log::debug!("{}", stats.render());
            if let Some(certificate) = result {
                verdict = Some(certificate);
            }
        }
    }
    ruler.flush_drat();

    match verdict {
        Some(certificate) => Ok(certificate),
        None if term.is_terminated() => Err(crate::types::SolverError::TimeOut),
        None => Err(crate::types::SolverError::ThreadPanicked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::{
        fs::File,
        io::Write,
        path::PathBuf,
        sync::atomic::{AtomicU64, Ordering},
    };

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    struct TempCnf {
        path: PathBuf,
    }
    impl TempCnf {
        fn new(contents: &str) -> TempCnf {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("splr-ring-solver-test-{}.cnf", n));
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

    #[test]
    fn a_trivially_satisfiable_instance_reports_sat() {
        let cnf = TempCnf::new("p cnf 2 2\n1 2 0\n-1 2 0\n");
        let config = Config::from(cnf.path.clone());
        match solve(config) {
            Ok(Certificate::SAT(_)) => {}
            other => panic!("expected SAT, got {:?}", other),
        }
    }

    #[test]
    fn an_immediately_contradictory_instance_reports_unsat() {
        let cnf = TempCnf::new("p cnf 1 2\n1 0\n-1 0\n");
        let config = Config::from(cnf.path.clone());
        match solve(config) {
            Ok(Certificate::UNSAT) => {}
            other => panic!("expected UNSAT, got {:?}", other),
        }
    }

    #[test]
    fn a_pigeonhole_instance_reports_unsat() {
        // 3 pigeons into 2 holes: vars 11,12,21,22,31,32 ("p,h" -> p*2+h).
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
        let config = Config::from(cnf.path.clone());
        match solve(config) {
            Ok(Certificate::UNSAT) => {}
            other => panic!("expected UNSAT, got {:?}", other),
        }
    }
}
