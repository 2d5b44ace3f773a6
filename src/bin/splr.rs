//! The `splr-ring` CLI front-end: DIMACS/CLI/DRAT I/O, the external
//! collaborators spec.md §1 lists as out of scope for the core and §6
//! describes only the interfaces of.
use splr_ring::{
    config::Config,
    solver,
    types::{Certificate, SolverError},
};
use std::process::ExitCode;
use structopt::StructOpt;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let config = Config::from_args().sanitize();
    let witness = !config.no_witness;

    match solver::solve(config) {
        Ok(Certificate::SAT(model)) => {
            println!("s SATISFIABLE");
            if witness {
                print_model(&model);
            }
            ExitCode::from(10)
        }
        Ok(Certificate::UNSAT) => {
            println!("s UNSATISFIABLE");
            ExitCode::from(20)
        }
        Err(SolverError::TimeOut) => {
            println!("s UNKNOWN");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("c error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_model(model: &[i32]) {
    print!("v");
    for lit in model {
        print!(" {}", lit);
    }
    println!(" 0");
}
