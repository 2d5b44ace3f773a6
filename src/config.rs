//! Crate `config` provides the solver's configuration and CLI (spec.md §6).
use std::path::PathBuf;
use structopt::StructOpt;

/// Crate version, reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on `--threads`; matches spec.md §6.
pub const MAX_THREADS: usize = 256;

/// Configuration built from the command line. Only the options spec.md §6
/// lists as the CLI's contract are load-bearing for the solving core; the
/// rest (clause DB / restart / elimination tuning) are the teacher's own
/// knobs, carried over because the core consumes their values directly
/// (`src/config.rs` in the teacher).
#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "splr-ring", about = "A parallel portfolio CDCL SAT solver")]
pub struct Config {
    /// A DIMACS format CNF file.
    #[structopt(parse(from_os_str))]
    pub cnf_filename: PathBuf,

    /// Filename for a DRAT proof; only written when `--certify` is set.
    #[structopt(long = "proof", short = "p", default_value = "proof.out", parse(from_os_str))]
    pub proof_filename: PathBuf,

    /// Writes a DRAT UNSAT certification file.
    #[structopt(long = "certify", short = "c")]
    pub use_certification: bool,

    /// Use the ASCII DRAT format instead of binary.
    #[structopt(long = "ascii")]
    pub drat_ascii: bool,

    /// Number of portfolio worker threads (1..=MAX_THREADS).
    #[structopt(long = "threads", default_value = "1")]
    pub threads: usize,

    /// Wall-clock time limit in seconds; 0 means unlimited.
    #[structopt(long = "time", default_value = "0")]
    pub timeout: f64,

    /// Conflict budget across the whole portfolio; 0 means unlimited.
    #[structopt(long = "conflicts", default_value = "0")]
    pub conflict_limit: u64,

    /// Skip emitting a witness model for SAT instances.
    #[structopt(long = "no-witness")]
    pub no_witness: bool,

    /// Optimization/thoroughness level for inprocessing, 0..=3.
    #[structopt(short = "O", default_value = "1")]
    pub optimize: u8,

    /// Verbosity; repeat for more (-v, -vv, ...).
    #[structopt(short = "v", parse(from_occurrences))]
    pub verbosity: u8,

    /// Suppress all progress output.
    #[structopt(short = "q", long = "quiet")]
    pub quiet: bool,

    /// Disable the local-search walker entirely.
    #[structopt(long = "no-walk")]
    pub no_walk: bool,

    /// Run one local-search pass before the first CDCL search.
    #[structopt(long = "walk-initially")]
    pub walk_initially: bool,

    /// Disable all ruler-level inprocessing (the first simplify round and
    /// every periodic rendezvous).
    #[structopt(long = "no-simplify")]
    pub no_simplify: bool,

    /// Output directory for the default result/answer file.
    #[structopt(long = "dir", short = "o", default_value = ".", parse(from_os_str))]
    pub output_dirname: PathBuf,

    /// Result filename; "-" or empty means stdout.
    #[structopt(long = "result", short = "r", default_value = "", parse(from_os_str))]
    pub result_filename: PathBuf,

    //
    //## clause DB (teacher: src/config.rs)
    //
    /// Soft limit on #clauses (0 = no limit).
    #[structopt(long = "cl", default_value = "0")]
    pub clause_limit: usize,
    /// Disable clause reduction.
    #[structopt(long = "without-reduce", short = "R")]
    pub without_reduce: bool,

    //
    //## eliminator / ruler (teacher: src/config.rs)
    //
    /// Grow limit of #clauses by variable elimination.
    #[structopt(long = "eg", default_value = "4")]
    pub elim_grow_limit: usize,
    /// Max #literals in a clause considered by variable elimination.
    #[structopt(long = "el", default_value = "64")]
    pub elim_lit_limit: usize,
    /// Disable variable elimination (subsumption/SCC/dedup still run).
    #[structopt(long = "without-elim", short = "E")]
    pub without_elim: bool,

    //
    //## restarter (teacher: src/config.rs)
    //
    /// Window length for the slow glue/ASG EMAs.
    #[structopt(long = "rl", default_value = "50")]
    pub restart_lbd_len: usize,
    /// Window length for the fast glue EMA.
    #[structopt(long = "ra", default_value = "8")]
    pub restart_asg_len: usize,
    /// Forcing-restart threshold (fast/slow glue ratio).
    #[structopt(long = "rt", default_value = "1.1")]
    pub restart_threshold: f64,
    /// Base #conflicts between focused-mode restarts.
    #[structopt(long = "rs", default_value = "50")]
    pub restart_step: usize,

    /// Disable mailbox clause sharing between workers (useful for testing a
    /// single ring in isolation).
    #[structopt(long = "no-share")]
    pub no_share: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            cnf_filename: PathBuf::new(),
            proof_filename: PathBuf::from("proof.out"),
            use_certification: false,
            drat_ascii: false,
            threads: 1,
            timeout: 0.0,
            conflict_limit: 0,
            no_witness: false,
            optimize: 1,
            verbosity: 0,
            quiet: false,
            no_walk: false,
            walk_initially: false,
            no_simplify: false,
            output_dirname: PathBuf::from("."),
            result_filename: PathBuf::new(),
            clause_limit: 0,
            without_reduce: false,
            elim_grow_limit: 4,
            elim_lit_limit: 64,
            without_elim: false,
            restart_lbd_len: 50,
            restart_asg_len: 8,
            restart_threshold: 1.1,
            restart_step: 50,
            no_share: false,
        }
    }
}

impl<T> From<T> for Config
where
    PathBuf: From<T>,
{
    fn from(path: T) -> Config {
        Config {
            cnf_filename: PathBuf::from(path),
            ..Config::default()
        }
    }
}

impl Config {
    /// Clamp user-given values into sane ranges, the way the teacher's
    /// `override_args` does post-processing after `StructOpt::from_args`.
    pub fn sanitize(mut self) -> Config {
        self.threads = self.threads.clamp(1, MAX_THREADS);
        if self.quiet {
            self.verbosity = 0;
        }
        self
    }
}
