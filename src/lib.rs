#![doc(html_root_url = "https://docs.rs/splr-ring/0.1.0")]
/*!
# A parallel portfolio CDCL SAT solver in Rust

`splr-ring` reads a DIMACS CNF instance, simplifies it once at the top
("the ruler"), then runs a portfolio of CDCL search workers ("rings") on
their own clones of the simplified problem, exchanging learnt clauses
through lock-free per-peer mailboxes until one worker proves the instance
SAT or UNSAT.

Much of the single-ring search loop is a direct descendant of Splr, a pure
Rust CDCL solver based on Glucose 4.1:

- CDCL, watch literals, and so on from Minisat and the ancestors
- Glucose-like dynamic blocking/forcing restarts based on EMAs
- pre/in-process simplification based on clause subsumption and variable
  elimination

The portfolio/sharing layer generalizes that single-ring loop with a
shared-problem "ruler" and a clause-sharing fabric between workers, in the
spirit of parallel portfolio solvers like gimsatul.

## Usage

```plain
$ splr-ring --threads=4 tests/sample.cnf
```
*/
/// Crate `assign` provides the trail, decision heuristics (stable-mode
/// heap, focused-mode VMTF queue) and the two-watched-literal propagator.
pub mod assign;
/// Crate `barrier` provides reusable rendezvous barriers and the
/// termination flag shared by the ruler and every ring.
pub mod barrier;
/// Crate `cdb` provides the clause store, tagged binary clauses and
/// per-literal watch lists.
pub mod cdb;
/// Crate `config` provides the solver's configuration and CLI.
pub mod config;
/// Crate `dimacs` reads a DIMACS CNF file into a `CNFDescription` plus a
/// stream of clauses.
pub mod dimacs;
/// Crate `drat` is an append-only sink for DRAT proof steps.
pub mod drat;
/// Crate `mailbox` is the clause-sharing fabric between ring threads.
pub mod mailbox;
/// Crate `ruler` owns the original (simplified) problem: occurrence
/// lists, the unit queue, the extension stack, and the inprocessor.
pub mod ruler;
/// Crate `solver` ties every other module together: it builds the ruler,
/// spawns ring threads, and reports the final `Certificate`.
pub mod solver;
/// Crate `state` is a per-ring collection of running statistics and the
/// human-readable progress line renderer.
pub mod state;
/// Crate `types` provides literal/variable encodings, EMAs, flags and the
/// crate's error type.
pub mod types;
/// Crate `validator` implements a model checker: does an assignment
/// satisfy every clause of the original (pre-simplification) formula?
pub mod validator;
/// Crate `var` provides the `Var` record and its owner `VarDB`.
pub mod var;

#[macro_use]
extern crate bitflags;
