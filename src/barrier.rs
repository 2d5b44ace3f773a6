//! Crate `barrier`: reusable N-way rendezvous and the termination flag
//! (spec.md component C13), grounded in the generation-counter shape of
//! the original solver's `barrier.c` (`examples/original_source`), since
//! the teacher (a single-threaded solver) has no barrier of its own.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// A reusable rendezvous point for a fixed number of threads. Each round
/// is identified by a generation counter so a thread that arrives for
/// round N+1 while stragglers are still leaving round N never confuses
/// the two (spec.md §4.12).
pub struct Barrier {
    size: usize,
    state: Mutex<BarrierState>,
    cond: Condvar,
}

struct BarrierState {
    waiting: usize,
    generation: u64,
    /// set by `disable_and_abort`; every current and future waiter on this
    /// generation returns `false` immediately instead of blocking.
    disabled: bool,
}

impl Barrier {
    pub fn new(size: usize) -> Barrier {
        Barrier {
            size,
            state: Mutex::new(BarrierState {
                waiting: 0,
                generation: 0,
                disabled: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Block until `size` threads have called `wait`, or until the barrier
    /// is disabled for the generation this caller is waiting on. Returns
    /// `true` if the rendezvous completed normally, `false` if aborted.
    /// The barrier automatically recycles for the next round: the last
    /// arriving thread resets `waiting` to 0 and bumps `generation`.
    pub fn wait(&self) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if guard.disabled {
            return false;
        }
        let my_generation = guard.generation;
        guard.waiting += 1;
        if guard.waiting == self.size {
            guard.waiting = 0;
            guard.generation += 1;
            guard.disabled = false;
            self.cond.notify_all();
            return true;
        }
        loop {
            guard = self
                .cond
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
            if guard.disabled {
                return false;
            }
            if guard.generation != my_generation {
                return true;
            }
        }
    }

    /// Release every thread currently parked in `wait` (and any that
    /// arrive before the next full rendezvous) without them completing the
    /// round; used when a winner is declared mid-simplification (spec.md
    /// §4.12).
    pub fn disable_and_abort(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.disabled = true;
        self.cond.notify_all();
    }
}

/// The barrier quintet the simplify rendezvous sequence uses (spec.md
/// §4.12 "Simplify rendezvous sequence"): `start` to agree to simplify,
/// `unclone` to surrender per-ring clause ownership, `run` for the first
/// ring to perform §4.11, `copy` for the rest to rebuild their watchers,
/// `end` to resume search.
pub struct Barriers {
    pub start: Barrier,
    pub unclone: Barrier,
    pub run: Barrier,
    pub copy: Barrier,
    pub end: Barrier,
}

impl Barriers {
    pub fn new(num_threads: usize) -> Barriers {
        Barriers {
            start: Barrier::new(num_threads),
            unclone: Barrier::new(num_threads),
            run: Barrier::new(num_threads),
            copy: Barrier::new(num_threads),
            end: Barrier::new(num_threads),
        }
    }

    /// abort every barrier in the quintet; called once a winner is
    /// claimed so no ring stays parked mid-simplification.
    pub fn disable_and_abort_all(&self) {
        self.start.disable_and_abort();
        self.unclone.disable_and_abort();
        self.run.disable_and_abort();
        self.copy.disable_and_abort();
        self.end.disable_and_abort();
    }
}

/// The termination flag shared by the ruler and every ring (spec.md §3
/// Ruler state, §4.12, §5). The fast path is a relaxed read so a worker
/// can poll it between CDCL sub-phases at negligible cost; the winner is
/// claimed by a single compare-exchange so only one thread's result is
/// ever reported.
#[derive(Default)]
pub struct Termination {
    flag: AtomicBool,
    /// 0 = undecided, 1 = someone already claimed the win.
    claimed: AtomicBool,
}

impl Termination {
    pub fn new() -> Termination {
        Termination::default()
    }

    /// fast-path unlocked read, used between CDCL sub-phases and at
    /// barrier entry (spec.md §5 Cancellation & timeouts).
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// set the flag unconditionally; used by an external time/conflict
    /// budget or a re-raised signal, independent of who (if anyone) wins.
    pub fn terminate(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Claim the winner slot via compare-exchange; only the first caller
    /// gets `true`. All later reads of a winner's status happen-after
    /// this store due to its release ordering (spec.md §5).
    pub fn claim_winner(&self) -> bool {
        let won = self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.flag.store(true, Ordering::Release);
        }
        won
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn barrier_releases_all_waiters_together() {
        let barrier = Arc::new(Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let b = Arc::clone(&barrier);
            handles.push(thread::spawn(move || b.wait()));
        }
        for h in handles {
            assert!(h.join().unwrap());
        }
    }

    #[test]
    fn barrier_recycles_for_a_second_round() {
        let barrier = Arc::new(Barrier::new(2));
        for _ in 0..3 {
            let b1 = Arc::clone(&barrier);
            let h1 = thread::spawn(move || b1.wait());
            let b2 = Arc::clone(&barrier);
            let h2 = thread::spawn(move || b2.wait());
            assert!(h1.join().unwrap());
            assert!(h2.join().unwrap());
        }
    }

    #[test]
    fn disable_and_abort_releases_a_lone_waiter() {
        let barrier = Arc::new(Barrier::new(2));
        let b = Arc::clone(&barrier);
        let handle = thread::spawn(move || b.wait());
        // give the waiter a moment to actually park.
        std::thread::sleep(std::time::Duration::from_millis(20));
        barrier.disable_and_abort();
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn termination_claim_winner_is_exclusive() {
        let term = Termination::new();
        assert!(term.claim_winner());
        assert!(!term.claim_winner());
        assert!(term.is_terminated());
    }

    #[test]
    fn termination_terminate_does_not_claim_a_winner() {
        let term = Termination::new();
        term.terminate();
        assert!(term.is_terminated());
        assert!(term.claim_winner());
    }
}
