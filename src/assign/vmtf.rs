//! Focused-mode variable order: a VMTF (variable move-to-front) doubly
//! linked queue ordered by recency (spec.md §3 "alternate: VMTF queue",
//! §4.4 focused mode). Grounded in the teacher's timestamp-based
//! `VarTimestamp`/`take_stage` machinery (`src/assign/select.rs`), adapted
//! into the classic Siege/CaDiCaL queue shape gimsatul itself uses
//! (`examples/original_source`), since the teacher never links variables.
use crate::types::VarId;

#[derive(Debug)]
pub struct Vmtf {
    next: Vec<VarId>,
    prev: Vec<VarId>,
    links: Vec<u64>,
    head: VarId,
    /// search resumes here; only ever moves toward the tail as variables
    /// get assigned, and rewinds to `head` on backtrack past its timestamp.
    search: VarId,
}

const NIL: VarId = 0;

impl Vmtf {
    pub fn new(n: usize) -> Vmtf {
        let mut next = vec![NIL; n + 1];
        let mut prev = vec![NIL; n + 1];
        for vi in 1..=n {
            next[vi] = if vi < n { vi + 1 } else { NIL };
            prev[vi] = if vi > 1 { vi - 1 } else { NIL };
        }
        Vmtf {
            next,
            prev,
            links: vec![0; n + 1],
            head: if n > 0 { 1 } else { NIL },
            search: if n > 0 { 1 } else { NIL },
        }
    }
    fn unlink(&mut self, vi: VarId) {
        let p = self.prev[vi];
        let nx = self.next[vi];
        if p != NIL {
            self.next[p] = nx;
        } else {
            self.head = nx;
        }
        if nx != NIL {
            self.prev[nx] = p;
        }
        self.prev[vi] = NIL;
        self.next[vi] = NIL;
    }
    /// move `vi` to the front of the queue (most recently bumped), which is
    /// where `propagate`/`analyze` conflicts route their bumped variables
    /// (spec.md §4.5 Bump).
    pub fn bump(&mut self, vi: VarId, timestamp: u64) {
        self.links[vi] = timestamp;
        if self.head == vi {
            self.search = vi;
            return;
        }
        self.unlink(vi);
        self.next[vi] = self.head;
        if self.head != NIL {
            self.prev[self.head] = vi;
        }
        self.head = vi;
        self.search = vi;
    }
    /// rewind the search cursor to the head; called after a backjump
    /// unassigns a variable whose link timestamp is more recent than the
    /// variable the cursor currently sits on (spec.md §4.4 focused mode).
    pub fn reset_search(&mut self) {
        self.search = self.head;
    }
    pub fn timestamp(&self, vi: VarId) -> u64 {
        self.links[vi]
    }
    /// advance the search cursor past already-assigned variables and return
    /// the first unassigned one, or `None` if the queue is exhausted.
    pub fn next_unassigned(&mut self, is_assigned: impl Fn(VarId) -> bool) -> Option<VarId> {
        let mut vi = self.search;
        while vi != NIL && is_assigned(vi) {
            vi = self.next[vi];
        }
        self.search = vi;
        if vi == NIL {
            None
        } else {
            Some(vi)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_moves_a_variable_to_the_front() {
        let mut q = Vmtf::new(4);
        q.bump(3, 10);
        assert_eq!(q.head, 3);
        let found = q.next_unassigned(|_| false);
        assert_eq!(found, Some(3));
    }

    #[test]
    fn next_unassigned_skips_assigned_vars() {
        let mut q = Vmtf::new(3);
        let found = q.next_unassigned(|vi| vi == 1);
        assert_eq!(found, Some(2));
    }
}
