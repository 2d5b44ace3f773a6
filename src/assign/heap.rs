//! Stable-mode variable order: a binary max-heap keyed by VSIDS activity
//! (spec.md §3 Heap, §4.4 stable mode), grounded in the teacher's
//! `VarIdHeap` (`src/assign.rs`).
use crate::{types::VarId, var::VarDB};

#[derive(Debug)]
pub struct VarIdHeap {
    /// 1-indexed binary heap of `VarId`s; slot 0 unused.
    heap: Vec<VarId>,
    /// `idx[vi]` is `vi`'s position in `heap`, or 0 if absent.
    idx: Vec<usize>,
}

impl VarIdHeap {
    pub fn new(n: usize) -> VarIdHeap {
        let mut heap: Vec<VarId> = (0..=n).collect();
        let idx: Vec<usize> = (0..=n).collect();
        heap[0] = 0;
        VarIdHeap { heap, idx }
    }
    pub fn len(&self) -> usize {
        self.heap.len() - 1
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn clear(&mut self) {
        self.heap.truncate(1);
        for i in self.idx.iter_mut() {
            *i = 0;
        }
    }
    pub fn contains(&self, vi: VarId) -> bool {
        self.idx[vi] != 0
    }
    fn percolate_up(&mut self, vdb: &VarDB, start: usize) {
        let mut q = start;
        let vq = self.heap[q];
        let aq = vdb.activity(vq);
        loop {
            let p = q / 2;
            if p == 0 {
                break;
            }
            let vp = self.heap[p];
            if vdb.activity(vp) >= aq {
                break;
            }
            self.heap[q] = vp;
            self.idx[vp] = q;
            q = p;
        }
        self.heap[q] = vq;
        self.idx[vq] = q;
    }
    fn percolate_down(&mut self, vdb: &VarDB, start: usize) {
        let n = self.len();
        let mut q = start;
        let vq = self.heap[q];
        let aq = vdb.activity(vq);
        loop {
            let mut c = q * 2;
            if c > n {
                break;
            }
            if c + 1 <= n && vdb.activity(self.heap[c + 1]) > vdb.activity(self.heap[c]) {
                c += 1;
            }
            if aq >= vdb.activity(self.heap[c]) {
                break;
            }
            self.heap[q] = self.heap[c];
            self.idx[self.heap[q]] = q;
            q = c;
        }
        self.heap[q] = vq;
        self.idx[vq] = q;
    }
    pub fn insert(&mut self, vdb: &VarDB, vi: VarId) {
        if self.contains(vi) {
            return;
        }
        self.heap.push(vi);
        let n = self.len();
        self.idx[vi] = n;
        self.percolate_up(vdb, n);
    }
    pub fn update(&mut self, vdb: &VarDB, vi: VarId) {
        if self.contains(vi) {
            let at = self.idx[vi];
            self.percolate_up(vdb, at);
            let at = self.idx[vi];
            self.percolate_down(vdb, at);
        }
    }
    pub fn remove(&mut self, vi: VarId) {
        let at = self.idx[vi];
        if at == 0 {
            return;
        }
        let n = self.len();
        let last = self.heap[n];
        self.heap[at] = last;
        self.idx[last] = at;
        self.heap.pop();
        self.idx[vi] = 0;
    }
    /// pop the unassigned variable with the highest activity, without
    /// removing already-eliminated or assigned entries the caller skips
    /// over on a prior call (the caller re-inserts/removes as it learns
    /// more, so the root is lazily maintained rather than filtered here).
    pub fn pop_root(&mut self, vdb: &VarDB) -> Option<VarId> {
        if self.is_empty() {
            return None;
        }
        let root = self.heap[1];
        let n = self.len();
        let last = self.heap[n];
        self.heap[1] = last;
        self.idx[last] = 1;
        self.heap.pop();
        self.idx[root] = 0;
        if !self.is_empty() {
            self.percolate_down(vdb, 1);
        }
        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, types::{CNFDescription, Instantiate}};

    #[test]
    fn pop_root_returns_highest_activity_first() {
        let config = Config::default();
        let cnf = CNFDescription {
            num_of_variables: 5,
            ..CNFDescription::default()
        };
        let mut vdb = VarDB::instantiate(&config, &cnf);
        vdb.bump_activity(3);
        vdb.bump_activity(3);
        vdb.bump_activity(1);
        let mut heap = VarIdHeap::new(5);
        for vi in 1..=5 {
            heap.update(&vdb, vi);
        }
        assert_eq!(heap.pop_root(&vdb), Some(3));
        assert_eq!(heap.pop_root(&vdb), Some(1));
    }
}
