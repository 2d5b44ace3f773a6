//! The `Clause` record (spec.md §3) as stored inside one ring's `ClauseDB`.
use crate::types::{ClauseFlag, Lit};

/// An original or learnt clause of two or more literals. Binary clauses
/// never reach this struct -- they live purely as tagged values in watch
/// lists (`cdb::watch`) and, for originals, in the ruler's binary store.
#[derive(Clone, Debug)]
pub struct Clause {
    pub lits: Vec<Lit>,
    pub flags: ClauseFlag,
    /// glue / LBD at learning time, saturating at 255 (spec.md §3).
    pub glue: u8,
    /// bumped like a variable's VSIDS score; used to break ties in reduce.
    pub activity: f64,
    /// monotonic id for logging/DRAT cross-referencing, unique within the
    /// ring and origin worker that created this clause.
    pub stable_id: u64,
    /// id of the ring that learnt this clause (0 for original clauses or
    /// ruler-derived ones before the first worker fork).
    pub origin_ring: u8,
}

impl Clause {
    pub fn new(lits: Vec<Lit>, redundant: bool, glue: usize, stable_id: u64, origin_ring: u8) -> Clause {
        let mut flags = ClauseFlag::empty();
        if redundant {
            flags.insert(ClauseFlag::REDUNDANT);
        }
        Clause {
            lits,
            flags,
            glue: glue.min(u8::MAX as usize) as u8,
            activity: 0.0,
            stable_id,
            origin_ring,
        }
    }
    #[inline]
    pub fn is(&self, f: ClauseFlag) -> bool {
        self.flags.contains(f)
    }
    #[inline]
    pub fn turn_on(&mut self, f: ClauseFlag) {
        self.flags.insert(f);
    }
    #[inline]
    pub fn turn_off(&mut self, f: ClauseFlag) {
        self.flags.remove(f);
    }
    pub fn len(&self) -> usize {
        self.lits.len()
    }
    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }
    /// a clause that's a unit under the current trail reads as a reason
    /// immediately; this just surfaces the fast "dead weight" check reduce
    /// uses to skip live, recently-used, or locked clauses.
    pub fn removable(&self) -> bool {
        self.is(ClauseFlag::REDUNDANT)
            && !self.is(ClauseFlag::PROTECTED)
            && !self.is(ClauseFlag::USED)
    }
}

impl std::fmt::Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::types::LiteralEncoding;
        write!(f, "{{")?;
        for (i, l) in self.lits.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", l.int())?;
        }
        write!(f, "}}")
    }
}
