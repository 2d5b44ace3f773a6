//! Crate `drat`: the DRAT proof sink, the second external collaborator
//! spec.md §6 names. Every add/delete of a clause during resolution,
//! bounded elimination, learnt-clause attachment, satisfied-clause
//! removal, binary deduplication and strengthening goes through here.
//! Binary and text formats are both supported (spec.md §6); compressed
//! proof formats are explicitly out of scope (spec.md §1 Non-goals).
use crate::types::{Lit, LiteralEncoding};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

/// An append-only sink for DRAT proof steps. `None` when the solver is run
/// without `--certify` (spec.md §6's "optional collaborator").
pub enum DratTracer {
    Disabled,
    Binary(BufWriter<File>),
    Text(BufWriter<File>),
}

impl DratTracer {
    pub fn disabled() -> DratTracer {
        DratTracer::Disabled
    }

    pub fn open(path: &Path, ascii: bool) -> io::Result<DratTracer> {
        let f = BufWriter::new(File::create(path)?);
        Ok(if ascii { DratTracer::Text(f) } else { DratTracer::Binary(f) })
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, DratTracer::Disabled)
    }

    /// Append a clause addition step.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        self.write_step(b'a', lits);
    }

    /// Append a clause deletion step.
    pub fn delete_clause(&mut self, lits: &[Lit]) {
        self.write_step(b'd', lits);
    }

    pub fn add_unit(&mut self, l: Lit) {
        self.add_clause(&[l]);
    }

    pub fn add_binary(&mut self, a: Lit, b: Lit) {
        self.add_clause(&[a, b]);
    }

    pub fn add_empty(&mut self) {
        self.add_clause(&[]);
    }

    pub fn delete_binary(&mut self, a: Lit, b: Lit) {
        self.delete_clause(&[a, b]);
    }

    fn write_step(&mut self, tag: u8, lits: &[Lit]) {
        match self {
            DratTracer::Disabled => {}
            DratTracer::Text(w) => {
                let _ = write!(w, "{} ", if tag == b'd' { "d" } else { "" });
                for l in lits {
                    let _ = write!(w, "{} ", l.int());
                }
                let _ = writeln!(w, "0");
            }
            DratTracer::Binary(w) => {
                let _ = w.write_all(&[tag]);
                for l in lits {
                    let _ = write_binary_lit(w, l.int());
                }
                let _ = w.write_all(&[0]);
            }
        }
    }

    pub fn flush(&mut self) {
        match self {
            DratTracer::Disabled => {}
            DratTracer::Text(w) | DratTracer::Binary(w) => {
                let _ = w.flush();
            }
        }
    }
}

/// Binary DRAT encodes a signed literal as `2|x| + (x<0)`, then varint
/// (base-128, low-to-high, continuation in the high bit) -- the standard
/// `drat-trim` binary format.
fn write_binary_lit(w: &mut impl Write, x: i32) -> io::Result<()> {
    let mut u = if x < 0 { ((-x) as u32) * 2 + 1 } else { (x as u32) * 2 };
    loop {
        let byte = (u & 0x7f) as u8;
        u >>= 7;
        if u == 0 {
            w.write_all(&[byte])?;
            break;
        } else {
            w.write_all(&[byte | 0x80])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::int2lit;

    #[test]
    fn disabled_tracer_does_nothing() {
        let mut t = DratTracer::disabled();
        assert!(!t.is_enabled());
        t.add_unit(int2lit(1));
        t.flush();
    }
}
