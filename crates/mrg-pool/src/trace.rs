//! The collector's side of a scan.

/// An object reference as the collector sees it. Zero is null.
pub type Ref = u64;

/// Reference ranks, weakest last. Guardians are scanned at [`Rank::Final`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    Ambig,
    Exact,
    Final,
    Weak,
}

/// A trace in progress, as seen by a scanned pool.
pub trait Tracer {
    fn rank(&self) -> Rank;

    /// Whether `r` points into memory this trace condemned. Other references are left alone.
    fn fix(&mut self, r: Ref) -> bool;

    /// Whether the object at `r` has been reached so far, updating `r` if it moved.
    fn is_reachable(&mut self, r: &mut Ref) -> bool;

    /// Keeps the object at `r` alive, updating `r` if it moved.
    fn retain(&mut self, r: &mut Ref);
}

/// Access to reference slots outside a scan, where the collector may have them protected.
pub trait RefBarrier {
    fn read(&self, slot: &Ref) -> Ref;
    fn write(&self, slot: &mut Ref, value: Ref);
}

/// Plain loads and stores, for collectors that never protect the slots.
#[derive(Clone, Copy, Debug, Default)]
pub struct Direct;

impl RefBarrier for Direct {
    fn read(&self, slot: &Ref) -> Ref {
        *slot
    }

    fn write(&self, slot: &mut Ref, value: Ref) {
        *slot = value;
    }
}
