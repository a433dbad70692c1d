//! Guardian storage.
//!
//! Guardians are created a segment pair at a time. The link segment holds the state and ring
//! links, which only the pool touches; the ref segment holds the guarded references and is
//! what the collector scans.

use core::fmt;

use crate::trace::Ref;

/// Names a guardian by its segment pair and slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuardianId {
    pub seg: u32,
    pub index: u32,
}

impl fmt::Display for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seg, self.index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardianState {
    /// On the free ring, holding no reference.
    Free,
    /// Registered and on the entry ring, waiting for its object to become unreachable.
    Prefinal,
    /// Its object was found unreachable and a message is queued for it.
    Final,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Link {
    pub state: GuardianState,
    pub prev: Option<GuardianId>,
    pub next: Option<GuardianId>,
}

impl Link {
    const FREE: Self = Self {
        state: GuardianState::Free,
        prev: None,
        next: None,
    };
}

#[derive(Debug)]
pub(crate) struct SegmentPair {
    pub links: Vec<Link>,
    pub refs: Vec<Ref>,
}

impl SegmentPair {
    pub fn new(guardians: usize) -> Self {
        Self {
            links: vec![Link::FREE; guardians],
            refs: vec![0; guardians],
        }
    }
}

/// A doubly linked ring threaded through the guardians' links.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Ring {
    pub head: Option<GuardianId>,
    pub tail: Option<GuardianId>,
    pub len: usize,
}

/// The segment pairs, with ring operations over their links.
#[derive(Debug, Default)]
pub(crate) struct Segments {
    pub pairs: Vec<SegmentPair>,
}

impl Segments {
    pub fn link(&self, id: GuardianId) -> &Link {
        &self.pairs[id.seg as usize].links[id.index as usize]
    }

    pub fn link_mut(&mut self, id: GuardianId) -> &mut Link {
        &mut self.pairs[id.seg as usize].links[id.index as usize]
    }

    pub fn get(&self, id: GuardianId) -> Option<&Link> {
        self.pairs.get(id.seg as usize)?.links.get(id.index as usize)
    }

    pub fn ref_slot(&self, id: GuardianId) -> &Ref {
        &self.pairs[id.seg as usize].refs[id.index as usize]
    }

    pub fn ref_slot_mut(&mut self, id: GuardianId) -> &mut Ref {
        &mut self.pairs[id.seg as usize].refs[id.index as usize]
    }

    pub fn push_back(&mut self, ring: &mut Ring, id: GuardianId) {
        let tail = ring.tail;
        let link = self.link_mut(id);
        link.prev = tail;
        link.next = None;
        match tail {
            Some(tail) => self.link_mut(tail).next = Some(id),
            None => ring.head = Some(id),
        }
        ring.tail = Some(id);
        ring.len += 1;
    }

    pub fn unlink(&mut self, ring: &mut Ring, id: GuardianId) {
        let link = self.link_mut(id);
        let (prev, next) = (link.prev.take(), link.next.take());
        match prev {
            Some(prev) => self.link_mut(prev).next = next,
            None => ring.head = next,
        }
        match next {
            Some(next) => self.link_mut(next).prev = prev,
            None => ring.tail = prev,
        }
        ring.len -= 1;
    }

    pub fn pop_front(&mut self, ring: &mut Ring) -> Option<GuardianId> {
        let head = ring.head?;
        self.unlink(ring, head);
        Some(head)
    }

    /// Guardians of `ring` from head to tail.
    pub fn iter<'a>(&'a self, ring: &Ring) -> impl Iterator<Item = GuardianId> + 'a {
        let mut at = ring.head;
        core::iter::from_fn(move || {
            let id = at?;
            at = self.link(id).next;
            Some(id)
        })
    }
}
