use std::collections::VecDeque;
use std::fmt::{self, Write as _};

use crate::error::{PoolError, Result};
use crate::guardian::{GuardianId, GuardianState, Ring, SegmentPair, Segments};
use crate::trace::{Direct, Rank, Ref, RefBarrier, Tracer};

/// Bytes one guarded reference takes in a ref segment.
pub const REF_SIZE: usize = 8;

/// Tells the client that a registered object became unreachable.
///
/// The guardian stays FINAL, keeping the object alive, until the message is handed back to
/// [`MrgPool::message_delete`].
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    guardian: GuardianId,
}

impl Message {
    pub fn guardian(&self) -> GuardianId {
        self.guardian
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub segments: usize,
    pub free: usize,
    pub prefinal: usize,
    /// Messages posted and not yet polled.
    pub queued: usize,
}

/// A pool of finalization guardians.
pub struct MrgPool<B: RefBarrier = Direct> {
    extend_by: usize,
    guardians_per_seg: usize,
    segment_limit: Option<usize>,
    segs: Segments,
    free: Ring,
    entry: Ring,
    messages: VecDeque<GuardianId>,
    barrier: B,
}

impl MrgPool {
    /// A pool growing by segments of `extend_by` bytes of references.
    pub fn new(extend_by: usize) -> Result<Self> {
        Self::with_barrier(extend_by, Direct)
    }
}

impl<B: RefBarrier> MrgPool<B> {
    pub fn with_barrier(extend_by: usize, barrier: B) -> Result<Self> {
        let guardians_per_seg = extend_by / REF_SIZE;
        if guardians_per_seg == 0 {
            return Err(PoolError::ExtendTooSmall {
                extend_by,
                ref_size: REF_SIZE,
            });
        }
        Ok(Self {
            extend_by,
            guardians_per_seg,
            segment_limit: None,
            segs: Segments::default(),
            free: Ring::default(),
            entry: Ring::default(),
            messages: VecDeque::new(),
            barrier,
        })
    }

    /// Caps the number of segment pairs the pool may create.
    pub fn with_segment_limit(mut self, limit: usize) -> Self {
        self.segment_limit = Some(limit);
        self
    }

    pub fn guardians_per_seg(&self) -> usize {
        self.guardians_per_seg
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            segments: self.segs.pairs.len(),
            free: self.free.len,
            prefinal: self.entry.len,
            queued: self.messages.len(),
        }
    }

    pub fn state(&self, id: GuardianId) -> Option<GuardianState> {
        self.segs.get(id).map(|link| link.state)
    }

    fn create_segment_pair(&mut self) -> Result<()> {
        let seg = self.segs.pairs.len();
        if let Some(limit) = self.segment_limit {
            if seg >= limit {
                return Err(PoolError::ResourceExhausted { limit });
            }
        }
        self.segs.pairs.push(SegmentPair::new(self.guardians_per_seg));
        for index in 0..self.guardians_per_seg {
            let id = GuardianId {
                seg: seg as u32,
                index: index as u32,
            };
            self.segs.push_back(&mut self.free, id);
        }
        tracing::debug!(seg, guardians = self.guardians_per_seg, "guardian segment pair created");
        Ok(())
    }

    /// Returns a guardian to the free ring with a null reference.
    fn init_free(&mut self, id: GuardianId) {
        self.segs.link_mut(id).state = GuardianState::Free;
        self.segs.push_back(&mut self.free, id);
        self.barrier.write(self.segs.ref_slot_mut(id), 0);
    }

    /// Guards `r`, growing the pool when no guardian is free.
    pub fn register(&mut self, r: Ref) -> Result<GuardianId> {
        if r == 0 {
            return Err(PoolError::NullRef);
        }
        if self.free.len == 0 {
            self.create_segment_pair()?;
        }
        let id = self
            .segs
            .pop_front(&mut self.free)
            .ok_or(PoolError::ResourceExhausted {
                limit: self.segs.pairs.len(),
            })?;
        debug_assert_eq!(self.segs.link(id).state, GuardianState::Free);
        self.segs.link_mut(id).state = GuardianState::Prefinal;
        self.segs.push_back(&mut self.entry, id);
        self.barrier.write(self.segs.ref_slot_mut(id), r);
        tracing::trace!(guardian = %id, r, "registered");
        Ok(id)
    }

    /// Stops guarding one registration of `r`.
    pub fn deregister(&mut self, r: Ref) -> Result<()> {
        let found = self.segs.pairs.iter().enumerate().find_map(|(seg, pair)| {
            pair.links
                .iter()
                .zip(&pair.refs)
                .position(|(link, slot)| {
                    link.state == GuardianState::Prefinal && self.barrier.read(slot) == r
                })
                .map(|index| GuardianId {
                    seg: seg as u32,
                    index: index as u32,
                })
        });
        let id = found.ok_or(PoolError::NotFound(r))?;
        self.segs.unlink(&mut self.entry, id);
        self.init_free(id);
        tracing::trace!(guardian = %id, r, "deregistered");
        Ok(())
    }

    /// Scans every guardian in use on behalf of `tracer`.
    ///
    /// At [`Rank::Final`], guardians whose objects are unreachable keep them alive and are
    /// finalized, once. Returns the number finalized by this scan.
    pub fn scan<T: Tracer + ?Sized>(&mut self, tracer: &mut T) -> usize {
        let mut finalized = 0;
        for seg in 0..self.segs.pairs.len() {
            for index in 0..self.guardians_per_seg {
                let id = GuardianId {
                    seg: seg as u32,
                    index: index as u32,
                };
                if self.segs.link(id).state == GuardianState::Free {
                    continue;
                }
                // The scan may touch the slots directly.
                let slot = self.segs.ref_slot_mut(id);
                if !tracer.fix(*slot) {
                    continue;
                }
                if tracer.rank() == Rank::Final {
                    if !tracer.is_reachable(slot) {
                        tracer.retain(slot);
                        if self.finalize(id) {
                            finalized += 1;
                        }
                    }
                } else {
                    tracer.retain(slot);
                }
            }
        }
        if finalized > 0 {
            tracing::debug!(finalized, queued = self.messages.len(), "guardians finalized");
        }
        finalized
    }

    fn finalize(&mut self, id: GuardianId) -> bool {
        if self.segs.link(id).state == GuardianState::Final {
            return false;
        }
        self.segs.unlink(&mut self.entry, id);
        self.segs.link_mut(id).state = GuardianState::Final;
        self.messages.push_back(id);
        true
    }

    /// Takes the oldest finalization message.
    pub fn poll_message(&mut self) -> Option<Message> {
        self.messages
            .pop_front()
            .map(|guardian| Message { guardian })
    }

    /// The reference a message finalizes.
    pub fn message_ref(&self, message: &Message) -> Result<Ref> {
        match self.segs.get(message.guardian) {
            Some(link) if link.state == GuardianState::Final => {
                Ok(self.barrier.read(self.segs.ref_slot(message.guardian)))
            }
            _ => Err(PoolError::NotFinal(message.guardian)),
        }
    }

    /// Frees the guardian behind a message the client is done with.
    pub fn message_delete(&mut self, message: Message) -> Result<()> {
        let id = message.guardian;
        match self.segs.get(id) {
            Some(link) if link.state == GuardianState::Final => {
                self.init_free(id);
                Ok(())
            }
            _ => Err(PoolError::NotFinal(id)),
        }
    }

    /// Lists the entry queue, oldest registration first.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "  extendBy {}", self.extend_by);
        let _ = writeln!(out, "  Entry queue:");
        for id in self.segs.iter(&self.entry) {
            let r = self.barrier.read(self.segs.ref_slot(id));
            let _ = writeln!(out, "    at {id} Ref {r:#x}");
        }
        out
    }

    /// Releases every segment pair.
    pub fn finish(self) {
        if !self.messages.is_empty() {
            tracing::warn!(
                pending = self.messages.len(),
                "finishing guardian pool with undeleted messages"
            );
        }
        tracing::debug!(segments = self.segs.pairs.len(), "guardian pool finished");
    }
}

impl<B: RefBarrier> fmt::Debug for MrgPool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MrgPool")
            .field("extend_by", &self.extend_by)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
