//! Band bookkeeping for the buffer currently being filled.
//!
//! A buffer always holds a contiguous run of bands `first..=last`. Only `last` may be
//! incomplete, and only when the buffer is submitted because it filled up mid-band; the next
//! buffer then starts by re-opening that band.

use crate::api::{ApiError, BandAddresses};
use crate::error::{HwaError, Result};

/// Marks `first`/`last` as unset.
pub const NO_BAND: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandState {
    pub first: i32,
    pub last: i32,
    /// Whether `last` was finished in an earlier buffer.
    pub complete: bool,
    /// A `BAND_INIT` was emitted in the current buffer and the band has not ended yet.
    pub open: bool,
}

impl Default for BandState {
    fn default() -> Self {
        Self {
            first: NO_BAND,
            last: NO_BAND,
            complete: false,
            open: false,
        }
    }
}

impl BandState {
    pub fn has_bands(&self) -> bool {
        self.first != NO_BAND
    }

    /// Whether `band` continues the run held by the current buffer.
    ///
    /// A completed `last` is followed by `last + 1`; an incomplete one continues with itself.
    pub fn continues(&self, band: i32) -> bool {
        !self.has_bands() || band == self.last + i32::from(self.complete)
    }

    /// Updates the range after the buffer holding it was submitted.
    pub fn submitted(&mut self, complete: bool) {
        if complete {
            self.first = NO_BAND;
            self.last = NO_BAND;
        } else {
            self.first = self.last;
        }
    }
}

/// Progress of a band-memory request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BandRetry {
    #[default]
    NotTried,
    /// The buffer was already flushed once to free band memory.
    Retried,
}

/// What to do after asking the source for band memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BandStep {
    Ready(BandAddresses),
    /// Submit what the buffer holds, start a new one and ask again.
    FlushAndRetry,
}

/// Decides how to proceed after `get_bands` for `band` returned `outcome`.
///
/// Running out of band memory is recoverable once, by flushing the bands held by the current
/// buffer. Everything else, and a second shortage, is fatal.
pub fn band_memory_retry(
    retry: &mut BandRetry,
    band: i32,
    outcome: core::result::Result<BandAddresses, ApiError>,
) -> Result<BandStep> {
    match (outcome, *retry) {
        (Ok(addresses), _) => Ok(BandStep::Ready(addresses)),
        (Err(ApiError::Memory), BandRetry::NotTried) => {
            *retry = BandRetry::Retried;
            Ok(BandStep::FlushAndRetry)
        }
        (Err(ApiError::Memory), BandRetry::Retried) => Err(HwaError::BandMemory { band }),
        (Err(err), _) => Err(HwaError::Source {
            op: "get bands",
            err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_is_retried_once() {
        let mut retry = BandRetry::default();
        assert_eq!(
            band_memory_retry(&mut retry, 3, Err(ApiError::Memory)),
            Ok(BandStep::FlushAndRetry)
        );
        assert_eq!(retry, BandRetry::Retried);
        assert_eq!(
            band_memory_retry(&mut retry, 3, Err(ApiError::Memory)),
            Err(HwaError::BandMemory { band: 3 })
        );
    }

    #[test]
    fn other_failures_are_fatal_at_once() {
        for err in [
            ApiError::Error,
            ApiError::Unknown,
            ApiError::Syntax,
            ApiError::InUse,
        ] {
            let mut retry = BandRetry::NotTried;
            assert_eq!(
                band_memory_retry(&mut retry, 0, Err(err)),
                Err(HwaError::Source {
                    op: "get bands",
                    err
                })
            );
            assert_eq!(retry, BandRetry::NotTried);
        }
    }

    #[test]
    fn addresses_after_retry() {
        let mut retry = BandRetry::Retried;
        let addresses = BandAddresses { bands: [1, 2, 3, 4] };
        assert_eq!(
            band_memory_retry(&mut retry, 0, Ok(addresses)),
            Ok(BandStep::Ready(addresses))
        );
    }

    #[test]
    fn contiguity() {
        let mut state = BandState::default();
        assert!(state.continues(7));

        state.first = 0;
        state.last = 2;
        state.complete = true;
        assert!(state.continues(3));
        assert!(!state.continues(4));

        state.complete = false;
        assert!(state.continues(2));
        state.submitted(false);
        assert_eq!((state.first, state.last), (2, 2));
        state.submitted(true);
        assert!(!state.has_bands());
    }
}
