use gipa2_protocol::{Opcode, ProtocolError};
use thiserror::Error;

use crate::api::ApiError;

pub type Result<T> = std::result::Result<T, HwaError>;

/// Errors that abort rendering of the current page.
///
/// Anything the hardware merely cannot draw is reported as [`crate::Draw::Fallback`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwaError {
    #[error("buffer source failed to {op}: {err}")]
    Source { op: &'static str, err: ApiError },

    #[error("bands {from}..={to} were already completed")]
    AlreadyComplete { from: i32, to: i32 },

    #[error("out of band memory for band {band} after flushing the buffer")]
    BandMemory { band: i32 },

    #[error("{required} bytes of commands and data do not fit an empty buffer")]
    LimitCheck { required: usize },

    #[error("{opcode} ({size} bytes) overflows the command area")]
    Overflow { opcode: Opcode, size: usize },

    #[error("asset of {len} bytes does not fit after space was reserved")]
    AssetAlloc { len: usize },

    #[error("command encoding failed: {0}")]
    Encode(#[source] ProtocolError),

    #[error("address relocation failed: {0}")]
    Relocate(#[source] ProtocolError),

    #[error("page of {width}x{height} with {band_height}-row bands cannot be banded")]
    BadPage {
        width: u32,
        height: u32,
        band_height: u32,
    },

    #[error("no order-list buffer is open")]
    NoBuffer,
}

impl HwaError {
    pub(crate) fn source(op: &'static str) -> impl FnOnce(ApiError) -> Self {
        move |err| Self::Source { op, err }
    }
}
