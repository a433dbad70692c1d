use thiserror::Error;

use crate::guardian::GuardianId;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("segment of {extend_by} bytes holds no guardians (a reference takes {ref_size})")]
    ExtendTooSmall { extend_by: usize, ref_size: usize },

    #[error("cannot register a null reference")]
    NullRef,

    #[error("segment limit of {limit} reached")]
    ResourceExhausted { limit: usize },

    #[error("no guardian is waiting to finalize {0:#x}")]
    NotFound(u64),

    #[error("guardian {0} has no finalization message")]
    NotFinal(GuardianId),
}
