use thiserror::Error;

use crate::resource::ResourceKind;

pub type Result<T> = std::result::Result<T, PermResError>;

#[derive(Debug, Error)]
pub enum PermResError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{record} record cut short: moved {moved} of {wanted} bytes")]
    Short {
        record: &'static str,
        wanted: usize,
        moved: usize,
    },

    #[error("{field} of {value} does not fit the record")]
    TooLarge { field: &'static str, value: usize },

    #[error("{kind:?} resources have no record format")]
    Unsupported { kind: ResourceKind },

    #[error("pattern data holds {len} bytes, {height} rows of {stride} need {}", .height * .stride)]
    PatternData {
        len: usize,
        height: usize,
        stride: usize,
    },
}
