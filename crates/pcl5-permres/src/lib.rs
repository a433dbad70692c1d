//! Persistence of permanent PCL5 resources.
//!
//! Macros and user-defined patterns marked permanent outlive the job that downloaded them.
//! Each family is written to its own stream through a [`ResourceStore`], as a run of records
//! described in [`record`]. [`DirStore`] keeps the streams as files in one directory and
//! [`MemoryStore`] keeps them in memory.

mod error;
pub mod record;
mod resource;
mod transfer;

pub use error::{PermResError, Result};
pub use record::{load_all, store_all};
pub use resource::{
    MacroData, MacroResource, Operation, PatternResource, Resource, ResourceDetail, ResourceKind,
    MACRO_DATA_BLOCK_SIZE, MACRO_NUMERIC_UNDEFINED, MAX_STRING_ID_LENGTH,
};
pub use transfer::{DirStore, MemoryStore, ResourceStore, Transfer};
