//! GIPA2 order-list layouts.
//!
//! An order list is a chain of big-endian command blocks. Each block starts with a
//! 16-byte aligned `COM_HEAD` whose `next` field points at the following block and ends
//! with `COM_BLOCK_END`. Data referenced by commands (dither cells, run lists, images)
//! lives outside the command stream and is referenced through 32-bit pointers.
//!
//! This crate provides:
//!
//! - [`Opcode`] and the flag constants used in command headers
//! - [`Command`]: typed commands with big-endian encode/decode
//! - [`CommandLayout`]: size and pointer-field probing for a raw command
//! - [`walk`]: a cursor over the `COM_HEAD` chain of a command buffer
//! - [`rop3_to_rop2`]: the ROP3 to ROP2 translation table

mod cmd;
mod error;
mod layout;
mod opcode;
mod rop;
mod walk;

pub use cmd::{
    BandInit, BitBlt, Command, DitherCell, DrawRun, RunRepeat, SetBrush, SetClip, SetColor,
    SetDitherSize, SetDitherStretchBlt, SetGamma, SetIndexColor, SetUserGamma, StretchBlt, YClip,
};
pub use error::{ProtocolError, Result};
pub use layout::CommandLayout;
pub use opcode::*;
pub use rop::{rop3_to_rop2, ROP2_INVALID, ROP3_TO_ROP2};
pub use walk::{walk, ChainCursor, Step, Walk};
