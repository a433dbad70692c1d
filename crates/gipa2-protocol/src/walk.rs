//! Traversal of the `COM_HEAD` chain.
//!
//! Command blocks are not necessarily laid out in chain order: a block ends with
//! `COM_BLOCK_END` and execution continues at the address stored in the block's
//! `COM_HEAD.next`. A zero link ends the list.

use crate::error::{ProtocolError, Result};
use crate::layout::CommandLayout;
use crate::opcode::Opcode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub offset: usize,
    pub layout: CommandLayout,
}

/// Position in a command buffer, detached from the buffer so the caller may rewrite each
/// command between steps.
///
/// The `next` link of a `COM_HEAD` is captured when the head is stepped over, so rewriting
/// it afterwards does not affect the traversal.
#[derive(Clone, Copy, Debug)]
pub struct ChainCursor {
    base: u32,
    offset: Option<usize>,
    next: u32,
}

impl ChainCursor {
    /// `base` is the address byte 0 of the buffer was given when links were written.
    pub fn new(base: u32) -> Self {
        Self {
            base,
            offset: Some(0),
            next: 0,
        }
    }

    pub fn step(&mut self, buf: &[u8]) -> Option<Result<Step>> {
        let offset = self.offset?;

        let layout = match CommandLayout::probe(buf.get(offset..).unwrap_or(&[])) {
            Ok(layout) => layout,
            Err(err) => {
                self.offset = None;
                return Some(Err(match err {
                    ProtocolError::UnknownOpcode { opcode, .. } => {
                        ProtocolError::UnknownOpcode { opcode, offset }
                    }
                    other => other,
                }));
            }
        };

        self.offset = match layout.opcode {
            Opcode::ComHead => {
                let at = offset + CommandLayout::COM_HEAD_NEXT_OFFSET;
                self.next = u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
                Some(offset + layout.size_bytes)
            }
            Opcode::ComBlockEnd => {
                let next = std::mem::take(&mut self.next);
                if next == 0 {
                    None
                } else {
                    match self.resolve(next, buf.len()) {
                        Ok(target) => Some(target),
                        Err(err) => {
                            self.offset = None;
                            return Some(Err(err));
                        }
                    }
                }
            }
            _ => Some(offset + layout.size_bytes),
        };

        Some(Ok(Step { offset, layout }))
    }

    fn resolve(&self, address: u32, len: usize) -> Result<usize> {
        let target = address.wrapping_sub(self.base) as usize;
        if target >= len || target % CommandLayout::COM_HEAD_SIZE != 0 {
            return Err(ProtocolError::BadLink { address });
        }
        Ok(target)
    }
}

pub struct Walk<'a> {
    buf: &'a [u8],
    cursor: ChainCursor,
}

impl<'a> Iterator for Walk<'a> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.step(self.buf)
    }
}

/// Walks the command chain starting at byte 0 of `buf`.
pub fn walk(buf: &[u8], base: u32) -> Walk<'_> {
    Walk {
        buf,
        cursor: ChainCursor::new(base),
    }
}
