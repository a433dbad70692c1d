//! Rebasing of command links and data pointers before a buffer is handed over.
//!
//! Commands are written with pointers based at the buffer's own address. A consumer that
//! loads the command area at `vcomad` and the data area at `vdataad` needs them rebased:
//!
//! - `COM_HEAD.next` becomes `next - start + vcomad`;
//! - a data pointer into the asset area becomes `ptr - asset_start + vdataad`.
//!
//! Zero pointers, and pointers to tables outside the buffer, are left alone.

use core::ops::Range;

use gipa2_protocol::{ChainCursor, CommandLayout, Opcode, ProtocolError};

use crate::buffer::CommandBuffer;
use crate::options::{HwaOptions, AUTO_ADDRESS, NO_ADDRESS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// Address byte 0 of the buffer was given.
    pub start: u32,
    /// Addresses of the asset area as written.
    pub data: Range<u32>,
    pub vcomad: Option<u32>,
    pub vdataad: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelocationStats {
    pub links: usize,
    pub pointers: usize,
}

impl Relocation {
    /// The rebasing `options` call for on `buf`, or `None` when nothing moves.
    pub fn for_buffer(buf: &CommandBuffer, options: &HwaOptions) -> Option<Self> {
        if !options.relocates() {
            return None;
        }
        let vcomad = (options.vcomad != NO_ADDRESS).then_some(options.vcomad);
        let vdataad = match options.vdataad {
            NO_ADDRESS => None,
            AUTO_ADDRESS => {
                let cmds = ((buf.cmd_len() + 0xFFF) & !0xFFF) as u32;
                vcomad.map(|vcomad| vcomad.wrapping_add(cmds))
            }
            fixed => Some(fixed),
        };
        Some(Self {
            start: buf.address(),
            data: buf.address_of(buf.asset_offset())..buf.address_of(buf.capacity()),
            vcomad,
            vdataad,
        })
    }

    fn data_pointer(&self, ptr: u32) -> Option<u32> {
        let vdataad = self.vdataad?;
        (ptr != 0 && self.data.contains(&ptr))
            .then(|| ptr.wrapping_sub(self.data.start).wrapping_add(vdataad))
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn write_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

/// Rewrites every link and data pointer reachable along the `COM_HEAD` chain of `cmds`.
pub fn relocate(
    cmds: &mut [u8],
    reloc: &Relocation,
) -> Result<RelocationStats, ProtocolError> {
    let mut stats = RelocationStats::default();
    let mut cursor = ChainCursor::new(reloc.start);

    while let Some(step) = cursor.step(cmds) {
        let step = step?;
        if step.layout.opcode == Opcode::ComHead {
            let Some(vcomad) = reloc.vcomad else {
                continue;
            };
            let at = step.offset + CommandLayout::COM_HEAD_NEXT_OFFSET;
            let next = read_u32(cmds, at);
            if next != 0 {
                write_u32(cmds, at, next.wrapping_sub(reloc.start).wrapping_add(vcomad));
                stats.links += 1;
            }
            continue;
        }
        for &field in step.layout.pointers {
            let at = step.offset + field;
            if let Some(moved) = reloc.data_pointer(read_u32(cmds, at)) {
                write_u32(cmds, at, moved);
                stats.pointers += 1;
            }
        }
    }

    Ok(stats)
}
