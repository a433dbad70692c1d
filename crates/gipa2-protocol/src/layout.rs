use crate::error::{ProtocolError, Result};
use crate::opcode::*;

/// Size and pointer-field positions of one raw command.
///
/// Several commands have a long and a short form selected by a flag byte in the first word,
/// so the size can only be known by looking at the command itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandLayout {
    pub opcode: Opcode,
    pub size_bytes: usize,
    /// Byte offsets (relative to the command) of 32-bit pointers into the data area.
    pub pointers: &'static [usize],
}

impl CommandLayout {
    /// Offset of `COM_HEAD.next`, the only pointer into the command area.
    pub const COM_HEAD_NEXT_OFFSET: usize = 4;

    pub const COM_HEAD_SIZE: usize = 16;
    pub const COM_BLOCK_END_SIZE: usize = 4;
    pub const BAND_DMA_SIZE: usize = 4;
    pub const PAGE_INIT_SIZE: usize = 12;
    pub const BAND_INIT_SIZE: usize = 44;
    pub const RUN_REPEAT_2_SIZE: usize = 12;
    pub const RUN_REPEAT_4_SIZE: usize = 20;
    pub const DRAW_RUN_SIZE: usize = 12;
    pub const DRAW_RUN_YCLIP_SIZE: usize = 20;
    pub const BITBLT_SIZE: usize = 28;
    pub const STRETCHBLT_SIZE: usize = 56;
    pub const SET_ROP2_SIZE: usize = 4;
    pub const RESET_CLIP_SIZE: usize = 4;
    pub const SET_COLOR_SIZE: usize = 20;
    pub const SET_COLOR_BG_SIZE: usize = 36;
    pub const SET_DITHER_SIZE: usize = 36;
    pub const SET_DITHER_YCLIP_SIZE: usize = 44;
    pub const SET_GAMMA_SIZE: usize = 16;
    pub const SET_GAMMA2_SIZE: usize = 24;
    pub const SET_DITHER_SIZE_SIZE: usize = 12;
    pub const SET_CLIP_2_SIZE: usize = 20;
    pub const SET_CLIP_4_SIZE: usize = 28;
    pub const SET_INDEXCOLOR_SIZE: usize = 12;
    pub const SET_PENETRATIONCOLOR_SIZE: usize = 8;
    pub const SET_USERGAMMA_SIZE: usize = 8;
    pub const SET_USERGAMMA_YCLIP_SIZE: usize = 16;
    pub const SET_BRUSH_SIZE: usize = 16;

    /// Probes the command starting at `buf[0]`.
    ///
    /// Only the first word is inspected to choose the form; the returned size is checked
    /// against the remaining buffer length.
    pub fn probe(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(ProtocolError::Truncated {
                needed: 4,
                available: buf.len(),
            });
        }

        let opcode = Opcode::from_u8(buf[0]).ok_or(ProtocolError::UnknownOpcode {
            opcode: buf[0],
            offset: 0,
        })?;
        let b1 = buf[1];
        let b2 = buf[2];

        let (size_bytes, pointers): (usize, &'static [usize]) = match opcode {
            Opcode::ComHead => (Self::COM_HEAD_SIZE, &[]),
            Opcode::PageInit => (Self::PAGE_INIT_SIZE, &[]),
            Opcode::BandInit => (Self::BAND_INIT_SIZE, &[]),
            Opcode::DrawRunRepeat => {
                if b1 == GIPA2_COORDS_ARE_2 {
                    (Self::RUN_REPEAT_2_SIZE, &[])
                } else {
                    (Self::RUN_REPEAT_4_SIZE, &[])
                }
            }
            Opcode::DrawRun => {
                if b2 & GIPA2_YCLIP != 0 {
                    (Self::DRAW_RUN_YCLIP_SIZE, &[8])
                } else {
                    (Self::DRAW_RUN_SIZE, &[8])
                }
            }
            Opcode::DrawBitBlt => (Self::BITBLT_SIZE, &[24]),
            Opcode::DrawStretchBlt => (Self::STRETCHBLT_SIZE, &[52]),
            Opcode::SetRop2 => (Self::SET_ROP2_SIZE, &[]),
            Opcode::ResetClip => (Self::RESET_CLIP_SIZE, &[]),
            Opcode::SetColor => {
                if b1 != GIPA2_COLOR_NOBG {
                    (Self::SET_COLOR_BG_SIZE, &[4, 8, 12, 16, 20, 24, 28, 32])
                } else {
                    (Self::SET_COLOR_SIZE, &[4, 8, 12, 16])
                }
            }
            Opcode::SetDitherStretchBlt => {
                if b1 & GIPA2_DITHER_YCLIP != 0 {
                    (Self::SET_DITHER_YCLIP_SIZE, &[8, 16, 24, 32])
                } else {
                    (Self::SET_DITHER_SIZE, &[8, 16, 24, 32])
                }
            }
            Opcode::SetGammaStretchBlt => (Self::SET_GAMMA_SIZE, &[4, 8, 12]),
            Opcode::SetGammaStretchBlt2 => (Self::SET_GAMMA2_SIZE, &[4, 8, 12]),
            Opcode::SetDitherSize => (Self::SET_DITHER_SIZE_SIZE, &[]),
            Opcode::SetClip => {
                if b1 & GIPA2_COORDS_ARE_4 != 0 {
                    (Self::SET_CLIP_4_SIZE, &[24])
                } else {
                    (Self::SET_CLIP_2_SIZE, &[16])
                }
            }
            Opcode::SetIndexColor => (Self::SET_INDEXCOLOR_SIZE, &[]),
            Opcode::SetPenetrationColor => (Self::SET_PENETRATIONCOLOR_SIZE, &[]),
            Opcode::SetUserGammaStretchBlt => {
                if b1 & GIPA2_USERGAMMA_YCLIP != 0 {
                    (Self::SET_USERGAMMA_YCLIP_SIZE, &[4])
                } else {
                    (Self::SET_USERGAMMA_SIZE, &[4])
                }
            }
            Opcode::SetBrush => (Self::SET_BRUSH_SIZE, &[12]),
            Opcode::BandDma => (Self::BAND_DMA_SIZE, &[]),
            Opcode::ComBlockEnd => (Self::COM_BLOCK_END_SIZE, &[]),
        };

        if buf.len() < size_bytes {
            return Err(ProtocolError::Truncated {
                needed: size_bytes,
                available: buf.len(),
            });
        }

        Ok(Self {
            opcode,
            size_bytes,
            pointers,
        })
    }
}
