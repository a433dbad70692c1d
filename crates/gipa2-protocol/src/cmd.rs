//! Typed GIPA2 commands.
//!
//! All multi-byte fields are big-endian. Unused (`nop`) fields are always written as zero.

use crate::error::{ProtocolError, Result};
use crate::layout::CommandLayout as L;
use crate::opcode::*;

fn put_u16(buf: &mut [u8], offset: usize, v: u16) {
    buf[offset..offset + 2].copy_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_be_bytes());
}

fn put_i32(buf: &mut [u8], offset: usize, v: i32) {
    put_u32(buf, offset, v as u32);
}

fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn get_i32(buf: &[u8], offset: usize) -> i32 {
    get_u32(buf, offset) as i32
}

fn get_i16(buf: &[u8], offset: usize) -> i16 {
    get_u16(buf, offset) as i16
}

fn get_4(buf: &[u8], offset: usize) -> [u8; 4] {
    [
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]
}

fn narrow_i16(field: &'static str, v: i32) -> Result<i16> {
    i16::try_from(v).map_err(|_| ProtocolError::FieldRange {
        field,
        value: v.into(),
    })
}

fn narrow_u16<T: Copy + Into<i64>>(field: &'static str, v: T) -> Result<u16> {
    let wide: i64 = v.into();
    u16::try_from(wide).map_err(|_| ProtocolError::FieldRange { field, value: wide })
}

/// Inclusive Y clip range carried by the `_YCLIP` / `2` forms of several commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YClip {
    pub y0: i32,
    pub y1: i32,
}

fn put_yclip(buf: &mut [u8], offset: usize, yclip: YClip) {
    put_i32(buf, offset, yclip.y0);
    put_i32(buf, offset + 4, yclip.y1);
}

fn get_yclip(buf: &[u8], offset: usize) -> YClip {
    YClip {
        y0: get_i32(buf, offset),
        y1: get_i32(buf, offset + 4),
    }
}

/// Band specification. Resets polygon clip and sets the rectangular clip to the band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandInit {
    pub planes: Planes,
    pub bit_depth: BitDepth,
    pub pixels: u32,
    pub bytes: u32,
    pub rows: u32,
    pub page_width: u32,
    pub page_height: u32,
    pub offset: u32,
    /// Band buffer addresses in K, C, M, Y order. 16-byte aligned.
    pub bands: [u32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunRepeat {
    /// Four-byte coordinates (`GIPA2_COORDS_ARE_4`).
    pub wide: bool,
    pub planes: Planes,
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
    pub rows: u32,
}

impl RunRepeat {
    pub const fn size_bytes(wide: bool) -> usize {
        if wide {
            L::RUN_REPEAT_4_SIZE
        } else {
            L::RUN_REPEAT_2_SIZE
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRun {
    /// Scanline triples are `i32` rather than `i16`.
    pub wide: bool,
    /// `GIPA2_NOCOMP` or `GIPA2_DLDE`.
    pub compression: u8,
    pub planes: Planes,
    pub scanlines: u32,
    pub yclip: Option<YClip>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitBlt {
    pub planes: Planes,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
    pub data: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StretchBlt {
    pub flags: u8,
    pub planes: Planes,
    pub src_width: i32,
    pub src_height: i32,
    pub width: i32,
    pub height: i32,
    pub x_scale: i32,
    pub y_scale: i32,
    pub x: i32,
    pub y: i32,
    /// Dither pattern offsets in K, C, M, Y order.
    pub x_offsets: [u8; 4],
    pub y_offsets: [u8; 4],
    pub data: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetColor {
    /// Foreground dither cells in K, C, M, Y order.
    pub fore: [u32; 4],
    pub back: Option<[u32; 4]>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DitherCell {
    pub width: u8,
    pub height: u8,
    pub size: i16,
    pub cell: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetDitherStretchBlt {
    /// `GIPA2_DITHER_*` flags without the Y clip bit, which follows `yclip`.
    pub flags: u8,
    /// Per-plane cells in K, C, M, Y order.
    pub cells: [DitherCell; 4],
    pub yclip: Option<YClip>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetGamma {
    pub flags: u8,
    pub toner_limit: i16,
    pub gamma: u32,
    pub black: u32,
    pub cmm: u32,
    /// Present for `SET_GAMMA_STRETCHBLT2`.
    pub yclip: Option<YClip>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetDitherSize {
    /// `(width, height)` in K, C, M, Y order.
    pub sizes: [(u8, u8); 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetClip {
    /// `GIPA2_CLIP_RECT`, `GIPA2_CLIP_RUN` or `GIPA2_CLIP_BITMAP`.
    pub kind: u8,
    pub wide: bool,
    pub limit: u8,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub data: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetIndexColor {
    pub c0: [u8; 4],
    pub c1: [u8; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetUserGamma {
    pub flags: u8,
    pub user: u32,
    pub yclip: Option<YClip>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetBrush {
    pub flags: u8,
    pub width: u8,
    pub height: u8,
    pub x_offset: u8,
    pub y_offset: u8,
    pub data: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ComHead { next: u32 },
    PageInit,
    BandInit(BandInit),
    RunRepeat(RunRepeat),
    DrawRun(DrawRun),
    BitBlt(BitBlt),
    StretchBlt(StretchBlt),
    SetRop2 { rop2: u8 },
    ResetClip,
    SetColor(SetColor),
    SetDitherStretchBlt(SetDitherStretchBlt),
    SetGamma(SetGamma),
    SetDitherSize(SetDitherSize),
    SetClip(SetClip),
    SetIndexColor(SetIndexColor),
    SetPenetrationColor { color: [u8; 4] },
    SetUserGamma(SetUserGamma),
    SetBrush(SetBrush),
    BandDma,
    ComBlockEnd,
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::ComHead { .. } => Opcode::ComHead,
            Self::PageInit => Opcode::PageInit,
            Self::BandInit(_) => Opcode::BandInit,
            Self::RunRepeat(_) => Opcode::DrawRunRepeat,
            Self::DrawRun(_) => Opcode::DrawRun,
            Self::BitBlt(_) => Opcode::DrawBitBlt,
            Self::StretchBlt(_) => Opcode::DrawStretchBlt,
            Self::SetRop2 { .. } => Opcode::SetRop2,
            Self::ResetClip => Opcode::ResetClip,
            Self::SetColor(_) => Opcode::SetColor,
            Self::SetDitherStretchBlt(_) => Opcode::SetDitherStretchBlt,
            Self::SetGamma(g) => {
                if g.yclip.is_some() {
                    Opcode::SetGammaStretchBlt2
                } else {
                    Opcode::SetGammaStretchBlt
                }
            }
            Self::SetDitherSize(_) => Opcode::SetDitherSize,
            Self::SetClip(_) => Opcode::SetClip,
            Self::SetIndexColor(_) => Opcode::SetIndexColor,
            Self::SetPenetrationColor { .. } => Opcode::SetPenetrationColor,
            Self::SetUserGamma(_) => Opcode::SetUserGammaStretchBlt,
            Self::SetBrush(_) => Opcode::SetBrush,
            Self::BandDma => Opcode::BandDma,
            Self::ComBlockEnd => Opcode::ComBlockEnd,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Self::ComHead { .. } => L::COM_HEAD_SIZE,
            Self::PageInit => L::PAGE_INIT_SIZE,
            Self::BandInit(_) => L::BAND_INIT_SIZE,
            Self::RunRepeat(r) => RunRepeat::size_bytes(r.wide),
            Self::DrawRun(r) => {
                if r.yclip.is_some() {
                    L::DRAW_RUN_YCLIP_SIZE
                } else {
                    L::DRAW_RUN_SIZE
                }
            }
            Self::BitBlt(_) => L::BITBLT_SIZE,
            Self::StretchBlt(_) => L::STRETCHBLT_SIZE,
            Self::SetRop2 { .. } => L::SET_ROP2_SIZE,
            Self::ResetClip => L::RESET_CLIP_SIZE,
            Self::SetColor(c) => {
                if c.back.is_some() {
                    L::SET_COLOR_BG_SIZE
                } else {
                    L::SET_COLOR_SIZE
                }
            }
            Self::SetDitherStretchBlt(d) => {
                if d.yclip.is_some() {
                    L::SET_DITHER_YCLIP_SIZE
                } else {
                    L::SET_DITHER_SIZE
                }
            }
            Self::SetGamma(g) => {
                if g.yclip.is_some() {
                    L::SET_GAMMA2_SIZE
                } else {
                    L::SET_GAMMA_SIZE
                }
            }
            Self::SetDitherSize(_) => L::SET_DITHER_SIZE_SIZE,
            Self::SetClip(c) => {
                if c.wide {
                    L::SET_CLIP_4_SIZE
                } else {
                    L::SET_CLIP_2_SIZE
                }
            }
            Self::SetIndexColor(_) => L::SET_INDEXCOLOR_SIZE,
            Self::SetPenetrationColor { .. } => L::SET_PENETRATIONCOLOR_SIZE,
            Self::SetUserGamma(u) => {
                if u.yclip.is_some() {
                    L::SET_USERGAMMA_YCLIP_SIZE
                } else {
                    L::SET_USERGAMMA_SIZE
                }
            }
            Self::SetBrush(_) => L::SET_BRUSH_SIZE,
            Self::BandDma => L::BAND_DMA_SIZE,
            Self::ComBlockEnd => L::COM_BLOCK_END_SIZE,
        }
    }

    /// Encodes the command into the front of `out`, returning the number of bytes written.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize> {
        let size = self.size_bytes();
        if out.len() < size {
            return Err(ProtocolError::Truncated {
                needed: size,
                available: out.len(),
            });
        }

        let buf = &mut out[..size];
        buf.fill(0);
        buf[0] = self.opcode() as u8;

        match self {
            Self::ComHead { next } => put_u32(buf, L::COM_HEAD_NEXT_OFFSET, *next),
            Self::PageInit | Self::ResetClip | Self::BandDma | Self::ComBlockEnd => {}
            Self::BandInit(b) => {
                buf[1] = b.planes.bits();
                buf[2] = b.bit_depth.code();
                put_u32(buf, 4, b.pixels);
                put_u32(buf, 8, b.bytes);
                put_u32(buf, 12, b.rows);
                put_u32(buf, 16, b.page_width);
                put_u32(buf, 20, b.page_height);
                put_u32(buf, 24, b.offset);
                for (i, band) in b.bands.iter().enumerate() {
                    put_u32(buf, 28 + i * 4, *band);
                }
            }
            Self::RunRepeat(r) => {
                buf[3] = r.planes.bits();
                if r.wide {
                    buf[1] = GIPA2_COORDS_ARE_4;
                    put_i32(buf, 4, r.y);
                    put_i32(buf, 8, r.x0);
                    put_i32(buf, 12, r.x1);
                    put_u32(buf, 16, r.rows);
                } else {
                    buf[1] = GIPA2_COORDS_ARE_2;
                    put_u16(buf, 4, narrow_i16("y", r.y)? as u16);
                    put_u16(buf, 6, narrow_i16("x0", r.x0)? as u16);
                    put_u16(buf, 8, narrow_i16("x1", r.x1)? as u16);
                    put_u16(buf, 10, narrow_u16("rows", r.rows)?);
                }
            }
            Self::DrawRun(r) => {
                buf[1] = if r.wide {
                    GIPA2_COORDS_ARE_4
                } else {
                    GIPA2_COORDS_ARE_2
                };
                buf[2] = r.compression & !GIPA2_YCLIP;
                buf[3] = r.planes.bits();
                put_u32(buf, 8, r.scanlines);
                if let Some(yclip) = r.yclip {
                    buf[2] |= GIPA2_YCLIP;
                    put_yclip(buf, 12, yclip);
                }
            }
            Self::BitBlt(b) => {
                buf[3] = b.planes.bits();
                put_i32(buf, 4, b.width);
                put_i32(buf, 8, b.height);
                put_i32(buf, 12, b.x);
                put_i32(buf, 16, b.y);
                put_u32(buf, 24, b.data);
            }
            Self::StretchBlt(s) => {
                buf[2] = s.flags;
                buf[3] = s.planes.bits();
                put_i32(buf, 4, s.src_width);
                put_i32(buf, 8, s.src_height);
                put_i32(buf, 12, s.width);
                put_i32(buf, 16, s.height);
                put_i32(buf, 24, s.x_scale);
                put_i32(buf, 28, s.y_scale);
                put_i32(buf, 32, s.x);
                put_i32(buf, 36, s.y);
                buf[40..44].copy_from_slice(&s.x_offsets);
                buf[44..48].copy_from_slice(&s.y_offsets);
                put_u32(buf, 52, s.data);
            }
            Self::SetRop2 { rop2 } => buf[1] = *rop2,
            Self::SetColor(c) => {
                for (i, cell) in c.fore.iter().enumerate() {
                    put_u32(buf, 4 + i * 4, *cell);
                }
                if let Some(back) = c.back {
                    buf[1] = GIPA2_COLOR_BG;
                    for (i, cell) in back.iter().enumerate() {
                        put_u32(buf, 20 + i * 4, *cell);
                    }
                }
            }
            Self::SetDitherStretchBlt(d) => {
                buf[1] = d.flags & !GIPA2_DITHER_YCLIP;
                for (i, cell) in d.cells.iter().enumerate() {
                    let base = 4 + i * 8;
                    buf[base] = cell.width;
                    buf[base + 1] = cell.height;
                    put_u16(buf, base + 2, cell.size as u16);
                    put_u32(buf, base + 4, cell.cell);
                }
                if let Some(yclip) = d.yclip {
                    buf[1] |= GIPA2_DITHER_YCLIP;
                    put_yclip(buf, 36, yclip);
                }
            }
            Self::SetGamma(g) => {
                buf[1] = g.flags;
                put_u16(buf, 2, g.toner_limit as u16);
                put_u32(buf, 4, g.gamma);
                put_u32(buf, 8, g.black);
                put_u32(buf, 12, g.cmm);
                if let Some(yclip) = g.yclip {
                    put_yclip(buf, 16, yclip);
                }
            }
            Self::SetDitherSize(d) => {
                for (i, (w, h)) in d.sizes.iter().enumerate() {
                    buf[4 + i * 2] = *w;
                    buf[5 + i * 2] = *h;
                }
            }
            Self::SetClip(c) => {
                buf[2] = c.limit;
                if c.wide {
                    buf[1] = c.kind | GIPA2_COORDS_ARE_4;
                    put_i32(buf, 4, c.x);
                    put_i32(buf, 8, c.y);
                    put_i32(buf, 12, c.width);
                    put_i32(buf, 16, c.height);
                    put_u32(buf, 24, c.data);
                } else {
                    buf[1] = c.kind | GIPA2_COORDS_ARE_2;
                    put_u16(buf, 4, narrow_u16("x", c.x)?);
                    put_u16(buf, 6, narrow_u16("y", c.y)?);
                    put_u16(buf, 8, narrow_u16("width", c.width)?);
                    put_u16(buf, 10, narrow_u16("height", c.height)?);
                    put_u32(buf, 16, c.data);
                }
            }
            Self::SetIndexColor(c) => {
                buf[4..8].copy_from_slice(&c.c0);
                buf[8..12].copy_from_slice(&c.c1);
            }
            Self::SetPenetrationColor { color } => buf[4..8].copy_from_slice(color),
            Self::SetUserGamma(u) => {
                buf[1] = u.flags & !GIPA2_USERGAMMA_YCLIP;
                put_u32(buf, 4, u.user);
                if let Some(yclip) = u.yclip {
                    buf[1] |= GIPA2_USERGAMMA_YCLIP;
                    put_yclip(buf, 8, yclip);
                }
            }
            Self::SetBrush(b) => {
                buf[1] = b.flags;
                buf[8] = b.width;
                buf[9] = b.height;
                buf[10] = b.x_offset;
                buf[11] = b.y_offset;
                put_u32(buf, 12, b.data);
            }
        }

        Ok(size)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.size_bytes()];
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decodes the command at the front of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let layout = L::probe(buf)?;
        let b = &buf[..layout.size_bytes];

        Ok(match layout.opcode {
            Opcode::ComHead => Self::ComHead {
                next: get_u32(b, L::COM_HEAD_NEXT_OFFSET),
            },
            Opcode::PageInit => Self::PageInit,
            Opcode::BandInit => Self::BandInit(BandInit {
                planes: Planes::from_bits_retain(b[1]),
                bit_depth: BitDepth::from_code(b[2]).ok_or(ProtocolError::FieldRange {
                    field: "bitdepth",
                    value: b[2].into(),
                })?,
                pixels: get_u32(b, 4),
                bytes: get_u32(b, 8),
                rows: get_u32(b, 12),
                page_width: get_u32(b, 16),
                page_height: get_u32(b, 20),
                offset: get_u32(b, 24),
                bands: [
                    get_u32(b, 28),
                    get_u32(b, 32),
                    get_u32(b, 36),
                    get_u32(b, 40),
                ],
            }),
            Opcode::DrawRunRepeat => {
                let planes = Planes::from_bits_retain(b[3]);
                if b[1] == GIPA2_COORDS_ARE_2 {
                    Self::RunRepeat(RunRepeat {
                        wide: false,
                        planes,
                        y: get_i16(b, 4).into(),
                        x0: get_i16(b, 6).into(),
                        x1: get_i16(b, 8).into(),
                        rows: get_u16(b, 10).into(),
                    })
                } else {
                    Self::RunRepeat(RunRepeat {
                        wide: true,
                        planes,
                        y: get_i32(b, 4),
                        x0: get_i32(b, 8),
                        x1: get_i32(b, 12),
                        rows: get_u32(b, 16),
                    })
                }
            }
            Opcode::DrawRun => Self::DrawRun(DrawRun {
                wide: b[1] != GIPA2_COORDS_ARE_2,
                compression: b[2] & !GIPA2_YCLIP,
                planes: Planes::from_bits_retain(b[3]),
                scanlines: get_u32(b, 8),
                yclip: (b[2] & GIPA2_YCLIP != 0).then(|| get_yclip(b, 12)),
            }),
            Opcode::DrawBitBlt => Self::BitBlt(BitBlt {
                planes: Planes::from_bits_retain(b[3]),
                width: get_i32(b, 4),
                height: get_i32(b, 8),
                x: get_i32(b, 12),
                y: get_i32(b, 16),
                data: get_u32(b, 24),
            }),
            Opcode::DrawStretchBlt => Self::StretchBlt(StretchBlt {
                flags: b[2],
                planes: Planes::from_bits_retain(b[3]),
                src_width: get_i32(b, 4),
                src_height: get_i32(b, 8),
                width: get_i32(b, 12),
                height: get_i32(b, 16),
                x_scale: get_i32(b, 24),
                y_scale: get_i32(b, 28),
                x: get_i32(b, 32),
                y: get_i32(b, 36),
                x_offsets: get_4(b, 40),
                y_offsets: get_4(b, 44),
                data: get_u32(b, 52),
            }),
            Opcode::SetRop2 => Self::SetRop2 { rop2: b[1] },
            Opcode::ResetClip => Self::ResetClip,
            Opcode::SetColor => {
                let fore = [
                    get_u32(b, 4),
                    get_u32(b, 8),
                    get_u32(b, 12),
                    get_u32(b, 16),
                ];
                let back = (b[1] != GIPA2_COLOR_NOBG).then(|| {
                    [
                        get_u32(b, 20),
                        get_u32(b, 24),
                        get_u32(b, 28),
                        get_u32(b, 32),
                    ]
                });
                Self::SetColor(SetColor { fore, back })
            }
            Opcode::SetDitherStretchBlt => {
                let mut cells = [DitherCell::default(); 4];
                for (i, cell) in cells.iter_mut().enumerate() {
                    let base = 4 + i * 8;
                    *cell = DitherCell {
                        width: b[base],
                        height: b[base + 1],
                        size: get_i16(b, base + 2),
                        cell: get_u32(b, base + 4),
                    };
                }
                Self::SetDitherStretchBlt(SetDitherStretchBlt {
                    flags: b[1] & !GIPA2_DITHER_YCLIP,
                    cells,
                    yclip: (b[1] & GIPA2_DITHER_YCLIP != 0).then(|| get_yclip(b, 36)),
                })
            }
            Opcode::SetGammaStretchBlt | Opcode::SetGammaStretchBlt2 => Self::SetGamma(SetGamma {
                flags: b[1],
                toner_limit: get_i16(b, 2),
                gamma: get_u32(b, 4),
                black: get_u32(b, 8),
                cmm: get_u32(b, 12),
                yclip: (layout.opcode == Opcode::SetGammaStretchBlt2).then(|| get_yclip(b, 16)),
            }),
            Opcode::SetDitherSize => Self::SetDitherSize(SetDitherSize {
                sizes: [(b[4], b[5]), (b[6], b[7]), (b[8], b[9]), (b[10], b[11])],
            }),
            Opcode::SetClip => {
                let kind = b[1] & !GIPA2_COORDS_ARE_4;
                if b[1] & GIPA2_COORDS_ARE_4 != 0 {
                    Self::SetClip(SetClip {
                        kind,
                        wide: true,
                        limit: b[2],
                        x: get_i32(b, 4),
                        y: get_i32(b, 8),
                        width: get_i32(b, 12),
                        height: get_i32(b, 16),
                        data: get_u32(b, 24),
                    })
                } else {
                    Self::SetClip(SetClip {
                        kind,
                        wide: false,
                        limit: b[2],
                        x: get_u16(b, 4).into(),
                        y: get_u16(b, 6).into(),
                        width: get_u16(b, 8).into(),
                        height: get_u16(b, 10).into(),
                        data: get_u32(b, 16),
                    })
                }
            }
            Opcode::SetIndexColor => Self::SetIndexColor(SetIndexColor {
                c0: get_4(b, 4),
                c1: get_4(b, 8),
            }),
            Opcode::SetPenetrationColor => Self::SetPenetrationColor {
                color: get_4(b, 4),
            },
            Opcode::SetUserGammaStretchBlt => Self::SetUserGamma(SetUserGamma {
                flags: b[1] & !GIPA2_USERGAMMA_YCLIP,
                user: get_u32(b, 4),
                yclip: (b[1] & GIPA2_USERGAMMA_YCLIP != 0).then(|| get_yclip(b, 8)),
            }),
            Opcode::SetBrush => Self::SetBrush(SetBrush {
                flags: b[1],
                width: b[8],
                height: b[9],
                x_offset: b[10],
                y_offset: b[11],
                data: get_u32(b, 12),
            }),
            Opcode::BandDma => Self::BandDma,
            Opcode::ComBlockEnd => Self::ComBlockEnd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn run_repeat_short_form_bytes() {
        let cmd = Command::RunRepeat(RunRepeat {
            wide: false,
            planes: Planes::CMYK,
            y: 100,
            x0: -2,
            x1: 300,
            rows: 3,
        });
        assert_eq!(
            cmd.to_vec().unwrap(),
            vec![0x25, 0, 0, 0x0F, 0, 100, 0xFF, 0xFE, 0x01, 0x2C, 0, 3]
        );
    }

    #[test]
    fn short_form_rejects_wide_values() {
        let cmd = Command::RunRepeat(RunRepeat {
            wide: false,
            planes: Planes::K,
            y: 40000,
            x0: 0,
            x1: 1,
            rows: 1,
        });
        assert_eq!(
            cmd.to_vec(),
            Err(ProtocolError::FieldRange {
                field: "y",
                value: 40000
            })
        );
    }

    #[test]
    fn yclip_forms_set_their_flag_bits() {
        let run = Command::DrawRun(DrawRun {
            wide: false,
            compression: GIPA2_NOCOMP,
            planes: Planes::CMYK,
            scanlines: 0x1000,
            yclip: Some(YClip { y0: 5, y1: 9 }),
        })
        .to_vec()
        .unwrap();
        assert_eq!(run.len(), 20);
        assert_eq!(run[2], GIPA2_YCLIP);

        let gamma = Command::SetGamma(SetGamma {
            flags: GIPA2_G2K,
            toner_limit: 1023,
            gamma: 0,
            black: 0,
            cmm: 0,
            yclip: Some(YClip { y0: 0, y1: 1 }),
        });
        assert_eq!(gamma.opcode(), Opcode::SetGammaStretchBlt2);
        assert_eq!(gamma.to_vec().unwrap().len(), 24);
    }

    #[test]
    fn encode_into_short_buffer_fails() {
        let mut out = [0u8; 8];
        assert_eq!(
            Command::ComHead { next: 0 }.encode(&mut out),
            Err(ProtocolError::Truncated {
                needed: 16,
                available: 8
            })
        );
    }
}
