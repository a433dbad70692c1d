use core::fmt;

use bitflags::bitflags;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    ComHead = 0x01,

    PageInit = 0x10,
    BandInit = 0x11,

    DrawRun = 0x22,
    DrawStretchBlt = 0x23,
    DrawBitBlt = 0x24,
    DrawRunRepeat = 0x25,

    SetRop2 = 0x31,
    ResetClip = 0x32,
    SetColor = 0x33,
    SetDitherStretchBlt = 0x34,
    SetGammaStretchBlt = 0x35,
    SetDitherSize = 0x36,
    SetClip = 0x37,
    SetIndexColor = 0x38,
    SetPenetrationColor = 0x39,
    SetUserGammaStretchBlt = 0x3A,
    SetGammaStretchBlt2 = 0x3B,

    SetBrush = 0x41,

    BandDma = 0x51,

    ComBlockEnd = 0xFF,
}

impl Opcode {
    pub const ALL: [Opcode; Self::COUNT] = [
        Opcode::ComHead,
        Opcode::PageInit,
        Opcode::BandInit,
        Opcode::DrawRun,
        Opcode::DrawStretchBlt,
        Opcode::DrawBitBlt,
        Opcode::DrawRunRepeat,
        Opcode::SetRop2,
        Opcode::ResetClip,
        Opcode::SetColor,
        Opcode::SetDitherStretchBlt,
        Opcode::SetGammaStretchBlt,
        Opcode::SetDitherSize,
        Opcode::SetClip,
        Opcode::SetIndexColor,
        Opcode::SetPenetrationColor,
        Opcode::SetUserGammaStretchBlt,
        Opcode::SetGammaStretchBlt2,
        Opcode::SetBrush,
        Opcode::BandDma,
        Opcode::ComBlockEnd,
    ];

    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::ComHead),
            0x10 => Some(Self::PageInit),
            0x11 => Some(Self::BandInit),
            0x22 => Some(Self::DrawRun),
            0x23 => Some(Self::DrawStretchBlt),
            0x24 => Some(Self::DrawBitBlt),
            0x25 => Some(Self::DrawRunRepeat),
            0x31 => Some(Self::SetRop2),
            0x32 => Some(Self::ResetClip),
            0x33 => Some(Self::SetColor),
            0x34 => Some(Self::SetDitherStretchBlt),
            0x35 => Some(Self::SetGammaStretchBlt),
            0x36 => Some(Self::SetDitherSize),
            0x37 => Some(Self::SetClip),
            0x38 => Some(Self::SetIndexColor),
            0x39 => Some(Self::SetPenetrationColor),
            0x3A => Some(Self::SetUserGammaStretchBlt),
            0x3B => Some(Self::SetGammaStretchBlt2),
            0x41 => Some(Self::SetBrush),
            0x51 => Some(Self::BandDma),
            0xFF => Some(Self::ComBlockEnd),
            _ => None,
        }
    }

    /// Dense index used by per-opcode counters.
    pub const fn index(self) -> usize {
        match self {
            Self::ComHead => 0,
            Self::PageInit => 1,
            Self::BandInit => 2,
            Self::DrawRun => 3,
            Self::DrawStretchBlt => 4,
            Self::DrawBitBlt => 5,
            Self::DrawRunRepeat => 6,
            Self::SetRop2 => 7,
            Self::ResetClip => 8,
            Self::SetColor => 9,
            Self::SetDitherStretchBlt => 10,
            Self::SetGammaStretchBlt => 11,
            Self::SetDitherSize => 12,
            Self::SetClip => 13,
            Self::SetIndexColor => 14,
            Self::SetPenetrationColor => 15,
            Self::SetUserGammaStretchBlt => 16,
            Self::SetGammaStretchBlt2 => 17,
            Self::SetBrush => 18,
            Self::BandDma => 19,
            Self::ComBlockEnd => 20,
        }
    }

    pub const COUNT: usize = 21;

    pub const fn name(self) -> &'static str {
        match self {
            Self::ComHead => "COM_HEAD",
            Self::PageInit => "PAGE_INIT",
            Self::BandInit => "BAND_INIT",
            Self::DrawRun => "DRAW_RUN",
            Self::DrawStretchBlt => "DRAW_STRETCHBLT",
            Self::DrawBitBlt => "DRAW_BITBLT",
            Self::DrawRunRepeat => "DRAW_RUN_REPEAT",
            Self::SetRop2 => "SET_ROP2",
            Self::ResetClip => "RESET_CLIP",
            Self::SetColor => "SET_COLOR",
            Self::SetDitherStretchBlt => "SET_DITHER_STRETCHBLT",
            Self::SetGammaStretchBlt => "SET_GAMMA_STRETCHBLT",
            Self::SetDitherSize => "SET_DITHER_SIZE",
            Self::SetClip => "SET_CLIP",
            Self::SetIndexColor => "SET_INDEXCOLOR",
            Self::SetPenetrationColor => "SET_PENETRATIONCOLOR",
            Self::SetUserGammaStretchBlt => "SET_USERGAMMA_STRETCHBLT",
            Self::SetGammaStretchBlt2 => "SET_GAMMA_STRETCHBLT2",
            Self::SetBrush => "SET_BRUSH",
            Self::BandDma => "BAND_DMA",
            Self::ComBlockEnd => "COM_BLOCK_END",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Colorant selection carried by `planes` fields. All zero is not allowed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Planes: u8 {
        const K = 1;
        const C = 2;
        const M = 4;
        const Y = 8;
        const CMY = 14;
        const CMYK = 15;
    }
}

/// Output bit depth code carried by `BAND_INIT`. 8-bit output is not supported.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitDepth {
    One = 0,
    Two = 1,
    Four = 2,
}

impl BitDepth {
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::One),
            1 => Some(Self::Two),
            2 => Some(Self::Four),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

pub const GIPA2_COORDS_ARE_2: u8 = 0;
pub const GIPA2_COORDS_ARE_4: u8 = 1;

/* DRAW_RUN */
pub const GIPA2_NOCOMP: u8 = 0;
pub const GIPA2_DLDE: u8 = 1;
pub const GIPA2_YCLIP: u8 = 128;

/* DRAW_STRETCHBLT */
pub const GIPA2_IMAGE_PLANES: u8 = 0x00;
pub const GIPA2_IMAGE_RGB: u8 = 0x21;
pub const GIPA2_IMAGE_CMY: u8 = 0x01;
pub const GIPA2_IMAGE_CMYK: u8 = 0x02;
pub const GIPA2_IMAGE_INDEXED: u8 = 0x10;
pub const GIPA2_IMAGE_BGR: u8 = 0x40;
pub const GIPA2_IMAGE_TRANS: u8 = 0x80;

/* SET_COLOR */
pub const GIPA2_COLOR_NOBG: u8 = 0;
pub const GIPA2_COLOR_BG: u8 = 1;

/* SET_DITHER_STRETCHBLT */
pub const GIPA2_DITHER_GE: u8 = 0;
pub const GIPA2_DITHER_GT: u8 = 1;
pub const GIPA2_DITHER_MINUS1: u8 = 2;
pub const GIPA2_DITHER_YCLIP: u8 = 4;

/* SET_USERGAMMA_STRETCHBLT */
pub const GIPA2_USERGAMMA: u8 = 1;
pub const GIPA2_USERGAMMA_YCLIP: u8 = 2;

/* SET_GAMMA_STRETCHBLT(2) */
pub const GIPA2_BGUCR: u8 = 1;
pub const GIPA2_CMM: u8 = 2;
pub const GIPA2_TONERLIMIT: u8 = 4;
pub const GIPA2_GAMMA: u8 = 8;
pub const GIPA2_TONERMASS: u8 = 16;
pub const GIPA2_POSTCMMGRAY: u8 = 32;
pub const GIPA2_PRECMMGRAY: u8 = 64;
pub const GIPA2_G2K: u8 = 128;

/* SET_CLIP, orred with GIPA2_COORDS_ARE_2 or GIPA2_COORDS_ARE_4 */
pub const GIPA2_CLIP_RECT: u8 = 0x00;
pub const GIPA2_CLIP_RUN: u8 = 0x10;
pub const GIPA2_CLIP_BITMAP: u8 = 0x20;

/* SET_CLIP run limits: spans per scanline */
pub const GIPA2_CLIP_RUN_1: u8 = 0;
pub const GIPA2_CLIP_RUN_2: u8 = 1;
pub const GIPA2_CLIP_RUN_4: u8 = 2;
pub const GIPA2_CLIP_RUN_8: u8 = 3;
pub const GIPA2_CLIP_RUN_16: u8 = 4;

/* SET_BRUSH */
pub const GIPA2_BRUSH_OPAQUE: u8 = 0;
pub const GIPA2_BRUSH_TRANS: u8 = 1;
