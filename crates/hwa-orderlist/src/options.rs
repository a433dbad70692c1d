//! Per-page configuration and the optional device tables.

use bitflags::bitflags;
use gipa2_protocol::BitDepth;

/// Address value meaning "do not relocate".
pub const NO_ADDRESS: u32 = 0xFFFF_FFFF;

/// Data address value meaning "place the data area on the first 4 KiB boundary after the
/// command area".
pub const AUTO_ADDRESS: u32 = 0xFFFF_FFFE;

/// Toner limits at or above this are not sent to the hardware.
pub const TONER_LIMIT_OFF: i32 = 1020;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HwaFlags: u32 {
        /// The whole page is rendered as one band with a single `BAND_INIT` in the setup block.
        const ALL_ONE_BAND = 0x2;
        /// Setup commands and tables are emitted after each `BAND_INIT` instead of once per
        /// buffer.
        const DEFER = 0x4;
        /// The target has no instruction memory, so bands end without `BAND_DMA`.
        const NO_IMEM = 0x8;
    }
}

/// One colorant plane of a cell table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellPlane {
    pub width: u8,
    pub height: u8,
    pub data: Vec<u8>,
    /// Device address of `data` when the table is preloaded.
    pub address: u32,
}

/// Dither thresholds or preloaded color cells, in K, C, M, Y order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellTable {
    pub planes: [CellPlane; 4],
    /// The hardware can read the planes at their `address` directly.
    pub accessible: bool,
}

impl CellTable {
    pub fn sizes(&self) -> [(u8, u8); 4] {
        let p = &self.planes;
        [0, 1, 2, 3].map(|i| (p[i].width, p[i].height))
    }
}

/// A lookup table (gamma, black generation, CMM or user gamma).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lut {
    pub data: Vec<u8>,
    /// Device address when the table is preloaded.
    pub address: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HwaTables {
    pub dither: Option<CellTable>,
    pub colors: Option<CellTable>,
    pub gamma: Option<Lut>,
    pub black: Option<Lut>,
    pub cmm: Option<Lut>,
    pub user: Option<Lut>,
    pub toner_limit: i32,
}

impl HwaTables {
    /// The dither table only counts when its K plane has data.
    pub fn dither(&self) -> Option<&CellTable> {
        self.dither
            .as_ref()
            .filter(|d| !d.planes[0].data.is_empty())
    }

    /// Preloaded color cells likewise need K data.
    pub fn colors(&self) -> Option<&CellTable> {
        self.colors
            .as_ref()
            .filter(|c| !c.planes[0].data.is_empty())
    }

    /// Cell sizes used for `SET_DITHER_SIZE` and generated color cells, in K, C, M, Y order.
    pub fn cell_sizes(&self) -> [(u8, u8); 4] {
        self.colors()
            .or_else(|| self.dither())
            .map_or([(16, 16); 4], CellTable::sizes)
    }

    pub fn has_gamma(&self) -> bool {
        self.gamma.is_some() || self.black.is_some() || self.cmm.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HwaOptions {
    pub flags: HwaFlags,
    /// Address the command area is loaded at, or [`NO_ADDRESS`].
    pub vcomad: u32,
    /// Address the data area is loaded at, [`AUTO_ADDRESS`] or [`NO_ADDRESS`].
    pub vdataad: u32,
    pub bit_depth: u32,
    pub tables: HwaTables,
}

impl Default for HwaOptions {
    fn default() -> Self {
        Self {
            flags: HwaFlags::empty(),
            vcomad: NO_ADDRESS,
            vdataad: NO_ADDRESS,
            bit_depth: 1,
            tables: HwaTables {
                toner_limit: 1023,
                ..HwaTables::default()
            },
        }
    }
}

impl HwaOptions {
    /// Normalises combinations the builder does not support.
    pub fn validate(mut self) -> Self {
        if self.flags.contains(HwaFlags::ALL_ONE_BAND) {
            self.flags.remove(HwaFlags::DEFER);
        }
        if self.vcomad == AUTO_ADDRESS {
            self.vcomad = NO_ADDRESS;
        }
        if self.vdataad == AUTO_ADDRESS && self.vcomad == NO_ADDRESS {
            self.vdataad = NO_ADDRESS;
        }
        if BitDepth::from_bits(self.bit_depth).is_none() {
            tracing::warn!(bit_depth = self.bit_depth, "unsupported bit depth, using 1");
            self.bit_depth = 1;
        }
        if !(255..=1023).contains(&self.tables.toner_limit) {
            self.tables.toner_limit = 1023;
        }
        self
    }

    pub fn depth(&self) -> BitDepth {
        BitDepth::from_bits(self.bit_depth).unwrap_or(BitDepth::One)
    }

    pub fn relocates(&self) -> bool {
        self.vcomad != NO_ADDRESS || self.vdataad != NO_ADDRESS
    }
}
