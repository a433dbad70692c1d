//! Permanent PCL5 resources as they are kept between jobs.

/// The persisted resource families, each in its own stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ResourceKind {
    Font = 0,
    SymbolSet = 1,
    /// User-defined patterns.
    Udp = 2,
    Macro = 3,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [Self::Font, Self::SymbolSet, Self::Udp, Self::Macro];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(usize::from(v)).copied()
    }

    /// File a directory store keeps this family in.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Font => "PCLFont.res",
            Self::SymbolSet => "PCLSymbolSet.res",
            Self::Udp => "PCLUDP.res",
            Self::Macro => "PCLMacro.res",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Store,
}

/// Macros named only by string carry this numeric id.
pub const MACRO_NUMERIC_UNDEFINED: u16 = 65535;

/// Longest string id PCL5 accepts.
pub const MAX_STRING_ID_LENGTH: usize = 253;

/// Macro data is held in blocks of this size.
pub const MACRO_DATA_BLOCK_SIZE: usize = 1024;

/// What every resource has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDetail {
    pub kind: ResourceKind,
    pub numeric_id: u16,
    /// Empty when the resource has no string id.
    pub string_id: Vec<u8>,
    pub permanent: bool,
}

impl ResourceDetail {
    pub fn numbered(kind: ResourceKind, numeric_id: u16) -> Self {
        Self {
            kind,
            numeric_id,
            string_id: Vec::new(),
            permanent: true,
        }
    }
}

/// Macro bytes in fixed-size blocks, filled in order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MacroData {
    blocks: Vec<Box<[u8; MACRO_DATA_BLOCK_SIZE]>>,
    total: usize,
}

impl MacroData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Appends `data`, adding blocks as they fill.
    pub fn extend_from_slice(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let used = self.total % MACRO_DATA_BLOCK_SIZE;
            if used == 0 && self.total / MACRO_DATA_BLOCK_SIZE == self.blocks.len() {
                self.blocks.push(Box::new([0; MACRO_DATA_BLOCK_SIZE]));
            }
            let Some(block) = self.blocks.last_mut() else {
                return;
            };
            let n = data.len().min(MACRO_DATA_BLOCK_SIZE - used);
            block[used..used + n].copy_from_slice(&data[..n]);
            self.total += n;
            data = &data[n..];
        }
    }

    /// The filled part of each block.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut remaining = self.total;
        self.blocks.iter().map(move |block| {
            let n = remaining.min(MACRO_DATA_BLOCK_SIZE);
            remaining -= n;
            &block[..n]
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.chunks().flatten().copied().collect()
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl core::fmt::Debug for MacroData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MacroData")
            .field("len", &self.total)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl From<&[u8]> for MacroData {
    fn from(data: &[u8]) -> Self {
        let mut out = Self::new();
        out.extend_from_slice(data);
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroResource {
    pub detail: ResourceDetail,
    pub data: MacroData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternResource {
    pub detail: ResourceDetail,
    pub width: u16,
    pub height: u16,
    pub x_dpi: u16,
    pub y_dpi: u16,
    /// Uses the palette rather than fixed black and white.
    pub color: bool,
    /// 1 for black and white, 1 or 8 for color.
    pub bits_per_pixel: u8,
    /// Bytes per row; rows are padded to a byte.
    pub stride: u16,
    /// `height` rows of `stride` bytes.
    pub data: Vec<u8>,
}

impl PatternResource {
    pub fn data_len(&self) -> usize {
        usize::from(self.height) * usize::from(self.stride)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Macro(MacroResource),
    Pattern(PatternResource),
}

impl Resource {
    pub fn detail(&self) -> &ResourceDetail {
        match self {
            Self::Macro(m) => &m.detail,
            Self::Pattern(p) => &p.detail,
        }
    }

    pub fn detail_mut(&mut self) -> &mut ResourceDetail {
        match self {
            Self::Macro(m) => &mut m.detail,
            Self::Pattern(p) => &mut p.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn macro_data_fills_blocks_in_order() {
        let bytes: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
        let mut data = MacroData::new();
        data.extend_from_slice(&bytes[..100]);
        data.extend_from_slice(&bytes[100..]);
        assert_eq!(data.len(), 2500);
        assert_eq!(data.block_count(), 3);
        let lens: Vec<_> = data.chunks().map(<[u8]>::len).collect();
        assert_eq!(lens, [1024, 1024, 452]);
        assert_eq!(data.to_vec(), bytes);
    }

    #[test]
    fn exact_block_multiple_adds_no_empty_block() {
        let data = MacroData::from(&[7u8; 2048][..]);
        assert_eq!(data.block_count(), 2);
        assert_eq!(MacroData::new().chunks().count(), 0);
    }

    #[test]
    fn kinds_map_to_files() {
        assert_eq!(ResourceKind::from_u8(2), Some(ResourceKind::Udp));
        assert_eq!(ResourceKind::from_u8(4), None);
        assert_eq!(ResourceKind::Macro.file_name(), "PCLMacro.res");
    }
}
