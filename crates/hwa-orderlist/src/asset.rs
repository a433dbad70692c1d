//! Out-of-line data kept at the tail of an order-list buffer.
//!
//! Entries are allocated downwards from the end of the buffer, each preceded by a 16-byte
//! header. Lookups go through an arena of entries linked in most-recently-used order, so
//! repeated cells and glyphs are found quickly and the header links in the buffer only serve
//! as a debugging aid.

use core::fmt;

/// Bytes of header in front of every asset payload.
pub const ASSET_HEADER_BYTES: usize = 16;

/// Type tag written into the asset header.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetTag(pub u32);

impl AssetTag {
    pub const IMAGE: Self = Self(0x6E8A_0100);
    pub const CHAR: Self = Self(0xA2C8_0000);
    pub const CLIP: Self = Self(0x19C1_0000);
    pub const CMM: Self = Self(0x880C_0000);
    pub const BLACK: Self = Self(0xC71A_0B00);
    pub const DITHER: Self = Self(0xE278_D100);
    pub const GAMMA: Self = Self(0x8AA8_0600);
    pub const USER: Self = Self(0xE205_0000);
    pub const CELL: Self = Self(0x11CE_0000);
    pub const PATTERN: Self = Self(0x287E_A709);
}

impl fmt::Debug for AssetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::IMAGE => "IMAGE",
            Self::CHAR => "CHAR",
            Self::CLIP => "CLIP",
            Self::CMM => "CMM",
            Self::BLACK => "BLACK",
            Self::DITHER => "DITHER",
            Self::GAMMA => "GAMMA",
            Self::USER => "USER",
            Self::CELL => "CELL",
            Self::PATTERN => "PATTERN",
            _ => return write!(f, "AssetTag({:#010x})", self.0),
        };
        f.write_str(name)
    }
}

/// Colorant plane, used to key generated color cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Plane {
    K,
    C,
    M,
    Y,
}

impl Plane {
    /// K, C, M, Y: the order of plane fields in commands.
    pub const KCMY: [Plane; 4] = [Plane::K, Plane::C, Plane::M, Plane::Y];

    pub const fn index(self) -> usize {
        match self {
            Self::K => 0,
            Self::C => 1,
            Self::M => 2,
            Self::Y => 3,
        }
    }
}

/// What an asset was made from. Together with an integer argument it identifies the asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetSource {
    DitherCache,
    ClipAsset,
    OneOff,
    Cell(Plane),
    Form(u64),
    Pattern(u64),
    Image(u64),
}

impl AssetSource {
    fn header_key(self) -> u32 {
        match self {
            Self::DitherCache => 1,
            Self::ClipAsset => 2,
            Self::OneOff => 3,
            Self::Cell(plane) => 0x10 + plane.index() as u32,
            Self::Form(id) | Self::Pattern(id) | Self::Image(id) => id as u32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssetHandle(u32);

/// A placed asset: where its payload is in the buffer and at which address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssetRef {
    pub handle: AssetHandle,
    /// Payload offset from the start of the buffer.
    pub offset: usize,
    pub len: usize,
    /// Payload address, based at the buffer's address.
    pub address: u32,
}

#[derive(Clone, Debug)]
struct Entry {
    source: AssetSource,
    arg: i32,
    tag: AssetTag,
    header: usize,
    len: usize,
    next: Option<AssetHandle>,
}

/// Size an asset of `len` payload bytes takes in the buffer.
pub const fn asset_size(len: usize) -> usize {
    ((len + 7) & !7) + ASSET_HEADER_BYTES
}

#[derive(Clone, Debug, Default)]
pub struct AssetTable {
    entries: Vec<Entry>,
    head: Option<AssetHandle>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = None;
    }

    /// Records an entry whose header starts at `header` and makes it most recently used.
    pub(crate) fn insert(
        &mut self,
        tag: AssetTag,
        source: AssetSource,
        arg: i32,
        header: usize,
        len: usize,
    ) -> AssetHandle {
        let handle = AssetHandle(self.entries.len() as u32);
        self.entries.push(Entry {
            source,
            arg,
            tag,
            header,
            len,
            next: self.head,
        });
        self.head = Some(handle);
        handle
    }

    /// Finds the entry for `(source, arg)` and moves it to the front of the MRU list.
    ///
    /// Returns the handle and, when the list changed, the handle whose link must be
    /// rewritten.
    pub(crate) fn find(
        &mut self,
        source: AssetSource,
        arg: i32,
    ) -> Option<(AssetHandle, Option<AssetHandle>)> {
        let mut parent: Option<AssetHandle> = None;
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            let entry = &self.entries[handle.0 as usize];
            let next = entry.next;
            if entry.source == source && entry.arg == arg {
                let relinked = parent.map(|parent| {
                    self.entries[parent.0 as usize].next = next;
                    self.entries[handle.0 as usize].next = self.head;
                    self.head = Some(handle);
                    parent
                });
                return Some((handle, relinked));
            }
            parent = cursor;
            cursor = next;
        }
        None
    }

    /// Handles from most to least recently used.
    pub fn mru(&self) -> impl Iterator<Item = AssetHandle> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let handle = cursor?;
            cursor = self.entries[handle.0 as usize].next;
            Some(handle)
        })
    }

    pub fn key(&self, handle: AssetHandle) -> (AssetSource, i32) {
        let entry = &self.entries[handle.0 as usize];
        (entry.source, entry.arg)
    }

    pub fn tag(&self, handle: AssetHandle) -> AssetTag {
        self.entries[handle.0 as usize].tag
    }

    pub(crate) fn payload(&self, handle: AssetHandle) -> (usize, usize) {
        let entry = &self.entries[handle.0 as usize];
        (entry.header + ASSET_HEADER_BYTES, entry.len)
    }

    /// Writes the in-buffer header of `handle`. `base` is the address of buffer byte 0.
    pub(crate) fn write_header(&self, buf: &mut [u8], base: u32, handle: AssetHandle) {
        let entry = &self.entries[handle.0 as usize];
        let next = entry
            .next
            .map(|n| base.wrapping_add(self.entries[n.0 as usize].header as u32))
            .unwrap_or(0);
        let h = &mut buf[entry.header..entry.header + ASSET_HEADER_BYTES];
        h[0..4].copy_from_slice(&next.to_be_bytes());
        h[4..8].copy_from_slice(&entry.source.header_key().to_be_bytes());
        h[8..12].copy_from_slice(&entry.arg.to_be_bytes());
        h[12..16].copy_from_slice(&entry.tag.0.to_be_bytes());
    }
}
