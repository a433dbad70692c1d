//! Builds GIPA2 order lists for the hardware accelerator (HWA) of a printer controller.
//!
//! A renderer hands display-list objects to an [`HwaContext`] band by band. The context turns
//! them into commands and assets inside buffers borrowed from a [`BufferSource`], keeping a
//! mirror of the hardware graphics state so that only changes are sent, and submits each
//! buffer once it is full or the page is done.
//!
//! [`HostSource`] is a self-contained source with two buffers, useful for tests and for
//! producing FPGA dump files.

mod api;
mod asset;
mod band;
mod buffer;
mod cell;
mod clip;
mod context;
mod dump;
mod encode;
mod error;
mod geom;
mod gstate;
mod host;
mod metrics;
mod options;
mod relocate;
mod setup;

pub use api::{ApiError, BandAddresses, Buffer, BufferSource, PageToken, Submission};
pub use asset::{AssetRef, AssetSource, AssetTable, AssetTag};
pub use band::{BandState, NO_BAND};
pub use buffer::CommandBuffer;
pub use cell::{rgb_to_cmyk, rgb_to_gray, CellOptions, PackedColor};
pub use clip::{ClipId, ClipMask, ClipState, ComplexClip, SpanMask, MAX_CLIP_SPANS};
pub use context::{HwaContext, PageSetup, BAND_HEADROOM, HWA_MINIMUM};
pub use dump::{header, hex_words, DumpPage, FpgaDump, MemoryModel, FPGA_VCOMAD};
pub use encode::{
    BrushSpec, Draw, DrawObject, Glyph, GlyphForm, ImageParams, ObjectKind, RleLine,
    ROP3_SOURCE_COPY,
};
pub use error::{HwaError, Result};
pub use geom::BBox;
pub use gstate::{BrushPattern, ColorForm, PATTERN_BYTES, PATTERN_SIZE};
pub use host::{HostConfig, HostSource, Recorded, DEFAULT_BAND_BASES};
pub use metrics::{BufferStats, Metrics, OpcodeStats};
pub use options::{
    CellPlane, CellTable, HwaFlags, HwaOptions, HwaTables, Lut, AUTO_ADDRESS, NO_ADDRESS,
    TONER_LIMIT_OFF,
};
pub use relocate::{relocate, Relocation, RelocationStats};
