//! Mirror of the hardware's drawing state.
//!
//! The renderer's wishes (`desired`) are compared with what the order list last told the
//! hardware (`hw`), and only the differences are emitted. Every field follows the same
//! protocol: a `*_required` function sizes the commands and assets an update needs, the
//! caller reserves the sum once, then the `*_update` functions emit them in the same order.

use gipa2_protocol::{
    rop3_to_rop2, Command, CommandLayout as L, Opcode, SetBrush, SetClip, SetColor,
    SetIndexColor, GIPA2_BRUSH_OPAQUE, GIPA2_BRUSH_TRANS, GIPA2_CLIP_BITMAP, GIPA2_CLIP_RUN,
    ROP2_INVALID,
};

use crate::api::BufferSource;
use crate::asset::{asset_size, AssetRef, AssetSource, AssetTag, Plane};
use crate::cell::{
    cell_size, rgb_to_cmyk, threshold_cell, threshold_len, CellOptions, PackedColor, BAYER_16X16,
};
use crate::clip::{
    bitmap_plan, bitmap_words, make_bitmap, make_polygons, polygon_plan, ClipId, ClipPlan,
    ClipState, HwClip, POLYGON_HEADER_BYTES,
};
use crate::context::HwaContext;
use crate::error::{HwaError, Result};
use crate::geom::BBox;
use crate::options::HwaTables;

/// Side of the square brush pattern asset.
pub const PATTERN_SIZE: usize = 64;

/// Bytes of a brush pattern asset: 64 rows of 8 bytes.
pub const PATTERN_BYTES: usize = PATTERN_SIZE * PATTERN_SIZE / 8;

/// A black and white brush pattern of at most 64x64 pixels, tiled from the page origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrushPattern {
    /// Identifies the pattern across objects, so its asset is only built once per buffer.
    pub id: u64,
    pub width: u8,
    pub height: u8,
    /// Row-major, one byte per pixel; nonzero pixels are ink.
    pub pixels: Vec<u8>,
}

impl BrushPattern {
    /// Packs the pattern into the 64x64 mask the hardware reads: bit `1 << (x & 7)` of byte
    /// `y * 8 + x / 8` is set for ink.
    pub fn write_mask(&self, out: &mut [u8]) {
        out[..PATTERN_BYTES].fill(0);
        let w = usize::from(self.width).min(PATTERN_SIZE);
        let h = usize::from(self.height).min(PATTERN_SIZE);
        for y in 0..h {
            for x in 0..w {
                let ink = self
                    .pixels
                    .get(y * usize::from(self.width) + x)
                    .is_some_and(|&p| p != 0);
                if ink {
                    out[y * 8 + x / 8] |= 1 << (x & 7);
                }
            }
        }
    }
}

/// How a fill color reaches the hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorForm {
    /// Per-plane halftone cells through `SET_COLOR`.
    Cells,
    /// A CMYK value through `SET_INDEXCOLOR`, for indexed stretch blits.
    Indexed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Brush {
    pub pattern: Option<u64>,
    pub transparent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Desired {
    pub rop2: u8,
    pub color: PackedColor,
    pub brush: Brush,
    /// Source transparency: white source pixels leave the page alone.
    pub s_trans: bool,
    /// Render clip box of the current object.
    pub clip: BBox,
}

/// What the hardware was last told. `None` means unknown, so the next use re-sends it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Hardware {
    pub rop2: u8,
    pub color: Option<(PackedColor, ColorForm)>,
    pub brush: Option<Brush>,
    /// The penetration color for source-transparent blits was sent.
    pub pcolor: bool,
    pub clip: HwClip,
    pub rectclip: BBox,
}

/// Outcome of the last `clip_required`, consumed by `clip_update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ClipDecision {
    pub hwa1: bool,
    pub plan: Option<ClipPlan>,
}

/// A complex clip as it was loaded, so a new buffer can load it again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EncodedClip {
    pub loaded: HwClip,
    pub arg: i32,
    pub bbox: BBox,
    /// `data` holds the offset of the clip data within `bytes`.
    pub cmd: SetClip,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub(crate) struct GState {
    pub desired: Desired,
    pub hw: Hardware,
    pub clip: ClipDecision,
    /// Pixels of `desired.brush.pattern`.
    pub pattern: Option<BrushPattern>,
    /// Complex clip of the current object, `None` when it only has the render clip box.
    pub encoded: Option<EncodedClip>,
}

impl GState {
    pub fn new() -> Self {
        Self {
            desired: Desired {
                rop2: ROP2_INVALID,
                color: PackedColor::BLACK,
                brush: Brush {
                    pattern: None,
                    transparent: false,
                },
                s_trans: false,
                clip: BBox::EMPTY,
            },
            hw: Hardware {
                rop2: ROP2_INVALID,
                color: None,
                brush: None,
                pcolor: false,
                clip: HwClip::Invalid,
                rectclip: BBox::EMPTY,
            },
            clip: ClipDecision {
                hwa1: true,
                plan: None,
            },
            pattern: None,
            encoded: None,
        }
    }

    /// Forgets the hardware state, after a `BAND_INIT` or in a new buffer. What the current
    /// object wants is kept, so it can be sent again.
    pub fn reset(&mut self, band_clip: BBox) {
        self.hw.rop2 = ROP2_INVALID;
        self.hw.color = None;
        self.hw.brush = None;
        self.hw.pcolor = false;
        self.clip_reset(band_clip);
    }

    pub fn clip_reset(&mut self, band_clip: BBox) {
        self.hw.clip = HwClip::Invalid;
        self.hw.rectclip = band_clip;
    }

    pub fn set_rop3(&mut self, rop3: u8) {
        self.desired.rop2 = rop3_to_rop2(rop3);
    }

    pub fn set_brush(&mut self, pattern: Option<&BrushPattern>, transparent: bool) {
        let id = pattern.map(|p| p.id);
        if id != self.desired.brush.pattern {
            self.pattern = pattern.cloned();
        }
        self.desired.brush = Brush {
            pattern: id,
            transparent,
        };
    }
}

/// K, C, M, Y cell levels of `color`.
fn plane_levels(color: PackedColor) -> [u8; 4] {
    let [c, m, y, k] = rgb_to_cmyk(color);
    [k, c, m, y]
}

fn bayer_options(plane: Plane) -> CellOptions {
    match plane {
        Plane::C => CellOptions::empty(),
        Plane::M => CellOptions::REFLECT_X,
        Plane::Y => CellOptions::REFLECT_Y,
        Plane::K => CellOptions::REFLECT_X | CellOptions::REFLECT_Y,
    }
}

/// Builds the `level` cell of `plane` from the best source available: preloaded color
/// cells, the device dither thresholds, or the built-in Bayer matrix.
fn fill_cell(out: &mut [u8], tables: &HwaTables, plane: Plane, level: u8, bit_depth: u32) {
    let i = plane.index();
    let (w, h) = tables.cell_sizes()[i];
    let (w, h) = (u32::from(w), u32::from(h));

    if let Some(colors) = tables.colors() {
        let start = usize::from(level) * out.len();
        if let Some(cell) = colors.planes[i].data.get(start..start + out.len()) {
            out.copy_from_slice(cell);
            return;
        }
    }
    if let Some(dither) = tables.dither() {
        let thresholds = &dither.planes[i].data;
        if w <= 64 && thresholds.len() >= threshold_len(w, h, CellOptions::GIPA_ORDER) {
            threshold_cell(
                out,
                thresholds,
                w,
                h,
                bit_depth,
                level,
                CellOptions::GIPA_ORDER,
            );
            return;
        }
    }
    if out.len() >= cell_size(16, 16, bit_depth) {
        threshold_cell(
            out,
            &BAYER_16X16,
            16,
            16,
            bit_depth,
            level,
            bayer_options(plane),
        );
    } else {
        out.fill(0);
        tracing::warn!(?plane, level, w, h, "no usable thresholds for color cell");
    }
}

impl<S: BufferSource> HwaContext<S> {
    /// ROP, brush and, for stretch blits, penetration color.
    pub(crate) fn state_required(&mut self, stretch: bool) -> usize {
        let mut required = self.rop_required() + self.brush_required();
        if stretch {
            required += self.pcolor_required();
        }
        required
    }

    pub(crate) fn state_update(&mut self, stretch: bool) -> Result<()> {
        self.rop_update()?;
        self.brush_update()?;
        if stretch {
            self.pcolor_update()?;
        }
        Ok(())
    }

    /// What a primitive must send again when a new buffer was started under it: the state
    /// and complex clip of the current object. Zero while the hardware still has them.
    pub(crate) fn resync_required(&mut self, stretch: bool) -> usize {
        self.state_required(stretch) + self.encoded_clip_required()
    }

    pub(crate) fn resync(&mut self, stretch: bool) -> Result<()> {
        self.state_update(stretch)?;
        self.encoded_clip_update()
    }

    fn rop_stale(&self) -> bool {
        let rop2 = self.gstate.desired.rop2;
        rop2 != ROP2_INVALID && rop2 != self.gstate.hw.rop2
    }

    fn rop_required(&self) -> usize {
        if self.rop_stale() {
            L::SET_ROP2_SIZE
        } else {
            0
        }
    }

    fn rop_update(&mut self) -> Result<()> {
        if self.rop_stale() {
            let rop2 = self.gstate.desired.rop2;
            self.emit(&Command::SetRop2 { rop2 })?;
            self.gstate.hw.rop2 = rop2;
        }
        Ok(())
    }

    fn pcolor_required(&self) -> usize {
        if self.gstate.desired.s_trans && !self.gstate.hw.pcolor {
            L::SET_PENETRATIONCOLOR_SIZE
        } else {
            0
        }
    }

    /// Source-transparent blits skip white, CMYK zero.
    fn pcolor_update(&mut self) -> Result<()> {
        if self.gstate.desired.s_trans && !self.gstate.hw.pcolor {
            self.emit(&Command::SetPenetrationColor { color: [0; 4] })?;
            self.gstate.hw.pcolor = true;
        }
        Ok(())
    }

    fn brush_required(&mut self) -> usize {
        let want = self.gstate.desired.brush;
        if self.gstate.hw.brush == Some(want) {
            return 0;
        }
        let mut required = L::SET_BRUSH_SIZE;
        if let Some(id) = want.pattern {
            if self.find_asset(AssetSource::Pattern(id), 0).is_none() {
                required += asset_size(PATTERN_BYTES);
            }
        }
        required
    }

    fn brush_update(&mut self) -> Result<()> {
        let want = self.gstate.desired.brush;
        if self.gstate.hw.brush == Some(want) {
            return Ok(());
        }
        let pattern = self.gstate.pattern.take();
        let brush = self.brush_command(want, pattern.as_ref());
        self.gstate.pattern = pattern;

        self.emit(&Command::SetBrush(brush?))?;
        self.gstate.hw.brush = Some(want);
        Ok(())
    }

    fn brush_command(&mut self, want: Brush, pattern: Option<&BrushPattern>) -> Result<SetBrush> {
        let flags = if want.transparent {
            GIPA2_BRUSH_TRANS
        } else {
            GIPA2_BRUSH_OPAQUE
        };
        Ok(match pattern {
            Some(pattern) => {
                let asset = self.pattern_asset(pattern)?;
                SetBrush {
                    flags,
                    width: pattern.width.min(PATTERN_SIZE as u8),
                    height: pattern.height.min(PATTERN_SIZE as u8),
                    x_offset: 0,
                    y_offset: 0,
                    data: asset.address,
                }
            }
            None => SetBrush {
                flags,
                width: 0,
                height: 0,
                x_offset: 0,
                y_offset: 0,
                data: 0,
            },
        })
    }

    fn pattern_asset(&mut self, pattern: &BrushPattern) -> Result<AssetRef> {
        let source = AssetSource::Pattern(pattern.id);
        if let Some(asset) = self.find_asset(source, 0) {
            return Ok(asset);
        }
        let asset = self.add_asset(
            Opcode::SetBrush,
            AssetTag::PATTERN,
            source,
            PATTERN_BYTES,
            0,
        )?;
        pattern.write_mask(self.current_mut()?.payload_mut(&asset));
        Ok(asset)
    }

    fn plane_cell_size(&self, plane: Plane) -> usize {
        let (w, h) = self.options.tables.cell_sizes()[plane.index()];
        cell_size(u32::from(w), u32::from(h), self.options.depth().bits())
    }

    pub(crate) fn color_required(&mut self, form: ColorForm) -> usize {
        let color = self.gstate.desired.color;
        if self.gstate.hw.color == Some((color, form)) {
            return 0;
        }
        match form {
            ColorForm::Indexed => L::SET_INDEXCOLOR_SIZE,
            ColorForm::Cells => {
                let mut required = L::SET_COLOR_SIZE;
                if self.color_cells.is_none() {
                    let levels = plane_levels(color);
                    for plane in Plane::KCMY {
                        let level = i32::from(levels[plane.index()]);
                        if self.find_asset(AssetSource::Cell(plane), level).is_none() {
                            required += asset_size(self.plane_cell_size(plane));
                        }
                    }
                }
                required
            }
        }
    }

    pub(crate) fn color_update(&mut self, form: ColorForm) -> Result<()> {
        let color = self.gstate.desired.color;
        if self.gstate.hw.color == Some((color, form)) {
            return Ok(());
        }
        match form {
            ColorForm::Indexed => {
                self.emit(&Command::SetIndexColor(SetIndexColor {
                    c0: [0; 4],
                    c1: rgb_to_cmyk(color),
                }))?;
            }
            ColorForm::Cells => {
                let levels = plane_levels(color);
                let mut fore = [0u32; 4];
                for plane in Plane::KCMY {
                    let i = plane.index();
                    let level = levels[i];
                    fore[i] = match self.color_cells {
                        Some(bases) => bases[i]
                            .wrapping_add(u32::from(level) * self.plane_cell_size(plane) as u32),
                        None => self.color_cell(plane, level)?.address,
                    };
                }
                self.emit(&Command::SetColor(SetColor { fore, back: None }))?;
            }
        }
        self.gstate.hw.color = Some((color, form));
        Ok(())
    }

    fn color_cell(&mut self, plane: Plane, level: u8) -> Result<AssetRef> {
        let source = AssetSource::Cell(plane);
        if let Some(asset) = self.find_asset(source, i32::from(level)) {
            return Ok(asset);
        }
        let size = self.plane_cell_size(plane);
        let asset = self.add_asset(
            Opcode::SetColor,
            AssetTag::CELL,
            source,
            size,
            i32::from(level),
        )?;
        let bit_depth = self.options.depth().bits();
        let out = self
            .buf
            .as_mut()
            .ok_or(HwaError::NoBuffer)?
            .payload_mut(&asset);
        fill_cell(out, &self.options.tables, plane, level, bit_depth);
        Ok(asset)
    }

    /// Sizes the clip change `clip` needs and decides how to send it.
    ///
    /// `bmclip` allows a bitmap when the clip cannot be a run list. The decision is kept for
    /// the following [`HwaContext::clip_update`].
    pub(crate) fn clip_required(&mut self, clip: &ClipState<'_>, bmclip: bool) -> usize {
        let mut required = 0;
        let mut rectclip = self.gstate.hw.rectclip;
        self.gstate.clip = ClipDecision {
            hwa1: true,
            plan: None,
        };

        match clip.complex {
            Some(complex) if !self.gstate.hw.clip.matches(complex.id) => {
                let plan = polygon_plan(&complex.bbox, complex.mask)
                    .or_else(|| bmclip.then(|| bitmap_plan(&complex.bbox)).flatten());
                match plan {
                    Some(plan) => {
                        required += L::SET_CLIP_2_SIZE + asset_size(plan.size());
                        rectclip = complex.bbox;
                        self.gstate.clip.plan = Some(plan);
                    }
                    None => {
                        tracing::warn!(id = ?complex.id, bbox = ?complex.bbox, "clip not representable in hardware");
                        self.gstate.clip.hwa1 = false;
                        required += L::RESET_CLIP_SIZE;
                        rectclip = self.band_clip();
                    }
                }
            }
            Some(_) => {}
            None => {
                if self.gstate.hw.clip != HwClip::Invalid {
                    required += L::RESET_CLIP_SIZE;
                    rectclip = self.band_clip();
                }
            }
        }

        // Room for a rectangle clip on top. It is never sent, see `clip_update`.
        if rectclip != clip.bbox {
            required += L::SET_CLIP_4_SIZE;
        }
        required
    }

    /// Sends the clip change decided by the last [`HwaContext::clip_required`]. Returns
    /// whether the hardware can clip the object.
    pub(crate) fn clip_update(&mut self, clip: &ClipState<'_>) -> Result<bool> {
        let Some(complex) = clip.complex else {
            self.gstate.encoded = None;
            if self.gstate.hw.clip != HwClip::Invalid {
                self.reset_clip()?;
            }
            return Ok(true);
        };
        if self.gstate.hw.clip.matches(complex.id) {
            return Ok(true);
        }

        let bbox = complex.bbox;
        let (loaded, arg) = match complex.id {
            ClipId::Id(id) => (HwClip::Loaded(id), id),
            ClipId::MaskedImage => (HwClip::Faux, -1),
        };
        let decision = self.gstate.clip;
        let encoded = match decision.plan.filter(|_| decision.hwa1) {
            Some(ClipPlan::Polygons { spans, size }) => {
                let mut bytes = vec![0; size];
                make_polygons(&mut bytes, &bbox, complex.mask, spans);
                EncodedClip {
                    loaded,
                    arg,
                    bbox,
                    cmd: SetClip {
                        kind: GIPA2_CLIP_RUN,
                        wide: false,
                        limit: spans.trailing_zeros() as u8,
                        x: bbox.x1,
                        y: bbox.y1,
                        width: bbox.width() as i32,
                        height: bbox.height() as i32,
                        data: POLYGON_HEADER_BYTES as u32,
                    },
                    bytes,
                }
            }
            Some(ClipPlan::Bitmap { size }) => {
                let mut bytes = vec![0; size];
                make_bitmap(&mut bytes, &bbox, complex.mask);
                // Bitmaps are specific to one object, so they are never looked up again.
                EncodedClip {
                    loaded,
                    arg: -1,
                    bbox,
                    cmd: SetClip {
                        kind: GIPA2_CLIP_BITMAP,
                        wide: false,
                        limit: 0,
                        x: bbox.x1 & !63,
                        y: bbox.y1,
                        width: bitmap_words(&bbox),
                        height: bbox.height() as i32,
                        data: 0,
                    },
                    bytes,
                }
            }
            None => {
                self.gstate.encoded = None;
                self.reset_clip()?;
                return Ok(false);
            }
        };

        self.load_clip(&encoded)?;
        self.gstate.encoded = Some(encoded);
        Ok(true)
    }

    fn encoded_clip_required(&self) -> usize {
        match &self.gstate.encoded {
            Some(clip) if self.gstate.hw.clip != clip.loaded => {
                L::SET_CLIP_2_SIZE + asset_size(clip.bytes.len())
            }
            _ => 0,
        }
    }

    fn encoded_clip_update(&mut self) -> Result<()> {
        let Some(clip) = self.gstate.encoded.take() else {
            return Ok(());
        };
        let result = if self.gstate.hw.clip != clip.loaded {
            self.load_clip(&clip)
        } else {
            Ok(())
        };
        self.gstate.encoded = Some(clip);
        result
    }

    fn load_clip(&mut self, clip: &EncodedClip) -> Result<()> {
        let asset = self.add_asset(
            Opcode::SetClip,
            AssetTag::CLIP,
            AssetSource::ClipAsset,
            clip.bytes.len(),
            clip.arg,
        )?;
        self.current_mut()?
            .payload_mut(&asset)
            .copy_from_slice(&clip.bytes);
        self.emit(&Command::SetClip(SetClip {
            data: asset.address.wrapping_add(clip.cmd.data),
            ..clip.cmd
        }))?;
        self.gstate.hw.clip = clip.loaded;
        self.gstate.hw.rectclip = clip.bbox;
        Ok(())
    }

    fn reset_clip(&mut self) -> Result<()> {
        self.emit(&Command::ResetClip)?;
        let band_clip = self.band_clip();
        self.gstate.clip_reset(band_clip);
        Ok(())
    }
}
