//! Draw primitives: spans, blocks, glyphs and images.
//!
//! Each object is announced with [`HwaContext::prepare`], which brings the ROP, brush,
//! penetration color and clip up to date. The primitives that follow sync the fill color
//! before emitting their drawing command. When one of them has to start a new buffer, the
//! object's state and clip are sent again first.

use gipa2_protocol::{
    Command, CommandLayout as L, DrawRun, Opcode, Planes, RunRepeat, StretchBlt, YClip,
    GIPA2_IMAGE_CMYK, GIPA2_IMAGE_INDEXED, GIPA2_IMAGE_PLANES, GIPA2_IMAGE_RGB,
    GIPA2_IMAGE_TRANS, GIPA2_NOCOMP, ROP2_INVALID,
};

use crate::api::BufferSource;
use crate::asset::{asset_size, AssetSource, AssetTag};
use crate::cell::PackedColor;
use crate::clip::ClipState;
use crate::context::HwaContext;
use crate::error::{HwaError, Result};
use crate::geom::BBox;
use crate::gstate::{BrushPattern, ColorForm};

/// ROP3 that paints the source (or fill color) over the page.
pub const ROP3_SOURCE_COPY: u8 = 0xCC;

/// Largest image drawn as one stretch blit in each direction.
const MAX_IMAGE_COLS: u32 = 10239;
const MAX_IMAGE_ROWS: u32 = 16383;

/// Tile size for images over the limits. Widths are a multiple of 64 pixels.
const TILE_COLS: u32 = 10176;
const TILE_ROWS: u32 = 16383;

/// Whether the hardware draws an object or the renderer has to do it in software.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Draw {
    Hardware,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Spans and blocks.
    Fill,
    Char,
    Image,
}

/// A black and white brush selected by an object.
#[derive(Clone, Copy, Debug)]
pub struct BrushSpec<'a> {
    pub pattern: Option<&'a BrushPattern>,
    pub transparent: bool,
}

/// The attributes of a display-list object that reach the hardware.
#[derive(Clone, Copy, Debug)]
pub struct DrawObject<'a> {
    pub kind: ObjectKind,
    pub rop3: u8,
    /// `None` keeps the brush of the previous object; colored patterns are drawn by the
    /// renderer and never reach the hardware brush.
    pub brush: Option<BrushSpec<'a>>,
    pub source_transparent: bool,
    pub color: PackedColor,
    pub clip: ClipState<'a>,
}

impl<'a> DrawObject<'a> {
    pub fn new(kind: ObjectKind, color: PackedColor, clip: ClipState<'a>) -> Self {
        Self {
            kind,
            rop3: ROP3_SOURCE_COPY,
            brush: None,
            source_transparent: false,
            color,
            clip,
        }
    }
}

/// One run-length encoded glyph line, repeated `row_height` times.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RleLine {
    pub row_height: u32,
    /// `(skip, run)` pairs, each measured from the end of the previous run.
    pub spans: Vec<(i32, i32)>,
}

#[derive(Clone, Copy, Debug)]
pub enum GlyphForm<'a> {
    /// A packed 1-bit bitmap, drawn as an indexed stretch blit.
    Bitmap(&'a [u8]),
    Rle(&'a [RleLine]),
}

/// A cached character form placed at `x`, `y`.
#[derive(Clone, Copy, Debug)]
pub struct Glyph<'a> {
    /// Identifies the form, so a bitmap is stored once per buffer.
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub form: GlyphForm<'a>,
}

/// An expanded, orthogonal image section.
#[derive(Clone, Copy, Debug)]
pub struct ImageParams<'a> {
    pub id: u64,
    /// Device box the image covers.
    pub bbox: BBox,
    pub ncols: u32,
    pub nrows: u32,
    /// Components per pixel: 1 (gray), 3 (RGB) or 4 (CMYK).
    pub comps: u8,
    /// `nrows` rows of `ncols * comps` bytes, in image order.
    pub samples: &'a [u8],
    /// Image columns run right to left on the page.
    pub reverse_x: bool,
    /// Image rows run bottom to top on the page.
    pub reverse_y: bool,
    pub orthogonal: bool,
    pub knockout: bool,
}

impl ImageParams<'_> {
    fn row_len(&self) -> usize {
        self.ncols as usize * usize::from(self.comps)
    }

    /// Copies the tile at `left`, `top` of `cols` x `rows` pixels, in page order.
    fn write_tile(&self, out: &mut [u8], left: u32, top: u32, cols: u32, rows: u32) {
        let comps = usize::from(self.comps);
        let row_len = self.row_len();
        let tile_row = cols as usize * comps;
        for (r, dst) in out.chunks_exact_mut(tile_row).take(rows as usize).enumerate() {
            let page_row = top as usize + r;
            let src_row = if self.reverse_y {
                self.nrows as usize - 1 - page_row
            } else {
                page_row
            };
            let src = &self.samples[src_row * row_len..(src_row + 1) * row_len];
            if self.reverse_x {
                for (c, pixel) in dst.chunks_exact_mut(comps).enumerate() {
                    let col = self.ncols as usize - 1 - (left as usize + c);
                    pixel.copy_from_slice(&src[col * comps..(col + 1) * comps]);
                }
            } else {
                let start = left as usize * comps;
                dst.copy_from_slice(&src[start..start + tile_row]);
            }
        }
    }

    fn format(&self, s_trans: bool) -> (u8, Planes) {
        let (flags, planes) = match self.comps {
            3 => (GIPA2_IMAGE_RGB, Planes::CMYK),
            4 => (GIPA2_IMAGE_CMYK, Planes::CMYK),
            _ => (GIPA2_IMAGE_PLANES, Planes::K),
        };
        if s_trans {
            (flags | GIPA2_IMAGE_TRANS, planes)
        } else {
            (flags, planes)
        }
    }
}

fn wide_fill(ys: i32, ye: i32, xs: i32, xe: i32) -> bool {
    ys < 0 || ye > 32767 || xs < 0 || xe > 32767
}

/// Writes big-endian scanline coordinates.
struct ScanlineWriter<'a> {
    out: &'a mut [u8],
    pos: usize,
    wide: bool,
}

impl ScanlineWriter<'_> {
    fn put(&mut self, v: i32) {
        if self.wide {
            self.out[self.pos..self.pos + 4].copy_from_slice(&v.to_be_bytes());
            self.pos += 4;
        } else {
            self.out[self.pos..self.pos + 2].copy_from_slice(&(v as i16).to_be_bytes());
            self.pos += 2;
        }
    }
}

impl<S: BufferSource> HwaContext<S> {
    /// Brings the hardware state up to date for `object`.
    ///
    /// Images defer their clip to [`HwaContext::image`]. Returns [`Draw::Fallback`] when the
    /// ROP or the clip cannot be expressed.
    pub fn prepare(&mut self, object: &DrawObject<'_>) -> Result<Draw> {
        self.gstate.set_rop3(object.rop3);
        if self.gstate.desired.rop2 == ROP2_INVALID {
            tracing::warn!(rop3 = object.rop3, "ROP not supported by hardware");
            return Ok(Draw::Fallback);
        }
        if let Some(brush) = object.brush {
            self.gstate.set_brush(brush.pattern, brush.transparent);
        }
        self.gstate.desired.s_trans = object.source_transparent;
        self.gstate.desired.color = object.color;
        self.gstate.desired.clip = object.clip.bbox;

        let kind = object.kind;
        let stretch = matches!(kind, ObjectKind::Char | ObjectKind::Image);
        let clip = object.clip;
        self.reserve(|ctx| {
            let mut required = ctx.state_required(stretch);
            if kind != ObjectKind::Image {
                required += ctx.clip_required(&clip, false);
            }
            required
        })?;

        self.state_update(stretch)?;
        if kind != ObjectKind::Image && !self.clip_update(&clip)? {
            return Ok(Draw::Fallback);
        }
        Ok(Draw::Hardware)
    }

    /// Fills row `y` from `xs` to `xe` inclusive.
    pub fn span(&mut self, y: i32, xs: i32, xe: i32) -> Result<()> {
        self.fill(y, y, xs, xe)
    }

    /// Fills rows `ys..=ye` from `xs` to `xe` inclusive.
    pub fn block(&mut self, ys: i32, ye: i32, xs: i32, xe: i32) -> Result<()> {
        self.fill(ys, ye, xs, xe)
    }

    fn fill(&mut self, ys: i32, ye: i32, xs: i32, xe: i32) -> Result<()> {
        if ye < ys || xe < xs {
            return Ok(());
        }
        let wide = wide_fill(ys, ye, xs, xe);
        self.reserve(|ctx| {
            RunRepeat::size_bytes(wide)
                + ctx.resync_required(false)
                + ctx.color_required(ColorForm::Cells)
        })?;
        self.resync(false)?;
        self.color_update(ColorForm::Cells)?;
        let rows = (i64::from(ye) - i64::from(ys) + 1) as u32;
        self.run_repeat(wide, ys, xs, xe, rows)
    }

    /// Emits a `DRAW_RUN_REPEAT`, extending the previous one when this run continues it.
    fn run_repeat(&mut self, wide: bool, y: i32, x0: i32, x1: i32, rows: u32) -> Result<()> {
        let buf = self.current()?;
        if let Some((offset, Opcode::DrawRunRepeat)) = buf.prev() {
            if let Command::RunRepeat(mut prev) = buf.command_at(offset)? {
                let total = u64::from(prev.rows) + u64::from(rows);
                let limit = if wide { u32::MAX.into() } else { u16::MAX.into() };
                if prev.wide == wide
                    && prev.x0 == x0
                    && prev.x1 == x1
                    && i64::from(y) == i64::from(prev.y) + i64::from(prev.rows)
                    && total <= limit
                {
                    prev.rows = total as u32;
                    return self
                        .current_mut()?
                        .rewrite(offset, &Command::RunRepeat(prev));
                }
            }
        }
        self.emit(&Command::RunRepeat(RunRepeat {
            wide,
            planes: Planes::CMYK,
            y,
            x0,
            x1,
            rows,
        }))?;
        Ok(())
    }

    /// Draws a cached character form. Glyphs entirely outside the clip are skipped.
    pub fn draw_char(&mut self, glyph: &Glyph<'_>) -> Result<()> {
        let clip = self.gstate.desired.clip;
        let (x, y) = (i64::from(glyph.x), i64::from(glyph.y));
        if x > i64::from(clip.x2)
            || y > i64::from(clip.y2)
            || x + i64::from(glyph.width) <= i64::from(clip.x1)
            || y + i64::from(glyph.height) <= i64::from(clip.y1)
        {
            return Ok(());
        }
        match glyph.form {
            GlyphForm::Bitmap(data) => self.bitmap_char(glyph, data),
            GlyphForm::Rle(lines) => self.rle_char(glyph, lines),
        }
    }

    fn bitmap_char(&mut self, glyph: &Glyph<'_>, data: &[u8]) -> Result<()> {
        let source = AssetSource::Form(glyph.id);
        self.reserve(|ctx| {
            let asset = match ctx.find_asset(source, 0) {
                Some(_) => 0,
                None => asset_size(data.len()),
            };
            L::STRETCHBLT_SIZE
                + asset
                + ctx.resync_required(true)
                + ctx.color_required(ColorForm::Indexed)
        })?;
        self.resync(true)?;

        let asset = match self.find_asset(source, 0) {
            Some(asset) => asset,
            None => {
                let asset = self.add_asset(
                    Opcode::DrawStretchBlt,
                    AssetTag::CHAR,
                    source,
                    data.len(),
                    0,
                )?;
                self.current_mut()?
                    .payload_mut(&asset)
                    .copy_from_slice(data);
                asset
            }
        };

        self.color_update(ColorForm::Indexed)?;
        let mut flags = GIPA2_IMAGE_CMYK | GIPA2_IMAGE_INDEXED;
        if self.gstate.desired.s_trans {
            flags |= GIPA2_IMAGE_TRANS;
        }
        self.emit(&Command::StretchBlt(StretchBlt {
            flags,
            planes: Planes::CMYK,
            src_width: glyph.width,
            src_height: glyph.height,
            width: glyph.width,
            height: glyph.height,
            x_scale: 65536,
            y_scale: 65536,
            x: glyph.x,
            y: glyph.y,
            x_offsets: [0; 4],
            y_offsets: [0; 4],
            data: asset.address,
        }))?;
        Ok(())
    }

    fn rle_char(&mut self, glyph: &Glyph<'_>, lines: &[RleLine]) -> Result<()> {
        let (x, y) = (i64::from(glyph.x), i64::from(glyph.y));
        let (right, bottom) = (x + i64::from(glyph.width), y + i64::from(glyph.height));
        let wide = x < -32768 || y < 0 || right > 32767 || bottom > 32767;

        let triples: usize = lines
            .iter()
            .map(|line| line.spans.len() * line.row_height as usize)
            .sum();
        let len = (1 + 3 * triples) * if wide { 4 } else { 2 };

        self.reserve(|ctx| {
            L::DRAW_RUN_YCLIP_SIZE
                + asset_size(len)
                + ctx.resync_required(false)
                + ctx.color_required(ColorForm::Cells)
        })?;
        self.resync(false)?;
        // Runs carry absolute positions, so the same form elsewhere needs its own asset.
        let asset = self.add_asset(
            Opcode::DrawRun,
            AssetTag::CHAR,
            AssetSource::Form(glyph.id),
            len,
            1,
        )?;
        let mut out = ScanlineWriter {
            out: self.current_mut()?.payload_mut(&asset),
            pos: 0,
            wide,
        };
        let mut row = glyph.y;
        for line in lines {
            let mut ex = glyph.x;
            for &(skip, run) in &line.spans {
                let sx = ex + skip;
                ex = sx + run;
                for r in 0..line.row_height as i32 {
                    out.put(row + r);
                    out.put(sx);
                    out.put(ex);
                }
            }
            row += line.row_height as i32;
        }
        out.put(-1);

        self.color_update(ColorForm::Cells)?;
        let yclip = (y >= -65535 && bottom <= 65535).then(|| YClip {
            y0: glyph.y,
            y1: bottom as i32,
        });
        self.emit(&Command::DrawRun(DrawRun {
            wide,
            compression: GIPA2_NOCOMP,
            planes: Planes::CMYK,
            scanlines: asset.address,
            yclip,
        }))?;
        Ok(())
    }

    /// Draws an image section clipped by `clip`, tiling images too large for one blit.
    ///
    /// Falls back for rotated, knockout and downscaled images, and for clips the hardware
    /// cannot represent.
    pub fn image(&mut self, image: &ImageParams<'_>, clip: &ClipState<'_>) -> Result<Draw> {
        if !image.orthogonal || image.knockout {
            return Ok(Draw::Fallback);
        }
        if !matches!(image.comps, 1 | 3 | 4) {
            tracing::warn!(comps = image.comps, "unexpected image components");
            return Ok(Draw::Fallback);
        }
        if image.samples.len() < image.row_len() * image.nrows as usize {
            tracing::warn!(
                id = image.id,
                len = image.samples.len(),
                "image samples shorter than image"
            );
            return Ok(Draw::Fallback);
        }
        let bbox = image.bbox.intersect(&clip.bbox);
        let (dest_w, dest_h) = (bbox.width(), bbox.height());
        if image.ncols == 0
            || image.nrows == 0
            || dest_w < i64::from(image.ncols)
            || dest_h < i64::from(image.nrows)
        {
            return Ok(Draw::Fallback);
        }

        let mut clip_size = self.clip_required(clip, true);
        if !self.gstate.clip.hwa1 {
            // The renderer clips the fallback itself; the hardware must not clip it again.
            self.reserve(|ctx| ctx.clip_required(clip, true))?;
            self.clip_update(clip)?;
            return Ok(Draw::Fallback);
        }

        let tiled = image.ncols > MAX_IMAGE_COLS || image.nrows > MAX_IMAGE_ROWS;
        let (tile_cols, tile_rows) = if tiled {
            (TILE_COLS, TILE_ROWS)
        } else {
            (image.ncols, image.nrows)
        };
        let xtiles = image.ncols.div_ceil(tile_cols);
        let (flags, planes) = image.format(self.gstate.desired.s_trans);
        let comps = usize::from(image.comps);
        let mut clip_it = true;

        let mut top = 0;
        for ytile in 0..image.nrows.div_ceil(tile_rows) {
            let rows = (image.nrows - top).min(tile_rows);
            let mut left = 0;
            for xtile in 0..xtiles {
                let cols = (image.ncols - left).min(tile_cols);
                let len = cols as usize * comps * rows as usize;
                let blit = L::STRETCHBLT_SIZE + asset_size(len);

                let required = blit + if clip_it { clip_size } else { 0 };
                if self.wont_fit(required)? {
                    // Everything about the hardware state was lost with the old buffer.
                    clip_it = true;
                    clip_size = self.clip_required(clip, true);
                    let required = blit + clip_size + self.state_required(true);
                    if !self.current()?.fits(required) {
                        return Err(HwaError::LimitCheck { required });
                    }
                    self.state_update(true)?;
                }
                if clip_it {
                    self.clip_update(clip)?;
                    clip_it = false;
                }

                let asset = self.add_asset(
                    Opcode::DrawStretchBlt,
                    AssetTag::IMAGE,
                    AssetSource::Image(image.id),
                    len,
                    (xtile + ytile * xtiles) as i32,
                )?;
                image.write_tile(self.current_mut()?.payload_mut(&asset), left, top, cols, rows);

                let scale = |dest: i64, total: u32, part: u32| {
                    let extent = (dest as f64 / f64::from(total) * f64::from(part)).ceil();
                    let offset = dest as f64 / f64::from(total);
                    (extent as i32, (65536.0 * extent / f64::from(part) + 0.5) as i32, offset)
                };
                let (width, x_scale, col_step) = scale(dest_w, image.ncols, cols);
                let (height, y_scale, row_step) = scale(dest_h, image.nrows, rows);

                self.emit(&Command::StretchBlt(StretchBlt {
                    flags,
                    planes,
                    src_width: cols as i32,
                    src_height: rows as i32,
                    width,
                    height,
                    x_scale,
                    y_scale,
                    x: bbox.x1 + (col_step * f64::from(left)).floor() as i32,
                    y: bbox.y1 + (row_step * f64::from(top)).floor() as i32,
                    x_offsets: [0; 4],
                    y_offsets: [0; 4],
                    data: asset.address,
                }))?;
                left += cols;
            }
            top += rows;
        }
        Ok(Draw::Hardware)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image(samples: &[u8], ncols: u32, nrows: u32, comps: u8) -> ImageParams<'_> {
        ImageParams {
            id: 1,
            bbox: BBox::new(0, 0, 99, 99),
            ncols,
            nrows,
            comps,
            samples,
            reverse_x: false,
            reverse_y: false,
            orthogonal: true,
            knockout: false,
        }
    }

    #[test]
    fn fill_width_selection() {
        assert!(!wide_fill(100, 100, 0, 10));
        assert!(wide_fill(40000, 40000, 0, 10));
        assert!(wide_fill(0, 32768, 0, 10));
        assert!(wide_fill(-1, 5, 0, 10));
        assert!(wide_fill(0, 0, 0, 32768));
    }

    #[test]
    fn reversed_tiles_keep_pixel_components() {
        let samples = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut img = image(&samples, 2, 2, 3);
        img.reverse_x = true;
        let mut out = [0u8; 12];
        img.write_tile(&mut out, 0, 0, 2, 2);
        assert_eq!(out, [4, 5, 6, 1, 2, 3, 10, 11, 12, 7, 8, 9]);

        img.reverse_x = false;
        img.reverse_y = true;
        let mut out = [0u8; 3];
        img.write_tile(&mut out, 1, 0, 1, 1);
        assert_eq!(out, [10, 11, 12]);
    }

    #[test]
    fn image_formats() {
        let img = image(&[], 1, 1, 1);
        assert_eq!(img.format(false), (GIPA2_IMAGE_PLANES, Planes::K));
        let img = image(&[], 1, 1, 3);
        assert_eq!(
            img.format(true),
            (GIPA2_IMAGE_RGB | GIPA2_IMAGE_TRANS, Planes::CMYK)
        );
    }

    #[test]
    fn scanline_writer_narrow_and_wide() {
        let mut buf = [0u8; 6];
        let mut w = ScanlineWriter {
            out: &mut buf,
            pos: 0,
            wide: false,
        };
        w.put(1);
        w.put(-1);
        w.put(0x1234);
        assert_eq!(buf, [0, 1, 0xFF, 0xFF, 0x12, 0x34]);

        let mut buf = [0u8; 4];
        let mut w = ScanlineWriter {
            out: &mut buf,
            pos: 0,
            wide: true,
        };
        w.put(-2);
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFE]);
    }
}
