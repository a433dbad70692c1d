//! Complex clip encoding.
//!
//! The hardware clips against either a run list (at most 16 spans per row, stored as
//! "polygons") or a 1-bit mask whose rows are 64-pixel aligned. Run lists are preferred;
//! bitmaps are only used where the caller allows them (images).

use core::fmt;

use crate::geom::BBox;

/// Most spans per row a run-list clip can hold.
pub const MAX_CLIP_SPANS: u32 = 16;

/// Bytes in front of the run-list rows. The first `u16` is the span count per row.
pub const POLYGON_HEADER_BYTES: usize = 8;

/// Coverage of a complex clip.
pub trait ClipMask {
    /// Calls `span(xs, xe)` for each inside span of row `y` that intersects `x1..=x2`,
    /// clipped to that range, left to right.
    fn row_spans(&self, y: i32, x1: i32, x2: i32, span: &mut dyn FnMut(i32, i32));
}

/// A clip mask stored as inclusive spans per row, starting at row `y1`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpanMask {
    y1: i32,
    rows: Vec<Vec<(i32, i32)>>,
}

impl SpanMask {
    pub fn new(y1: i32, rows: Vec<Vec<(i32, i32)>>) -> Self {
        Self { y1, rows }
    }

    /// The same spans on every row of `y1..=y2`.
    pub fn repeated(y1: i32, y2: i32, spans: &[(i32, i32)]) -> Self {
        let rows = (y1..=y2).map(|_| spans.to_vec()).collect();
        Self { y1, rows }
    }
}

impl ClipMask for SpanMask {
    fn row_spans(&self, y: i32, x1: i32, x2: i32, span: &mut dyn FnMut(i32, i32)) {
        let Some(row) = y
            .checked_sub(self.y1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.rows.get(i))
        else {
            return;
        };
        for &(xs, xe) in row {
            let (xs, xe) = (xs.max(x1), xe.min(x2));
            if xs <= xe {
                span(xs, xe);
            }
        }
    }
}

/// Identity of a complex clip, used to skip re-sending a clip the hardware already has.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClipId {
    Id(i32),
    /// The clip of a masked image. It has no stable identity and never matches.
    MaskedImage,
}

#[derive(Clone, Copy)]
pub struct ComplexClip<'a> {
    pub id: ClipId,
    /// Bounding box of the clip coverage.
    pub bbox: BBox,
    pub mask: &'a dyn ClipMask,
}

impl<'a> ComplexClip<'a> {
    pub fn new(id: i32, bbox: BBox, mask: &'a dyn ClipMask) -> Self {
        Self {
            id: ClipId::Id(id),
            bbox,
            mask,
        }
    }

    /// The clip for a masked image section, covering the render clip box.
    pub fn masked_image(render_clip: BBox, mask: &'a dyn ClipMask) -> Self {
        Self {
            id: ClipId::MaskedImage,
            bbox: render_clip,
            mask,
        }
    }
}

impl fmt::Debug for ComplexClip<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexClip")
            .field("id", &self.id)
            .field("bbox", &self.bbox)
            .finish_non_exhaustive()
    }
}

/// The clip an object is rendered with: the rectangular render clip, plus a complex clip
/// when one is active.
#[derive(Clone, Copy, Debug)]
pub struct ClipState<'a> {
    pub bbox: BBox,
    pub complex: Option<ComplexClip<'a>>,
}

impl<'a> ClipState<'a> {
    pub fn rect(bbox: BBox) -> Self {
        Self {
            bbox,
            complex: None,
        }
    }

    pub fn complex(bbox: BBox, clip: ComplexClip<'a>) -> Self {
        Self {
            bbox,
            complex: Some(clip),
        }
    }
}

/// The complex clip loaded in the hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HwClip {
    #[default]
    Invalid,
    Loaded(i32),
    /// A masked image clip.
    Faux,
}

impl HwClip {
    pub fn matches(self, id: ClipId) -> bool {
        matches!((self, id), (HwClip::Loaded(a), ClipId::Id(b)) if a == b)
    }
}

/// How a complex clip will be sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipPlan {
    /// `spans` per row, a power of two up to [`MAX_CLIP_SPANS`].
    Polygons { spans: u32, size: usize },
    Bitmap { size: usize },
}

impl ClipPlan {
    /// Asset bytes.
    pub fn size(&self) -> usize {
        match *self {
            ClipPlan::Polygons { size, .. } | ClipPlan::Bitmap { size } => size,
        }
    }
}

/// Sizes `bbox` of `mask` as a run-list clip, or `None` if it cannot be one.
pub fn polygon_plan(bbox: &BBox, mask: &dyn ClipMask) -> Option<ClipPlan> {
    if bbox.is_empty()
        || bbox.y1 < 0
        || bbox.height() > 65535
        || bbox.x1 < 0
        || bbox.width() > 32767
        || bbox.x2 > 65535
        || bbox.y2 > 65535
    {
        return None;
    }

    let mut most = 0u32;
    for y in bbox.y1..=bbox.y2 {
        let mut n = 0u32;
        mask.row_spans(y, bbox.x1, bbox.x2, &mut |_, _| n += 1);
        most = most.max(n);
        if most > MAX_CLIP_SPANS {
            return None;
        }
    }

    let spans = most.next_power_of_two();
    // A single span per row is stored padded to two.
    let stored = spans.max(2) as usize;
    Some(ClipPlan::Polygons {
        spans,
        size: stored * 4 * bbox.height() as usize + POLYGON_HEADER_BYTES,
    })
}

/// Sizes `bbox` as a bitmap clip, or `None` if the bitmap is too large for two-byte fields.
pub fn bitmap_plan(bbox: &BBox) -> Option<ClipPlan> {
    if bbox.is_empty() || bbox.x1 < 0 || bbox.y1 < 0 || bbox.y1 > 65535 || bbox.height() > 65535
    {
        return None;
    }
    let left = i64::from(bbox.x1 & !63);
    let right = i64::from(bbox.x2 | 63) + 1;
    let linebytes = (right - left) >> 3;
    let size = linebytes * bbox.height();
    if left > 65535 || size >> 3 > 65535 {
        return None;
    }
    Some(ClipPlan::Bitmap {
        size: size as usize,
    })
}

/// Width of a bitmap clip row in 64-bit words.
pub fn bitmap_words(bbox: &BBox) -> i32 {
    ((bbox.x2 | 63) - (bbox.x1 & !63) + 1) >> 6
}

/// Writes the run-list clip for `bbox` into `out`: a header holding `spans`, then
/// big-endian `(xs, xe)` pairs per row padded with `(0, 0)`.
pub fn make_polygons(out: &mut [u8], bbox: &BBox, mask: &dyn ClipMask, spans: u32) {
    out[..POLYGON_HEADER_BYTES].fill(0);
    out[..2].copy_from_slice(&(spans as u16).to_be_bytes());

    let row_len = spans.max(2) as usize * 4;
    let mut at = POLYGON_HEADER_BYTES;
    for y in bbox.y1..=bbox.y2 {
        let row = &mut out[at..at + row_len];
        let mut cursor = 0;
        mask.row_spans(y, bbox.x1, bbox.x2, &mut |xs, xe| {
            if cursor < row_len {
                row[cursor..cursor + 2].copy_from_slice(&(xs as u16).to_be_bytes());
                row[cursor + 2..cursor + 4].copy_from_slice(&(xe as u16).to_be_bytes());
                cursor += 4;
            }
        });
        row[cursor..].fill(0);
        at += row_len;
    }
}

/// Writes the bitmap clip for `bbox` into `out`, most significant bit first, 1 inside.
pub fn make_bitmap(out: &mut [u8], bbox: &BBox, mask: &dyn ClipMask) {
    let left = bbox.x1 & !63;
    let right = bbox.x2 | 63;
    let linebytes = ((right - left + 1) >> 3) as usize;

    out.fill(0);
    for (row, y) in (bbox.y1..=bbox.y2).enumerate() {
        let line = &mut out[row * linebytes..(row + 1) * linebytes];
        mask.row_spans(y, left, right, &mut |xs, xe| {
            for x in xs..=xe {
                let bit = (x - left) as usize;
                line[bit >> 3] |= 0x80 >> (bit & 7);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn polygon_span_counts_round_up() {
        let bbox = BBox::new(0, 10, 99, 13);
        let three = SpanMask::repeated(10, 13, &[(0, 5), (10, 20), (30, 40)]);
        assert_eq!(
            polygon_plan(&bbox, &three),
            Some(ClipPlan::Polygons {
                spans: 4,
                size: 4 * 4 * 4 + 8
            })
        );

        let one = SpanMask::repeated(10, 13, &[(0, 99)]);
        assert_eq!(
            polygon_plan(&bbox, &one),
            Some(ClipPlan::Polygons {
                spans: 1,
                size: 2 * 4 * 4 + 8
            })
        );

        let none = SpanMask::default();
        assert_eq!(polygon_plan(&bbox, &none).map(|p| p.size()), Some(40));
    }

    #[test]
    fn polygon_rejects_busy_rows_and_bad_boxes() {
        let spans: Vec<(i32, i32)> = (0..17).map(|i| (i * 4, i * 4 + 1)).collect();
        let busy = SpanMask::repeated(0, 0, &spans);
        assert_eq!(polygon_plan(&BBox::new(0, 0, 99, 0), &busy), None);

        let fine = SpanMask::repeated(-5, 5, &[(0, 1)]);
        assert_eq!(polygon_plan(&BBox::new(0, -5, 9, 5), &fine), None);
        assert_eq!(polygon_plan(&BBox::new(0, 0, 40000, 5), &fine), None);
    }

    #[test]
    fn polygons_are_padded_per_row() {
        let bbox = BBox::new(0, 0, 99, 1);
        let mask = SpanMask::new(0, vec![vec![(2, 4), (7, 9), (11, 12)], vec![(50, 200)]]);
        let Some(ClipPlan::Polygons { spans, size }) = polygon_plan(&bbox, &mask) else {
            panic!("expected a run-list plan");
        };
        let mut out = vec![0xEE; size];
        make_polygons(&mut out, &bbox, &mask, spans);

        assert_eq!(&out[..8], &[0, 4, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            &out[8..24],
            &[0, 2, 0, 4, 0, 7, 0, 9, 0, 11, 0, 12, 0, 0, 0, 0]
        );
        // The second row is clipped to the box.
        assert_eq!(&out[24..40], &[0, 50, 0, 99, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn bitmap_rows_are_word_aligned() {
        let bbox = BBox::new(10, 3, 70, 4);
        assert_eq!(bitmap_plan(&bbox), Some(ClipPlan::Bitmap { size: 32 }));
        assert_eq!(bitmap_words(&bbox), 2);

        let mask = SpanMask::new(3, vec![vec![(10, 12)], vec![(64, 64)]]);
        let mut out = vec![0xEE; 32];
        make_bitmap(&mut out, &bbox, &mask);
        assert_eq!(out[1], 0b0011_1000);
        assert!(out[..16].iter().enumerate().all(|(i, &b)| i == 1 || b == 0));
        assert_eq!(out[16 + 8], 0x80);
    }

    #[test]
    fn oversized_bitmaps_are_refused() {
        assert_eq!(bitmap_plan(&BBox::new(0, 0, 8191, 1000)), None);
        assert_eq!(bitmap_plan(&BBox::new(-1, 0, 10, 10)), None);
    }

    #[test]
    fn masked_image_clips_never_match() {
        assert!(HwClip::Loaded(3).matches(ClipId::Id(3)));
        assert!(!HwClip::Loaded(3).matches(ClipId::Id(4)));
        assert!(!HwClip::Faux.matches(ClipId::MaskedImage));
        assert!(!HwClip::Invalid.matches(ClipId::MaskedImage));
    }
}
