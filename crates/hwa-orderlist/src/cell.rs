//! Color conversion and dither cell generation.

/// Threshold matrix used when the device supplies neither color cells nor dither thresholds.
#[rustfmt::skip]
pub const BAYER_16X16: [u8; 256] = [
      0, 192,  48, 240,  12, 204,  60, 252,   3, 195,  51, 243,  15, 207,  63, 255,
    128,  64, 176, 112, 140,  76, 188, 124, 131,  67, 179, 115, 143,  79, 191, 127,
     32, 224,  16, 208,  44, 236,  28, 220,  35, 227,  19, 211,  47, 239,  31, 223,
    160,  96, 144,  80, 172, 108, 156,  92, 163,  99, 147,  83, 175, 111, 159,  95,
      8, 200,  56, 248,   4, 196,  52, 244,  11, 203,  59, 251,   7, 199,  55, 247,
    136,  72, 184, 120, 132,  68, 180, 116, 139,  75, 187, 123, 135,  71, 183, 119,
     40, 232,  24, 216,  36, 228,  20, 212,  43, 235,  27, 219,  39, 231,  23, 215,
    168, 104, 152,  88, 164, 100, 148,  84, 171, 107, 155,  91, 167, 103, 151,  87,
      2, 194,  50, 242,  14, 206,  62, 254,   1, 193,  49, 241,  13, 205,  61, 253,
    130,  66, 178, 114, 142,  78, 190, 126, 129,  65, 177, 113, 141,  77, 189, 125,
     34, 226,  18, 210,  46, 238,  30, 222,  33, 225,  17, 209,  45, 237,  29, 221,
    162,  98, 146,  82, 174, 110, 158,  94, 161,  97, 145,  81, 173, 109, 157,  93,
     10, 202,  58, 250,   6, 198,  54, 246,   9, 201,  57, 249,   5, 197,  53, 245,
    138,  74, 186, 122, 134,  70, 182, 118, 137,  73, 185, 121, 133,  69, 181, 117,
     42, 234,  26, 218,  38, 230,  22, 214,  41, 233,  25, 217,  37, 229,  21, 213,
    170, 106, 154,  90, 166, 102, 150,  86, 169, 105, 153,  89, 165, 101, 149,  85,
];

bitflags::bitflags! {
    /// How a threshold matrix is read when generating a cell.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CellOptions: u8 {
        const REFLECT_X = 1;
        const REFLECT_Y = 2;
        /// Thresholds are in `SET_DITHER_STRETCHBLT` order: pixel pairs every 4 bytes,
        /// 128 bytes per row.
        const GIPA_ORDER = 4;
    }
}

/// Packed RGB with red in the low byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PackedColor(pub u32);

impl PackedColor {
    pub const BLACK: Self = Self(0);
    pub const WHITE: Self = Self(0x00FF_FFFF);
    /// Never produced by [`PackedColor::rgb`].
    pub const INVALID: Self = Self(0xFFFF_FFFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(r as u32 | (g as u32) << 8 | (b as u32) << 16)
    }

    pub const fn r(self) -> u8 {
        self.0 as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }
}

/// Naive RGB to CMYK with full undercolor removal. The result is in c, m, y, k order.
pub fn rgb_to_cmyk(color: PackedColor) -> [u8; 4] {
    let c = 255 - color.r();
    let m = 255 - color.g();
    let y = 255 - color.b();
    let k = c.min(m).min(y);
    [c - k, m - k, y - k, k]
}

/// Luminance in the first byte, for K-only output.
pub fn rgb_to_gray(color: PackedColor) -> [u8; 4] {
    let k = u32::from(color.r()) * 14014
        + u32::from(color.g()) * 47042
        + u32::from(color.b()) * 4737;
    [(k >> 16) as u8, 0, 0, 0]
}

/// Bytes of a `width` x `height` cell at `bit_depth`: rows padded to 32 bits, the total to
/// 8 bytes.
pub const fn cell_size(width: u32, height: u32, bit_depth: u32) -> usize {
    ((((width * bit_depth + 31) / 32) * 4 * height) as usize + 7) & !7
}

/// Bytes of threshold data [`threshold_cell`] reads for a `width` x `height` cell.
pub fn threshold_len(width: u32, height: u32, options: CellOptions) -> usize {
    let in_stride = if options.contains(CellOptions::GIPA_ORDER) {
        128
    } else {
        (width as usize + 3) & !3
    };
    in_stride * height as usize
}

/// Fills `out` with the cell for `level` thresholded against `threshold`.
///
/// Each output row is padded to a whole number of 32-bit words by repeating the row from
/// its start, so the hardware can tile the cell horizontally.
pub fn threshold_cell(
    out: &mut [u8],
    threshold: &[u8],
    width: u32,
    height: u32,
    bit_depth: u32,
    level: u8,
    options: CellOptions,
) {
    let levels = 1i32 << bit_depth;
    let level = (i32::from(level) * (257 - levels) + 127) >> 8;
    let (w, h) = (width as usize, height as usize);
    let in_stride = threshold_len(width, 1, options);
    let out_stride = ((w * bit_depth as usize + 31) & !31) >> 3;

    out.fill(0);
    for j in 0..h {
        let y = if options.contains(CellOptions::REFLECT_Y) {
            h - 1 - j
        } else {
            j
        };
        let input = &threshold[y * in_stride..];
        let row = &mut out[j * out_stride..(j + 1) * out_stride];
        let mut bits = 0u32;
        let mut shift = 0u32;
        let mut o = 0usize;

        for i in 0..w {
            let x = if options.contains(CellOptions::REFLECT_X) {
                w - 1 - i
            } else {
                i
            };
            let t = if options.contains(CellOptions::GIPA_ORDER) {
                input[x * 2 - (x & 1)]
            } else {
                input[x]
            };
            let v = (level - i32::from(t)).clamp(0, levels - 1) as u32;
            shift = (shift << bit_depth) | v;
            bits += bit_depth;
            if bits >= 8 {
                bits -= 8;
                row[o] = (shift >> bits) as u8;
                o += 1;
                shift &= (1 << bits) - 1;
            }
        }

        if bits > 0 || o & 3 != 0 {
            let mut k = 0;
            loop {
                row[o] = ((shift << (8 - bits)) | (u32::from(row[k]) >> bits)) as u8;
                shift = u32::from(row[k]);
                k += 1;
                o += 1;
                if o & 3 == 0 {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cmyk_removes_undercolor() {
        assert_eq!(rgb_to_cmyk(PackedColor::BLACK), [0, 0, 0, 255]);
        assert_eq!(rgb_to_cmyk(PackedColor::WHITE), [0, 0, 0, 0]);
        assert_eq!(rgb_to_cmyk(PackedColor::rgb(255, 0, 0)), [0, 255, 255, 0]);
        assert_eq!(rgb_to_cmyk(PackedColor::rgb(100, 150, 200)), [100, 50, 0, 55]);
    }

    #[test]
    fn gray_weights() {
        assert_eq!(rgb_to_gray(PackedColor::WHITE)[0], 255);
        assert_eq!(rgb_to_gray(PackedColor::rgb(0, 255, 0))[0], 183);
    }

    #[test]
    fn cell_sizes() {
        assert_eq!(cell_size(16, 16, 1), 64);
        assert_eq!(cell_size(16, 16, 2), 64);
        assert_eq!(cell_size(16, 16, 4), 128);
        assert_eq!(cell_size(3, 3, 1), 16);
    }

    #[test]
    fn bayer_full_and_empty_levels() {
        let mut cell = [0xAAu8; 64];
        threshold_cell(&mut cell, &BAYER_16X16, 16, 16, 1, 0, CellOptions::empty());
        assert!(cell.iter().all(|&b| b == 0));

        threshold_cell(&mut cell, &BAYER_16X16, 16, 16, 1, 128, CellOptions::empty());
        // Level 128 maps to 127. Row 0 thresholds:
        // 0 192 48 240 12 204 60 252 | 3 195 51 243 15 207 63 255
        assert_eq!(&cell[..2], &[0b1010_1010, 0b1010_1010]);
        // The 16-pixel row is two bytes; the word is completed from the row start.
        assert_eq!(&cell[2..4], &[0b1010_1010, 0b1010_1010]);

        threshold_cell(&mut cell, &BAYER_16X16, 16, 16, 1, 255, CellOptions::empty());
        // Level 255 maps to 254, so only the 255 threshold stays off.
        assert_eq!(&cell[..4], &[0xFF, 0xFE, 0xFF, 0xFE]);
    }

    #[test]
    fn reflection_mirrors_rows_and_columns() {
        let mut plain = [0u8; 64];
        let mut flipped = [0u8; 64];
        threshold_cell(&mut plain, &BAYER_16X16, 16, 16, 1, 200, CellOptions::empty());
        threshold_cell(&mut flipped, &BAYER_16X16, 16, 16, 1, 200, CellOptions::REFLECT_Y);
        for j in 0..16 {
            assert_eq!(&flipped[j * 4..j * 4 + 2], &plain[(15 - j) * 4..(15 - j) * 4 + 2]);
        }

        threshold_cell(&mut flipped, &BAYER_16X16, 16, 16, 1, 200, CellOptions::REFLECT_X);
        for j in 0..16 {
            let row = u16::from_be_bytes([plain[j * 4], plain[j * 4 + 1]]);
            let mirrored = u16::from_be_bytes([flipped[j * 4], flipped[j * 4 + 1]]);
            assert_eq!(mirrored, row.reverse_bits());
        }
    }

    #[test]
    fn odd_width_rows_wrap_bits_from_the_start() {
        // Twelve pixels, 110000000000, repeated until the 32-bit word is full.
        let mut threshold = [255u8; 12];
        threshold[0] = 0;
        threshold[1] = 0;
        let mut cell = [0u8; 8];
        threshold_cell(&mut cell, &threshold, 12, 1, 1, 255, CellOptions::empty());
        assert_eq!(&cell[..4], &[0xC0, 0x0C, 0x00, 0xC0]);
    }

    #[test]
    fn multi_bit_levels_saturate() {
        let threshold = [0u8, 64, 255, 0];
        let mut cell = [0u8; 8];
        threshold_cell(&mut cell, &threshold, 4, 1, 2, 255, CellOptions::empty());
        // levels = 4, level' = (255 * 253 + 127) >> 8 = 252.
        // 252 - 0 -> 3, 252 - 64 -> 3, 252 - 255 -> 0, 252 - 0 -> 3.
        assert_eq!(cell[0], 0b11_11_00_11);
    }
}
