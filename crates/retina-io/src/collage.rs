//! Side-by-side overview of inputs and predicted masks.
//!
//! Each (input, prediction) pair occupies two adjacent cells. Rows hold
//! [`Collage::columns`] pairs. Every tile is scaled to fit its cell with
//! the aspect ratio kept, centered, on the background color.

use image::imageops::{self, FilterType};
use image::Rgb;
use retina_pipeline::{Mask, RgbImage};

/// Grid layout for a result collage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collage {
    /// Pairs per row.
    pub columns: u32,
    /// Cell width in pixels.
    pub cell_width: u32,
    /// Cell height in pixels.
    pub cell_height: u32,
    /// Spacing between cells and around the border.
    pub gap: u32,
    /// Canvas color, also used for `false` mask pixels.
    pub background: [u8; 3],
    /// Color of `true` mask pixels.
    pub foreground: [u8; 3],
}

impl Default for Collage {
    fn default() -> Self {
        Self {
            columns: 3,
            cell_width: 256,
            cell_height: 256,
            gap: 8,
            background: [0, 0, 0],
            foreground: [255, 255, 255],
        }
    }
}

impl Collage {
    /// Render `pairs` into a single image.
    ///
    /// An empty slice gives a zero-sized image. Returns `None` if the
    /// canvas side lengths do not fit in `u32`.
    #[must_use]
    pub fn render(&self, pairs: &[(RgbImage, Mask)]) -> Option<RgbImage> {
        let columns = self.columns.max(1);
        let count = u32::try_from(pairs.len()).ok()?;
        if count == 0 {
            return Some(RgbImage::new(0, 0));
        }
        let tiles_per_row = columns.min(count).checked_mul(2)?;
        let rows = count.div_ceil(columns);
        let width = span(tiles_per_row, self.cell_width, self.gap)?;
        let height = span(rows, self.cell_height, self.gap)?;

        let mut canvas = RgbImage::from_pixel(width, height, Rgb(self.background));
        for (index, (input, mask)) in (0..count).zip(pairs) {
            let row = index / columns;
            let tile = 2 * (index % columns);
            self.place(&mut canvas, input, FilterType::Triangle, row, tile);
            let rendered = self.mask_tile(mask);
            self.place(&mut canvas, &rendered, FilterType::Nearest, row, tile + 1);
        }
        Some(canvas)
    }

    /// Paint `mask` with the foreground and background colors.
    #[must_use]
    pub fn mask_tile(&self, mask: &Mask) -> RgbImage {
        RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
            Rgb(if mask.get(x, y) {
                self.foreground
            } else {
                self.background
            })
        })
    }

    fn place(
        &self,
        canvas: &mut RgbImage,
        image: &RgbImage,
        filter: FilterType,
        row: u32,
        tile: u32,
    ) {
        let (w, h) = fit(image.width(), image.height(), self.cell_width, self.cell_height);
        if w == 0 || h == 0 {
            return;
        }
        let scaled = imageops::resize(image, w, h, filter);
        let x = self.gap + tile * (self.cell_width + self.gap) + (self.cell_width - w) / 2;
        let y = self.gap + row * (self.cell_height + self.gap) + (self.cell_height - h) / 2;
        imageops::replace(canvas, &scaled, i64::from(x), i64::from(y));
    }
}

/// Length of `cells` cells of size `cell` with `gap` between them and
/// around both ends.
fn span(cells: u32, cell: u32, gap: u32) -> Option<u32> {
    cells
        .checked_mul(cell)?
        .checked_add(cells.checked_add(1)?.checked_mul(gap)?)
}

/// Largest size with the aspect ratio of `width` x `height` that fits in
/// the cell. Zero if either side is zero.
fn fit(width: u32, height: u32, cell_width: u32, cell_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = (f64::from(cell_width) / f64::from(width))
        .min(f64::from(cell_height) / f64::from(height));
    let scaled = |side: u32, limit: u32| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let s = (f64::from(side) * scale).round() as u32;
        s.clamp(1, limit.max(1))
    };
    (scaled(width, cell_width), scaled(height, cell_height))
}
