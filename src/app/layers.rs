use egui::{Color32, ColorImage};

/// Per-pane spectral intensity buffer, row-major in [0, 1], one contiguous
/// column block per chunk. Mutated only through `set_chunk`.
pub struct BackgroundImage {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl BackgroundImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width * height],
        }
    }

    /// Writes one chunk's column block. `values` is column-major: one
    /// `height` run per column, `chunk_width` columns.
    pub fn set_chunk(&mut self, chunk: usize, chunk_width: usize, values: &[f32]) {
        debug_assert_eq!(values.len(), chunk_width * self.height);
        for col in 0..chunk_width {
            let x = chunk * chunk_width + col;
            if x >= self.width {
                break;
            }
            for row in 0..self.height {
                let Some(&v) = values.get(col * self.height + row) else {
                    return;
                };
                self.values[row * self.width + x] = v.clamp(0.0, 1.0);
            }
        }
    }

    /// Column-major copy of one chunk's block, for comparisons.
    pub fn column_block(&self, chunk: usize, chunk_width: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(chunk_width * self.height);
        for col in 0..chunk_width {
            let x = (chunk * chunk_width + col).min(self.width.saturating_sub(1));
            for row in 0..self.height {
                out.push(self.values[row * self.width + x]);
            }
        }
        out
    }

    pub fn to_color_image(&self) -> ColorImage {
        self.region_color_image(0, 0, self.width, self.height)
    }

    pub fn chunk_color_image(&self, chunk: usize, chunk_width: usize) -> ColorImage {
        let x0 = (chunk * chunk_width).min(self.width);
        let w = chunk_width.min(self.width - x0);
        self.region_color_image(x0, 0, w, self.height)
    }

    fn region_color_image(&self, x0: usize, y0: usize, w: usize, h: usize) -> ColorImage {
        let mut rgba = Vec::with_capacity(w * h * 4);
        for row in y0..y0 + h {
            for x in x0..x0 + w {
                let g = (self.values[row * self.width + x] * 255.0).round() as u8;
                rgba.extend_from_slice(&[g, g, g, 255]);
            }
        }
        ColorImage::from_rgba_unmultiplied([w, h], &rgba)
    }
}

/// Per-pane paint/selection overlay: an alpha channel over the full source
/// rect, rendered with a fixed tint.
pub struct MaskLayer {
    pub width: usize,
    pub height: usize,
    pub alpha: Vec<u8>,
    pub tint: Color32,
}

impl MaskLayer {
    pub fn new(width: usize, height: usize, tint: Color32) -> Self {
        Self {
            width,
            height,
            alpha: vec![0; width * height],
            tint,
        }
    }

    pub fn clear(&mut self) {
        self.alpha.fill(0);
    }

    /// Fills columns `[x0, x1)` over the full height with one alpha value.
    pub fn fill_columns(&mut self, x0: usize, x1: usize, alpha: u8) {
        let x1 = x1.min(self.width);
        let x0 = x0.min(x1);
        for row in 0..self.height {
            let base = row * self.width;
            self.alpha[base + x0..base + x1].fill(alpha);
        }
    }

    /// Column-major copy of one chunk's alpha over the top `rows` rows.
    pub fn chunk_alpha_columns(&self, chunk: usize, chunk_width: usize, rows: usize) -> Vec<u8> {
        let rows = rows.min(self.height);
        let mut out = Vec::with_capacity(chunk_width * rows);
        for col in 0..chunk_width {
            let x = (chunk * chunk_width + col).min(self.width.saturating_sub(1));
            for row in 0..rows {
                out.push(self.alpha[row * self.width + x]);
            }
        }
        out
    }

    pub fn to_color_image(&self) -> ColorImage {
        self.region_color_image(0, 0, self.width, self.height)
    }

    pub fn region_color_image(&self, x0: usize, y0: usize, w: usize, h: usize) -> ColorImage {
        let [r, g, b, _] = self.tint.to_srgba_unmultiplied();
        let mut rgba = Vec::with_capacity(w * h * 4);
        for row in y0..y0 + h {
            for x in x0..x0 + w {
                let a = self.alpha[row * self.width + x];
                rgba.extend_from_slice(&[r, g, b, a]);
            }
        }
        ColorImage::from_rgba_unmultiplied([w, h], &rgba)
    }
}
