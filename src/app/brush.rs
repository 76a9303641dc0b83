use egui::Pos2;
use image::imageops::{self, FilterType};
use image::GrayImage;

use super::layers::MaskLayer;
use super::pane::Pane;

/// Kernels are rendered at 4x the brush diameter so downscaled stamps keep
/// soft edges.
pub const KERNEL_OVERSAMPLE: u32 = 4;

/// What one stamp touched: the clipped source-space pixel rect (for partial
/// texture upload) and the inclusive chunk span (unclipped; callers drop
/// indices outside the grid).
pub struct StampFootprint {
    pub x0: usize,
    pub y0: usize,
    pub w: usize,
    pub h: usize,
    pub chunk_start: isize,
    pub chunk_end: isize,
}

/// Soft circular paint brush with a precomputed alpha kernel.
pub struct Brush {
    size: u32,
    blur: u32,
    kernel: GrayImage,
}

impl Brush {
    pub fn new(size: u32, blur: u32) -> Self {
        let size = size.max(1);
        let blur = blur.max(1);
        Self {
            size,
            blur,
            kernel: build_kernel(size, blur),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn blur(&self) -> u32 {
        self.blur
    }

    pub fn kernel_dim(&self) -> u32 {
        self.kernel.width()
    }

    pub fn adjust_size(&mut self, delta: i32) {
        self.size = (self.size as i64 + delta as i64).max(1) as u32;
        self.kernel = build_kernel(self.size, self.blur);
    }

    pub fn adjust_blur(&mut self, delta: i32) {
        self.blur = (self.blur as i64 + delta as i64).max(1) as u32;
        self.kernel = build_kernel(self.size, self.blur);
    }

    /// On-screen footprint diameter at the pane's current zoom, for the
    /// cursor preview.
    pub fn screen_diameter(&self, pane: &Pane) -> f32 {
        let eff = pane.zoom_level * pane.zoom_scale_x.max(pane.zoom_scale_y);
        self.kernel.width() as f32 * eff
    }

    /// Stamps the kernel into the mask at a device-space pointer position.
    /// Returns None when the scaled footprint lands entirely outside the
    /// mask.
    pub fn stamp(&self, pane: &Pane, mask: &mut MaskLayer, pointer: Pos2) -> Option<StampFootprint> {
        let eff = pane.zoom_level * pane.zoom_scale_x.max(pane.zoom_scale_y);
        let fw = (pane.viewport.width() / pane.dest.width() * self.kernel.width() as f32 * eff)
            .round()
            .max(1.0) as u32;
        let fh = (pane.viewport.height() / pane.dest.height() * self.kernel.height() as f32 * eff)
            .round()
            .max(1.0) as u32;
        let scaled = imageops::resize(&self.kernel, fw, fh, FilterType::Triangle);

        let local = pointer - pane.dest.min;
        let sx = local.x / pane.dest.width() * pane.viewport.width() + pane.viewport.left()
            - fw as f32 / 2.0;
        let sy = local.y / pane.dest.height() * pane.viewport.height() + pane.viewport.top()
            - fh as f32 / 2.0;
        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;

        let cx0 = x0.max(0);
        let cy0 = y0.max(0);
        let cx1 = (x0 + fw as i64).min(mask.width as i64);
        let cy1 = (y0 + fh as i64).min(mask.height as i64);
        if cx1 <= cx0 || cy1 <= cy0 {
            return None;
        }

        for (px, py, p) in scaled.enumerate_pixels() {
            let x = x0 + px as i64;
            let y = y0 + py as i64;
            if x < cx0 || y < cy0 || x >= cx1 || y >= cy1 {
                continue;
            }
            let a = p.0[0] as u16;
            if a == 0 {
                continue;
            }
            let dst = &mut mask.alpha[y as usize * mask.width + x as usize];
            *dst = (a + (*dst as u16) * (255 - a) / 255).min(255) as u8;
        }

        let (chunk_start, chunk_end) = chunk_span(sx, fw as f32, pane.chunk_width);
        Some(StampFootprint {
            x0: cx0 as usize,
            y0: cy0 as usize,
            w: (cx1 - cx0) as usize,
            h: (cy1 - cy0) as usize,
            chunk_start,
            chunk_end,
        })
    }
}

/// Gates stamps within one stroke to pointer movement: a stationary held
/// button stamps once, not once per frame.
#[derive(Default)]
pub struct StrokeTracker {
    last: Option<Pos2>,
    active: bool,
}

impl StrokeTracker {
    /// True when the pointer reached a position not yet stamped this stroke.
    pub fn should_stamp(&mut self, pos: Pos2) -> bool {
        if self.last == Some(pos) {
            return false;
        }
        self.last = Some(pos);
        self.active = true;
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ends the stroke; returns true when one was in progress.
    pub fn end(&mut self) -> bool {
        self.last = None;
        std::mem::take(&mut self.active)
    }
}

/// Inclusive chunk span covered by a footprint of `width` source pixels
/// starting at `left`. Unclipped; indices outside `[0, chunk_count)` are the
/// caller's to drop.
pub fn chunk_span(left: f32, width: f32, chunk_width: usize) -> (isize, isize) {
    let cw = chunk_width as f32;
    let start = (left / cw).floor() as isize;
    let end = ((left + width) / cw).floor() as isize;
    (start, end)
}

fn build_kernel(size: u32, blur: u32) -> GrayImage {
    let blur = if blur % 2 == 0 { blur + 1 } else { blur };
    let dim = size.max(1) * KERNEL_OVERSAMPLE;
    let mut img = GrayImage::new(dim, dim);
    let center = dim as f32 / 2.0;
    let radius = size as f32 / 2.0;
    for (x, y, p) in img.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        if (dx * dx + dy * dy).sqrt() <= radius {
            p.0[0] = 255;
        }
    }
    imageops::fast_blur(&img, blur as f32 * 0.5)
}
