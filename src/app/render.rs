use std::collections::HashSet;

use egui::{Color32, Painter, Rect, TextureHandle};

use super::pane::Pane;

const STATUS_UP_TO_DATE: Color32 = Color32::from_rgb(0, 200, 80);
const STATUS_PENDING: Color32 = Color32::from_rgb(220, 50, 40);

/// Fixed log compression applied to engine magnitudes before display:
/// `log(1 + x * 2000 / spec_height) / log(100)`, clamped to [0, 1].
pub fn compress_spectrum(values: &mut [f32], spec_height: usize) {
    let norm = 2000.0 / spec_height.max(1) as f32;
    let log100 = 100.0f32.ln();
    for v in values.iter_mut() {
        *v = ((*v * norm + 1.0).ln() / log100).clamp(0.0, 1.0);
    }
}

/// Background then mask overlay, both cropped to the viewport via UV
/// coordinates and scaled to the pane rect by the linear texture filter.
pub fn draw_pane(painter: &Painter, pane: &Pane, bg: &TextureHandle, mask: &TextureHandle) {
    let uv = pane.uv_rect();
    painter.image(bg.id(), pane.dest, uv, Color32::WHITE);
    painter.image(mask.id(), pane.dest, uv, Color32::WHITE);
}

/// One colored segment per chunk across the full strip width, recomputed
/// every frame from the dirty set.
pub fn draw_status_strip(
    painter: &Painter,
    strip: Rect,
    chunk_count: usize,
    pending: &HashSet<usize>,
) {
    if chunk_count == 0 {
        return;
    }
    let seg_w = strip.width() / chunk_count as f32;
    for chunk in 0..chunk_count {
        let x0 = strip.left() + seg_w * chunk as f32;
        let rect = Rect::from_min_max(
            egui::pos2(x0, strip.top()),
            egui::pos2(x0 + seg_w, strip.bottom()),
        );
        let color = if pending.contains(&chunk) {
            STATUS_PENDING
        } else {
            STATUS_UP_TO_DATE
        };
        painter.rect_filled(rect, 0.0, color);
    }
}
