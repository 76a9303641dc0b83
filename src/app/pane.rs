use egui::{pos2, vec2, Rect, Vec2};

/// Pan/zoom viewport state for one pane plus its chunk grid. The viewport is
/// a sub-rectangle of source-chunk space, always clamped inside it; only the
/// top half of the source height is viewable (the mirrored spectrum half
/// stays off screen).
#[derive(Clone, Debug)]
pub struct Pane {
    /// Device-space rectangle the pane is drawn into.
    pub dest: Rect,
    /// Source extent, width truncated to `chunk_width * chunk_count`.
    pub src_size: Vec2,
    pub viewport: Rect,
    pub zoom_level: f32,
    pub zoom_scale_x: f32,
    pub zoom_scale_y: f32,
    pan_rem_x: f32,
    pan_rem_y: f32,
    pub chunk_width: usize,
    pub chunk_count: usize,
}

impl Pane {
    pub fn new(dest: Rect, src_width: usize, src_height: usize, chunk_count: usize) -> Self {
        let chunk_width = (src_width / chunk_count.max(1)).max(1);
        let width = (chunk_width * chunk_count) as f32;
        let height = src_height as f32;
        Self {
            dest,
            src_size: vec2(width, height),
            viewport: Rect::from_min_size(pos2(0.0, 0.0), vec2(width, height / 2.0)),
            zoom_level: 1.0,
            zoom_scale_x: dest.width() / width,
            zoom_scale_y: dest.height() / height,
            pan_rem_x: 0.0,
            pan_rem_y: 0.0,
            chunk_width,
            chunk_count,
        }
    }

    /// Truncated source width in pixels.
    pub fn src_width(&self) -> usize {
        self.src_size.x as usize
    }

    pub fn src_height(&self) -> usize {
        self.src_size.y as usize
    }

    pub fn set_dest(&mut self, dest: Rect) {
        self.dest = dest;
    }

    /// Chunk index owning source x. Callers must discard results outside
    /// `[0, chunk_count)`.
    pub fn chunk_index(&self, x: f32) -> isize {
        (x / self.chunk_width as f32).floor() as isize
    }

    /// Maps a device-space x to source-space through the viewport.
    pub fn device_to_source_x(&self, device_x: f32) -> f32 {
        (device_x - self.dest.left()) / self.dest.width() * self.viewport.width()
            + self.viewport.left()
    }

    /// Viewport as a UV rectangle over the full source texture.
    pub fn uv_rect(&self) -> Rect {
        Rect::from_min_max(
            pos2(
                self.viewport.left() / self.src_size.x,
                self.viewport.top() / self.src_size.y,
            ),
            pos2(
                self.viewport.right() / self.src_size.x,
                self.viewport.bottom() / self.src_size.y,
            ),
        )
    }

    /// Zoom about a device-space anchor. Zooming out past the full extent
    /// snaps the offending axis to the full bound and does nothing else on
    /// that call.
    pub fn zoom(&mut self, factor: f32, anchor: egui::Pos2) {
        if factor <= 0.0 || !factor.is_finite() {
            return;
        }
        let half_h = self.src_size.y / 2.0;
        let new_w = self.viewport.width() / factor;
        let new_h = self.viewport.height() / factor;
        if new_w > self.src_size.x || new_h > half_h {
            if new_w > self.src_size.x {
                self.viewport.set_left(0.0);
                self.viewport.set_width(self.src_size.x);
            }
            if new_h > half_h {
                self.viewport.set_top(0.0);
                self.viewport.set_height(half_h);
            }
            return;
        }
        let mx = (anchor.x - self.dest.left()) / self.dest.width() * self.viewport.width();
        let my = (anchor.y - self.dest.top()) / self.dest.height() * self.viewport.height();
        let left = self.viewport.left() + mx - mx / factor;
        let top = self.viewport.top() + my - my / factor;
        self.zoom_level *= factor;
        self.viewport = Rect::from_min_size(pos2(left, top), vec2(new_w, new_h));
        self.clamp_viewport();
    }

    /// Pan by device-space deltas; the content follows the pointer. Motion
    /// below one source pixel accumulates until it carries.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_rem_x += dx / (self.zoom_scale_x * self.zoom_level);
        self.pan_rem_y += dy / (self.zoom_scale_y * self.zoom_level);
        let ix = self.pan_rem_x.floor();
        let iy = self.pan_rem_y.floor();
        self.pan_rem_x -= ix;
        self.pan_rem_y -= iy;
        self.viewport = self.viewport.translate(vec2(-ix, -iy));
        self.clamp_viewport();
    }

    /// Clamps the viewport into the source bounds by translating it only.
    fn clamp_viewport(&mut self) {
        let half_h = self.src_size.y / 2.0;
        let mut v = self.viewport;
        if v.left() < 0.0 {
            v = v.translate(vec2(-v.left(), 0.0));
        }
        if v.top() < 0.0 {
            v = v.translate(vec2(0.0, -v.top()));
        }
        if v.right() > self.src_size.x {
            v = v.translate(vec2(self.src_size.x - v.right(), 0.0));
        }
        if v.bottom() > half_h {
            v = v.translate(vec2(0.0, half_h - v.bottom()));
        }
        self.viewport = v;
    }
}
