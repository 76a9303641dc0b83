/// Playback-pane time selection in source-space x. The anchor is captured
/// when a drag begins and stays fixed for the rest of that drag, so
/// extending never walks the opposite edge.
#[derive(Clone, Copy, Debug)]
pub struct SelectionRange {
    start: f32,
    end: f32,
    anchor: f32,
}

impl SelectionRange {
    pub fn full(width: f32) -> Self {
        Self {
            start: 0.0,
            end: width,
            anchor: 0.0,
        }
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn begin_at(&mut self, x: f32) {
        self.anchor = x;
        self.start = x;
        self.end = x;
    }

    pub fn extend_to(&mut self, x: f32) {
        self.start = x.min(self.anchor);
        self.end = x.max(self.anchor);
    }
}
