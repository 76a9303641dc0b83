use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};

use anyhow::{bail, Context as _, Result};
use egui::{pos2, vec2, Color32, Key, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions};

use crate::audio::AudioEngine;
use crate::engine::{EngineConfig, SdftEngine, SpectralEngine};
use crate::wave;

pub mod brush;
pub mod dirty;
pub mod layers;
pub mod pane;
pub mod render;
pub mod select;
pub mod worker;

use brush::{Brush, StrokeTracker};
use dirty::DirtyChunks;
use layers::{BackgroundImage, MaskLayer};
use pane::Pane;
use select::SelectionRange;
use worker::ChunkUpdate;

pub const WINDOW_SIZE: [f32; 2] = [800.0, 600.0];
pub const STATUS_STRIP_H: f32 = 6.0;

const ZOOM_STEP: f32 = 1.2;
const SELECTION_ALPHA: u8 = 64;
const SELECTION_TINT: Color32 = Color32::from_rgb(0, 0, 255);
const DEFAULT_BRUSH_SIZE: u32 = 10;
const DEFAULT_BRUSH_BLUR: u32 = 2;

/// Session geometry, fixed at startup and threaded through every component.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Spectrum height in bins; the viewport shows the top half.
    pub spec_height: usize,
    /// Engine hop length in samples per spectrum column.
    pub hop: usize,
    /// Chunk width in source pixels (= spectrum columns per chunk).
    pub chunk_width: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            spec_height: 1024,
            hop: 256,
            chunk_width: 32,
        }
    }
}

#[derive(Clone, Default)]
pub struct StartupConfig {
    pub open_file: Option<PathBuf>,
    pub session: SessionConfig,
}

pub struct SpecBrush {
    audio: AudioEngine,
    cfg: SessionConfig,
    sample_rate: u32,
    filtered: Arc<Mutex<Vec<f32>>>,
    dirty: Arc<DirtyChunks>,
    worker: Option<std::thread::JoinHandle<()>>,
    worker_rx: mpsc::Receiver<ChunkUpdate>,
    chunk_count: usize,
    output_len: usize,

    play_pane: Pane,
    edit_pane: Pane,
    play_bg: BackgroundImage,
    edit_mask: Arc<Mutex<MaskLayer>>,
    play_mask: MaskLayer,
    selection: SelectionRange,
    brush: Brush,
    stroke: StrokeTracker,

    play_bg_tex: TextureHandle,
    play_mask_tex: TextureHandle,
    edit_bg_tex: TextureHandle,
    edit_mask_tex: TextureHandle,
}

impl SpecBrush {
    pub fn new(cc: &eframe::CreationContext<'_>, startup: StartupConfig) -> Result<Self> {
        let cfg = startup.session;
        let path = startup.open_file.context("no input file given")?;
        let (samples, sample_rate) = wave::decode_wav_mono(&path)?;
        let samples = Arc::new(samples);

        let engine = Arc::new(SdftEngine::new(EngineConfig {
            hop: cfg.hop,
            spec_height: cfg.spec_height,
            segment_width: cfg.chunk_width,
        })?);
        let sizes = engine.sizes();
        let pad = engine.signal_pad();
        if samples.len() < pad + sizes.output_len {
            bail!(
                "input too short: {} samples, need at least {}",
                samples.len(),
                pad + sizes.output_len
            );
        }
        let chunk_count = (samples.len() - pad) / sizes.output_len;
        let src_w = cfg.chunk_width * chunk_count;
        let src_h = cfg.spec_height;

        let pane_h = WINDOW_SIZE[1] / 2.0;
        let play_pane = Pane::new(
            Rect::from_min_size(pos2(0.0, 0.0), vec2(WINDOW_SIZE[0], pane_h)),
            src_w,
            src_h,
            chunk_count,
        );
        let edit_pane = Pane::new(
            Rect::from_min_size(pos2(0.0, pane_h), vec2(WINDOW_SIZE[0], pane_h)),
            src_w,
            src_h,
            chunk_count,
        );

        let mut edit_bg = BackgroundImage::new(src_w, src_h);
        let mut play_bg = BackgroundImage::new(src_w, src_h);
        let filtered_init = build_initial_spectra(
            engine.as_ref(),
            &samples,
            &mut edit_bg,
            &mut play_bg,
            cfg.chunk_width,
            chunk_count,
        )?;

        let edit_mask = MaskLayer::new(src_w, src_h, Color32::WHITE);
        let mut play_mask = MaskLayer::new(src_w, src_h, SELECTION_TINT);
        let selection = SelectionRange::full(src_w as f32);
        play_mask.fill_columns(0, src_w, SELECTION_ALPHA);

        let ctx = &cc.egui_ctx;
        let play_bg_tex =
            ctx.load_texture("play_bg", play_bg.to_color_image(), TextureOptions::LINEAR);
        let play_mask_tex = ctx.load_texture(
            "play_mask",
            play_mask.to_color_image(),
            TextureOptions::LINEAR,
        );
        let edit_bg_tex =
            ctx.load_texture("edit_bg", edit_bg.to_color_image(), TextureOptions::LINEAR);
        let edit_mask_tex = ctx.load_texture(
            "edit_mask",
            edit_mask.to_color_image(),
            TextureOptions::LINEAR,
        );

        let edit_mask = Arc::new(Mutex::new(edit_mask));
        let filtered = Arc::new(Mutex::new(filtered_init));
        let dirty = Arc::new(DirtyChunks::new());
        let (tx, worker_rx) = mpsc::channel();
        let worker = worker::spawn_reprocess_worker(
            engine as Arc<dyn SpectralEngine>,
            samples,
            edit_mask.clone(),
            filtered.clone(),
            dirty.clone(),
            chunk_count,
            cfg.chunk_width,
            tx,
            cc.egui_ctx.clone(),
        );

        let audio = AudioEngine::new()?;
        audio.set_volume(0.8);

        Ok(Self {
            audio,
            cfg,
            sample_rate,
            filtered,
            dirty,
            worker: Some(worker),
            worker_rx,
            chunk_count,
            output_len: sizes.output_len,
            play_pane,
            edit_pane,
            play_bg,
            edit_mask,
            play_mask,
            selection,
            brush: Brush::new(DEFAULT_BRUSH_SIZE, DEFAULT_BRUSH_BLUR),
            stroke: StrokeTracker::default(),
            play_bg_tex,
            play_mask_tex,
            edit_bg_tex,
            edit_mask_tex,
        })
    }

    /// Merges finished chunk imagery from the worker into the playback
    /// pane's background.
    fn drain_chunk_updates(&mut self, ctx: &egui::Context) {
        let mut got_any = false;
        while let Ok(update) = self.worker_rx.try_recv() {
            self.play_bg
                .set_chunk(update.chunk, self.cfg.chunk_width, &update.values);
            let img = self
                .play_bg
                .chunk_color_image(update.chunk, self.cfg.chunk_width);
            self.play_bg_tex.set_partial(
                [update.chunk * self.cfg.chunk_width, 0],
                img,
                TextureOptions::LINEAR,
            );
            got_any = true;
        }
        if got_any {
            ctx.request_repaint();
        }
    }

    fn paint_at(&mut self, pos: Pos2) {
        let footprint = {
            let mut mask = self.edit_mask.lock().unwrap();
            let Some(fp) = self.brush.stamp(&self.edit_pane, &mut mask, pos) else {
                return;
            };
            let region = mask.region_color_image(fp.x0, fp.y0, fp.w, fp.h);
            self.edit_mask_tex
                .set_partial([fp.x0, fp.y0], region, TextureOptions::LINEAR);
            fp
        };
        for chunk in footprint.chunk_start..=footprint.chunk_end {
            if chunk < 0 || chunk as usize >= self.chunk_count {
                continue;
            }
            self.dirty.mark_dirty(chunk as usize);
        }
    }

    fn rebuild_selection_mask(&mut self) {
        self.play_mask.clear();
        let x0 = self.selection.start().floor().max(0.0) as usize;
        let x1 = self.selection.end().ceil().max(0.0) as usize;
        self.play_mask.fill_columns(x0, x1, SELECTION_ALPHA);
        self.play_mask_tex
            .set(self.play_mask.to_color_image(), TextureOptions::LINEAR);
    }

    /// Filtered samples under the current selection, mapped through the
    /// chunk grid: one chunk width of source x covers one chunk of samples.
    fn selection_samples(&self) -> Vec<f32> {
        let cw = self.cfg.chunk_width as f32;
        let start = (self.selection.start() / cw * self.output_len as f32).max(0.0) as usize;
        let end = (self.selection.end() / cw * self.output_len as f32).max(0.0) as usize;
        let buf = self.filtered.lock().unwrap();
        let end = end.min(buf.len());
        let start = start.min(end);
        buf[start..end].to_vec()
    }

    fn toggle_playback(&mut self) {
        if self.audio.is_playing() {
            self.audio.stop();
            return;
        }
        let slice = self.selection_samples();
        if slice.is_empty() {
            return;
        }
        let out_sr = self.audio.shared.out_sample_rate;
        let slice = wave::resample_linear(&slice, self.sample_rate, out_sr);
        self.audio.set_samples_mono(slice);
        self.audio.play();
    }

    fn handle_play_input(&mut self, ui: &egui::Ui, resp: &egui::Response) {
        if resp.hovered() {
            let (scroll, pointer) = ui.input(|i| (i.raw_scroll_delta.y, i.pointer.latest_pos()));
            if scroll != 0.0 {
                if let Some(pos) = pointer {
                    let factor = if scroll > 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
                    self.play_pane.zoom(factor, pos);
                }
            }
        }
        if resp.dragged_by(egui::PointerButton::Middle) {
            let d = resp.drag_delta();
            self.play_pane.pan(d.x, d.y);
        }
        let pressed = resp.hovered() && ui.input(|i| i.pointer.primary_pressed());
        if pressed {
            if let Some(pos) = resp.interact_pointer_pos() {
                let x = self.play_pane.device_to_source_x(pos.x);
                self.selection.begin_at(x);
                self.rebuild_selection_mask();
            }
        } else if resp.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = resp.interact_pointer_pos() {
                let x = self.play_pane.device_to_source_x(pos.x);
                self.selection.extend_to(x);
                self.rebuild_selection_mask();
            }
        }
    }

    fn handle_edit_input(&mut self, ui: &egui::Ui, resp: &egui::Response) {
        if resp.hovered() {
            let (scroll, modifiers, pointer) =
                ui.input(|i| (i.raw_scroll_delta.y, i.modifiers, i.pointer.latest_pos()));
            if scroll != 0.0 {
                let up = scroll > 0.0;
                if modifiers.ctrl && modifiers.shift {
                    self.brush.adjust_blur(if up { 2 } else { -2 });
                } else if modifiers.ctrl {
                    self.brush.adjust_size(if up { 1 } else { -1 });
                } else if let Some(pos) = pointer {
                    let factor = if up { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
                    self.edit_pane.zoom(factor, pos);
                }
            }
        }
        if resp.dragged_by(egui::PointerButton::Middle) {
            let d = resp.drag_delta();
            self.edit_pane.pan(d.x, d.y);
        }
        let painting = resp.is_pointer_button_down_on()
            && ui.input(|i| i.pointer.button_down(egui::PointerButton::Primary));
        if painting {
            if let Some(pos) = resp.interact_pointer_pos() {
                if self.stroke.should_stamp(pos) {
                    self.paint_at(pos);
                }
            }
        }
        // pointer-up after a stroke signals the reprocess worker
        let released = ui.input(|i| i.pointer.button_released(egui::PointerButton::Primary));
        if released && self.stroke.end() {
            self.dirty.trigger();
        }
    }

    fn draw_brush_cursor(&self, ui: &egui::Ui, resp: &egui::Response) {
        if !resp.hovered() {
            return;
        }
        let Some(pos) = ui.input(|i| i.pointer.latest_pos()) else {
            return;
        };
        let radius = self.brush.screen_diameter(&self.edit_pane) / 2.0;
        ui.painter().circle_stroke(
            pos,
            radius.max(1.0),
            Stroke::new(1.0, Color32::from_white_alpha(180)),
        );
    }
}

impl eframe::App for SpecBrush {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_chunk_updates(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                ui.spacing_mut().item_spacing = vec2(0.0, 0.0);
                let total = ui.available_size();
                let pane_size = vec2(total.x, total.y / 2.0);
                let (play_rect, play_resp) =
                    ui.allocate_exact_size(pane_size, Sense::click_and_drag());
                let (edit_rect, edit_resp) =
                    ui.allocate_exact_size(pane_size, Sense::click_and_drag());
                self.play_pane.set_dest(play_rect);
                self.edit_pane.set_dest(edit_rect);

                self.handle_play_input(ui, &play_resp);
                self.handle_edit_input(ui, &edit_resp);
                if ui.input(|i| i.key_pressed(Key::Space)) {
                    self.toggle_playback();
                }

                let painter = ui.painter();
                render::draw_pane(painter, &self.play_pane, &self.play_bg_tex, &self.play_mask_tex);
                render::draw_pane(painter, &self.edit_pane, &self.edit_bg_tex, &self.edit_mask_tex);
                let pending: HashSet<usize> = self.dirty.pending_chunks().into_iter().collect();
                let strip = Rect::from_min_size(play_rect.min, vec2(total.x, STATUS_STRIP_H));
                render::draw_status_strip(painter, strip, self.chunk_count, &pending);
                self.draw_brush_cursor(ui, &edit_resp);
            });
    }
}

impl Drop for SpecBrush {
    fn drop(&mut self) {
        self.dirty.shutdown();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Full-spectrum build of both panes plus the initial playback buffer (the
/// context-trimmed source signal). The trimmed buffer can come up short of
/// `chunk_count` whole chunks; a short final chunk is skipped and its
/// playback block left at the background's cleared value.
pub fn build_initial_spectra(
    engine: &dyn SpectralEngine,
    samples: &[f32],
    edit_bg: &mut BackgroundImage,
    play_bg: &mut BackgroundImage,
    chunk_width: usize,
    chunk_count: usize,
) -> Result<Vec<f32>> {
    let sizes = engine.sizes();
    let pad = (sizes.input_len - sizes.output_len) / 2;
    let spec_height = sizes.spec_size / chunk_width.max(1);
    let filtered: Vec<f32> = samples[pad..samples.len() - pad].to_vec();
    for chunk in 0..chunk_count {
        let start = pad + chunk * sizes.output_len;
        let mut values = engine.transform(&samples[start..start + sizes.output_len])?;
        render::compress_spectrum(&mut values, spec_height);
        edit_bg.set_chunk(chunk, chunk_width, &values);

        let fstart = chunk * sizes.output_len;
        if fstart + sizes.output_len > filtered.len() {
            continue;
        }
        let mut values = engine.transform(&filtered[fstart..fstart + sizes.output_len])?;
        render::compress_spectrum(&mut values, spec_height);
        play_bg.set_chunk(chunk, chunk_width, &values);
    }
    Ok(filtered)
}
