use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};

use super::dirty::DirtyChunks;
use super::layers::MaskLayer;
use super::render;
use crate::engine::SpectralEngine;

/// One finished recompute pass: the chunk's compressed magnitude columns,
/// ready for `BackgroundImage::set_chunk` on the interactive thread.
pub struct ChunkUpdate {
    pub chunk: usize,
    pub values: Vec<f32>,
}

const WAKE_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns the background reprocess loop: wait for the trigger, then drain
/// the dirty set one chunk at a time through the spectral engine. Engine
/// failures are logged and the chunk re-queued; the loop never halts on
/// them.
#[allow(clippy::too_many_arguments)]
pub fn spawn_reprocess_worker(
    engine: Arc<dyn SpectralEngine>,
    samples: Arc<Vec<f32>>,
    mask: Arc<Mutex<MaskLayer>>,
    filtered: Arc<Mutex<Vec<f32>>>,
    dirty: Arc<DirtyChunks>,
    chunk_count: usize,
    chunk_width: usize,
    tx: Sender<ChunkUpdate>,
    ctx: egui::Context,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while dirty.wait_for_trigger(WAKE_INTERVAL) {
            while let Some(chunk) = dirty.take_one() {
                if chunk >= chunk_count {
                    // out-of-range indices are dropped silently
                    dirty.finish(chunk);
                    continue;
                }
                match reprocess_chunk(
                    engine.as_ref(),
                    &samples,
                    &mask,
                    &filtered,
                    chunk,
                    chunk_width,
                ) {
                    Ok(values) => {
                        let _ = tx.send(ChunkUpdate { chunk, values });
                        ctx.request_repaint();
                        dirty.finish(chunk);
                    }
                    Err(err) => {
                        eprintln!("reprocess of chunk {chunk} failed: {err:#}");
                        dirty.requeue(chunk);
                        std::thread::sleep(WAKE_INTERVAL);
                        break;
                    }
                }
            }
        }
    })
}

/// Runs one chunk through the engine: mask extract, filter, transform,
/// log-compress. The filtered segment is written back at the chunk's sample
/// offset before the spectrum is computed from it.
pub fn reprocess_chunk(
    engine: &dyn SpectralEngine,
    samples: &[f32],
    mask: &Mutex<MaskLayer>,
    filtered: &Mutex<Vec<f32>>,
    chunk: usize,
    chunk_width: usize,
) -> Result<Vec<f32>> {
    let sizes = engine.sizes();
    let spec_height = sizes.spec_size / chunk_width.max(1);
    let start = chunk * sizes.output_len;
    let segment = padded_segment(samples, start, sizes.input_len);

    let engine_mask = {
        let mask = mask.lock().unwrap();
        build_engine_mask(&mask, chunk, chunk_width)
    };

    let filt = engine
        .process(&segment, &engine_mask)
        .context("spectral engine process")?;
    if filt.len() != sizes.output_len {
        bail!(
            "engine returned {} samples, expected {}",
            filt.len(),
            sizes.output_len
        );
    }

    {
        let mut buf = filtered.lock().unwrap();
        let end = (start + sizes.output_len).min(buf.len());
        if end > start {
            buf[start..end].copy_from_slice(&filt[..end - start]);
        }
    }

    let mut values = engine
        .transform(&filt)
        .context("spectral engine transform")?;
    if values.len() != sizes.spec_size {
        bail!(
            "engine returned {} spectrum values, expected {}",
            values.len(),
            sizes.spec_size
        );
    }
    render::compress_spectrum(&mut values, spec_height);
    Ok(values)
}

/// Signal segment starting at `start`, mirror-padded where it runs off the
/// end of the array.
pub fn padded_segment(samples: &[f32], start: usize, len: usize) -> Vec<f32> {
    let n = samples.len();
    (0..len)
        .map(|i| {
            let idx = start + i;
            if idx < n {
                samples[idx]
            } else if n >= 2 {
                let mirrored = (2 * n).saturating_sub(2 + idx);
                samples.get(mirrored).copied().unwrap_or(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Converts one chunk's painted alpha into the engine's mask: the visible
/// top half is mirrored to full height, then inverted so painted regions
/// pass (engine convention: 0 = fully pass, 255 = fully suppressed).
pub fn build_engine_mask(mask: &MaskLayer, chunk: usize, chunk_width: usize) -> Vec<u8> {
    let height = mask.height;
    let half = (height / 2).max(1);
    let half_cols = mask.chunk_alpha_columns(chunk, chunk_width, half);
    let mut full = vec![0u8; chunk_width * height];
    for col in 0..chunk_width {
        for bin in 0..height {
            let src = if bin < half {
                bin
            } else {
                (height - bin).min(half - 1)
            };
            let painted = half_cols[col * half + src];
            full[col * height + bin] = 255 - painted;
        }
    }
    full
}
