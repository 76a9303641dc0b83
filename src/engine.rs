use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Analysis geometry of the engine. `segment_width` frames of `hop` samples
/// make up one chunk; each frame is transformed with a `spec_height`-point
/// window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub hop: usize,
    pub spec_height: usize,
    pub segment_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hop: 256,
            spec_height: 1024,
            segment_width: 32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSizes {
    /// Samples consumed by `process` (chunk plus context padding each side).
    pub input_len: usize,
    /// Values produced by `transform` and bytes expected in a mask.
    pub spec_size: usize,
    /// Samples produced by `process` (the chunk's sample length).
    pub output_len: usize,
}

/// The spectral transform/filter collaborator. Implementations must be safe
/// to call from a background thread.
pub trait SpectralEngine: Send + Sync {
    fn sizes(&self) -> EngineSizes;

    /// Magnitude spectrum of one chunk-length signal segment, laid out one
    /// column per analysis frame: `values[frame * spec_height + bin]`.
    /// Accepts any signal of at least `output_len` samples.
    fn transform(&self, signal: &[f32]) -> Result<Vec<f32>>;

    /// Mask-guided filtering. `mask` holds `spec_size` bytes in the same
    /// column layout as `transform` output; 0 = fully pass, 255 = fully
    /// suppressed. Returns exactly `output_len` samples.
    fn process(&self, signal: &[f32], mask: &[u8]) -> Result<Vec<f32>>;
}

/// Masked short-time Fourier filter. Forward magnitudes use a full complex
/// FFT so the spectrum image carries the mirrored half the viewport clamps
/// away; the filter path runs real-to-complex with per-bin mask gains and
/// Hann overlap-add, normalized per sample by the accumulated window square.
pub struct SdftEngine {
    cfg: EngineConfig,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
}

impl SdftEngine {
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        if cfg.hop == 0 || cfg.segment_width == 0 {
            bail!("engine hop and segment width must be non-zero");
        }
        if cfg.spec_height < 2 || cfg.spec_height % cfg.hop != 0 {
            bail!(
                "spec height {} must be a multiple of hop {}",
                cfg.spec_height,
                cfg.hop
            );
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(cfg.spec_height);
        let mut real_planner = RealFftPlanner::new();
        let r2c = real_planner.plan_fft_forward(cfg.spec_height);
        let c2r = real_planner.plan_fft_inverse(cfg.spec_height);
        Ok(Self {
            window: hann_window(cfg.spec_height),
            cfg,
            fft,
            r2c,
            c2r,
        })
    }

    /// Context padding the caller must provide on each side of a chunk.
    pub fn signal_pad(&self) -> usize {
        self.cfg.spec_height / 2
    }

    pub fn config(&self) -> EngineConfig {
        self.cfg
    }
}

impl SpectralEngine for SdftEngine {
    fn sizes(&self) -> EngineSizes {
        let EngineConfig {
            hop,
            spec_height,
            segment_width,
        } = self.cfg;
        EngineSizes {
            input_len: hop * segment_width + 2 * spec_height,
            spec_size: segment_width * spec_height,
            output_len: hop * segment_width + spec_height,
        }
    }

    fn transform(&self, signal: &[f32]) -> Result<Vec<f32>> {
        let EngineConfig {
            hop,
            spec_height: win,
            segment_width,
        } = self.cfg;
        let needed = hop * (segment_width - 1) + win;
        if signal.len() < needed {
            bail!("transform input too short: {} < {}", signal.len(), needed);
        }
        let mut buffer = vec![Complex { re: 0.0f32, im: 0.0 }; win];
        let mut scratch =
            vec![Complex { re: 0.0f32, im: 0.0 }; self.fft.get_inplace_scratch_len()];
        let mut values = Vec::with_capacity(segment_width * win);
        for frame in 0..segment_width {
            let start = frame * hop;
            for i in 0..win {
                buffer[i].re = signal[start + i] * self.window[i];
                buffer[i].im = 0.0;
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            values.extend(buffer.iter().map(|c| (c.re * c.re + c.im * c.im).sqrt()));
        }
        Ok(values)
    }

    fn process(&self, signal: &[f32], mask: &[u8]) -> Result<Vec<f32>> {
        let sizes = self.sizes();
        if signal.len() != sizes.input_len {
            bail!(
                "process input length {} != {}",
                signal.len(),
                sizes.input_len
            );
        }
        if mask.len() != sizes.spec_size {
            bail!("process mask length {} != {}", mask.len(), sizes.spec_size);
        }
        let EngineConfig {
            hop,
            spec_height: win,
            segment_width,
        } = self.cfg;
        let bins = win / 2 + 1;
        let frames = (sizes.input_len - win) / hop + 1;
        // An input frame at offset f*hop is centered where output column
        // f - win/(2*hop) is, once the context pad is trimmed.
        let center_shift = (win / (2 * hop)) as isize;
        let mut frame_in = self.r2c.make_input_vec();
        let mut spectrum = self.r2c.make_output_vec();
        let mut frame_out = self.c2r.make_output_vec();
        let mut fwd_scratch = self.r2c.make_scratch_vec();
        let mut inv_scratch = self.c2r.make_scratch_vec();
        let mut acc = vec![0.0f32; sizes.input_len];
        let mut norm = vec![0.0f32; sizes.input_len];
        let inv_n = 1.0 / win as f32;
        for frame in 0..frames {
            let start = frame * hop;
            for i in 0..win {
                frame_in[i] = signal[start + i] * self.window[i];
            }
            self.r2c
                .process_with_scratch(&mut frame_in, &mut spectrum, &mut fwd_scratch)
                .map_err(|e| anyhow!("forward fft: {e}"))?;
            let col = (frame as isize - center_shift).clamp(0, segment_width as isize - 1)
                as usize;
            let mask_col = &mask[col * win..(col + 1) * win];
            for b in 0..bins {
                let gain = 1.0 - mask_col[b.min(win - 1)] as f32 / 255.0;
                spectrum[b] *= gain;
            }
            self.c2r
                .process_with_scratch(&mut spectrum, &mut frame_out, &mut inv_scratch)
                .map_err(|e| anyhow!("inverse fft: {e}"))?;
            for i in 0..win {
                let w = self.window[i];
                acc[start + i] += frame_out[i] * inv_n * w;
                norm[start + i] += w * w;
            }
        }
        let pad = win / 2;
        let mut out = Vec::with_capacity(sizes.output_len);
        for j in 0..sizes.output_len {
            let i = pad + j;
            out.push(acc[i] / norm[i].max(1e-6));
        }
        Ok(out)
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    let n_f = (n - 1) as f32;
    (0..n)
        .map(|i| {
            let t = i as f32 / n_f;
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * t).cos()
        })
        .collect()
}
