use std::path::Path;

use anyhow::{Context, Result};

/// Decode the first channel of a WAV file to f32 samples, peak-normalized
/// to [-1, 1]. Returns the samples and the file's sample rate.
pub fn decode_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let mut mono: Vec<f32> = Vec::new();
    match spec.sample_format {
        hound::SampleFormat::Float => {
            for (i, s) in reader.samples::<f32>().enumerate() {
                let s = s.context("decode f32 sample")?;
                if i % channels == 0 {
                    mono.push(s);
                }
            }
        }
        hound::SampleFormat::Int => {
            let scale = 1.0f32 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            for (i, s) in reader.samples::<i32>().enumerate() {
                let s = s.context("decode int sample")?;
                if i % channels == 0 {
                    mono.push(s as f32 * scale);
                }
            }
        }
    }
    Ok((normalize_peak(mono), spec.sample_rate))
}

pub fn normalize_peak(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
    if peak > 0.0 {
        for v in &mut samples {
            *v /= peak;
        }
    }
    samples
}

pub fn resample_linear(mono: &[f32], in_sr: u32, out_sr: u32) -> Vec<f32> {
    if in_sr == out_sr || mono.is_empty() {
        return mono.to_vec();
    }
    if in_sr == 0 || out_sr == 0 {
        return mono.to_vec();
    }
    let ratio = out_sr as f64 / in_sr as f64;
    let out_len = ((mono.len() as f64) * ratio).ceil() as usize;
    if out_len == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(out_len);
    let len = mono.len();
    for i in 0..out_len {
        let src_pos = (i as f64) / ratio;
        let i0 = src_pos.floor() as usize;
        if i0 >= len {
            out.push(mono[len - 1]);
            continue;
        }
        let i1 = (i0 + 1).min(len.saturating_sub(1));
        let t = (src_pos - i0 as f64).clamp(0.0, 1.0) as f32;
        out.push(mono[i0] * (1.0 - t) + mono[i1] * t);
    }
    out
}
