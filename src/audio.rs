use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use atomic_float::AtomicF32;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

pub struct SharedAudio {
    pub samples: ArcSwapOption<Vec<f32>>, // mono samples in [-1, 1]
    pub vol: AtomicF32,                   // 0.0..1.0 linear gain
    pub playing: AtomicBool,
    pub play_pos: AtomicUsize,
    pub out_sample_rate: u32,
}

/// Output device wrapper. A single mono buffer is swapped in atomically and
/// toggled on/off; playback stops itself at the end of the buffer.
pub struct AudioEngine {
    _stream: Option<cpal::Stream>,
    pub shared: Arc<SharedAudio>,
}

impl AudioEngine {
    fn new_shared(out_sample_rate: u32) -> Arc<SharedAudio> {
        Arc::new(SharedAudio {
            samples: ArcSwapOption::from(None),
            vol: AtomicF32::new(1.0),
            playing: AtomicBool::new(false),
            play_pos: AtomicUsize::new(0),
            out_sample_rate,
        })
    }

    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default output device")?;
        let cfg = device
            .default_output_config()
            .context("No default output config")?;

        let shared = Self::new_shared(cfg.sample_rate());

        let stream = match cfg.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &cfg.into(), shared.clone())?
            }
            _ => anyhow::bail!("Unsupported sample format"),
        };

        Ok(Self {
            _stream: Some(stream),
            shared,
        })
    }

    pub fn new_for_test() -> Self {
        Self {
            _stream: None,
            shared: Self::new_shared(48_000),
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &cpal::StreamConfig,
        shared: Arc<SharedAudio>,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = cfg.channels as usize;
        let err_fn = |e| eprintln!("cpal stream error: {e}");
        let stream = device.build_output_stream(
            cfg,
            move |data: &mut [T], _| {
                let maybe_samples = shared.samples.load();
                let playing = shared.playing.load(Ordering::Relaxed);
                let vol = shared.vol.load(Ordering::Relaxed);
                let samples = match (playing, maybe_samples.as_ref()) {
                    (true, Some(s)) => s.as_ref(),
                    _ => {
                        for frame in data.chunks_mut(channels) {
                            for ch in frame.iter_mut() {
                                *ch = T::from_sample(0.0);
                            }
                        }
                        return;
                    }
                };
                let len = samples.len();
                let mut pos = shared.play_pos.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let s = if pos < len {
                        let v = (samples[pos] * vol).clamp(-1.0, 1.0);
                        pos += 1;
                        v
                    } else {
                        shared.playing.store(false, Ordering::Relaxed);
                        0.0
                    };
                    for ch in frame.iter_mut() {
                        *ch = T::from_sample(s);
                    }
                }
                shared.play_pos.store(pos, Ordering::Relaxed);
            },
            err_fn,
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    pub fn set_samples_mono(&self, mono: Vec<f32>) {
        self.shared.samples.store(Some(Arc::new(mono)));
        self.shared.play_pos.store(0, Ordering::Relaxed);
    }

    pub fn set_volume(&self, v: f32) {
        self.shared.vol.store(v.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    pub fn play(&self) {
        if self.shared.samples.load().is_none() {
            return;
        }
        self.shared.play_pos.store(0, Ordering::Relaxed);
        self.shared.playing.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.shared.playing.store(false, Ordering::Relaxed);
    }
}
