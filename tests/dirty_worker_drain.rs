use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use egui::Color32;
use specbrush::app::dirty::DirtyChunks;
use specbrush::app::layers::MaskLayer;
use specbrush::app::worker::{self, build_engine_mask, padded_segment, spawn_reprocess_worker};
use specbrush::engine::{EngineConfig, EngineSizes, SdftEngine, SpectralEngine};

const WAIT: Duration = Duration::from_secs(5);

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn mark_is_idempotent() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(3);
    dirty.mark_dirty(3);
    assert_eq!(dirty.pending_chunks(), vec![3]);
    assert!(!dirty.is_empty());
}

#[test]
fn take_requires_trigger() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(1);
    assert_eq!(dirty.take_one(), None);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(1));
}

#[test]
fn takes_lowest_chunk_first() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(5);
    dirty.mark_dirty(2);
    dirty.mark_dirty(9);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(2));
    assert_eq!(dirty.take_one(), Some(5));
    assert_eq!(dirty.take_one(), Some(9));
}

#[test]
fn in_flight_chunk_still_counts_as_pending() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(4);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(4));
    assert_eq!(dirty.pending_chunks(), vec![4]);
    assert!(!dirty.is_empty());
    dirty.finish(4);
    assert!(dirty.is_empty());
}

#[test]
fn remark_during_processing_survives_finish() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(7);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(7));
    // another stroke hits the same chunk while it recomputes
    dirty.mark_dirty(7);
    dirty.finish(7);
    assert!(!dirty.is_empty());
    assert_eq!(dirty.take_one(), Some(7));
    dirty.finish(7);
    assert!(dirty.is_empty());
}

#[test]
fn trigger_clears_once_drained() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(0);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(0));
    dirty.finish(0);
    assert_eq!(dirty.take_one(), None);
    // the trigger is spent; new work needs a new trigger
    dirty.mark_dirty(1);
    assert_eq!(dirty.take_one(), None);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(1));
}

#[test]
fn requeue_returns_chunk_to_pending() {
    let dirty = DirtyChunks::new();
    dirty.mark_dirty(6);
    dirty.trigger();
    assert_eq!(dirty.take_one(), Some(6));
    dirty.requeue(6);
    assert_eq!(dirty.take_one(), Some(6));
}

#[test]
fn shutdown_unblocks_waiters() {
    let dirty = Arc::new(DirtyChunks::new());
    let waiter = {
        let dirty = dirty.clone();
        std::thread::spawn(move || dirty.wait_for_trigger(Duration::from_millis(50)))
    };
    dirty.shutdown();
    assert!(!waiter.join().unwrap());
    assert!(!dirty.is_running());
    assert_eq!(dirty.take_one(), None);
}

#[test]
fn padded_segment_mirrors_past_the_end() {
    let samples = vec![1.0, 2.0, 3.0, 4.0];
    let seg = padded_segment(&samples, 2, 5);
    // indices 2,3 then mirrored 2,1,0
    assert_eq!(seg, vec![3.0, 4.0, 3.0, 2.0, 1.0]);
    assert_eq!(padded_segment(&[], 0, 3), vec![0.0, 0.0, 0.0]);
}

#[test]
fn engine_mask_mirrors_and_inverts() {
    // 2 chunks of 4 columns over 8 bins; paint the top half of chunk 1
    let mut mask = MaskLayer::new(8, 8, Color32::WHITE);
    mask.fill_columns(4, 8, 255);
    let full = build_engine_mask(&mask, 1, 4);
    assert_eq!(full.len(), 4 * 8);
    // painted regions pass (0), and the lower half mirrors the top
    assert!(full.iter().all(|&v| v == 0));
    let blank = build_engine_mask(&mask, 0, 4);
    assert!(blank.iter().all(|&v| v == 255));
}

struct WorkerHarness {
    engine: Arc<dyn SpectralEngine>,
    samples: Arc<Vec<f32>>,
    mask: Arc<Mutex<MaskLayer>>,
    filtered: Arc<Mutex<Vec<f32>>>,
    dirty: Arc<DirtyChunks>,
    chunk_count: usize,
    chunk_width: usize,
}

impl WorkerHarness {
    fn with_engine(engine: Arc<dyn SpectralEngine>, chunk_count: usize, chunk_width: usize) -> Self {
        let sizes = engine.sizes();
        let spec_height = sizes.spec_size / chunk_width;
        let pad = (sizes.input_len - sizes.output_len) / 2;
        let samples: Vec<f32> = (0..pad + chunk_count * sizes.output_len + pad)
            .map(|i| (i as f32 * 0.31).sin() * 0.4)
            .collect();
        let filtered = samples[pad..pad + chunk_count * sizes.output_len].to_vec();
        Self {
            engine,
            samples: Arc::new(samples),
            mask: Arc::new(Mutex::new(MaskLayer::new(
                chunk_count * chunk_width,
                spec_height,
                Color32::WHITE,
            ))),
            filtered: Arc::new(Mutex::new(filtered)),
            dirty: Arc::new(DirtyChunks::new()),
            chunk_count,
            chunk_width,
        }
    }

    fn spawn(&self) -> (std::thread::JoinHandle<()>, mpsc::Receiver<worker::ChunkUpdate>) {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_reprocess_worker(
            self.engine.clone(),
            self.samples.clone(),
            self.mask.clone(),
            self.filtered.clone(),
            self.dirty.clone(),
            self.chunk_count,
            self.chunk_width,
            tx,
            egui::Context::default(),
        );
        (handle, rx)
    }

    fn shutdown(&self, handle: std::thread::JoinHandle<()>) {
        self.dirty.shutdown();
        handle.join().unwrap();
    }
}

#[test]
fn worker_drains_marked_chunk_and_updates_filtered() {
    let engine = Arc::new(
        SdftEngine::new(EngineConfig {
            hop: 4,
            spec_height: 8,
            segment_width: 4,
        })
        .unwrap(),
    );
    let sizes = engine.sizes();
    let harness = WorkerHarness::with_engine(engine, 50, 4);
    let (handle, rx) = harness.spawn();

    harness.dirty.mark_dirty(10);
    harness.dirty.trigger();

    let update = rx.recv_timeout(WAIT).expect("worker publishes the chunk");
    assert_eq!(update.chunk, 10);
    assert_eq!(update.values.len(), sizes.spec_size);
    assert!(update
        .values
        .iter()
        .all(|v| (0.0..=1.0).contains(v)));
    assert!(wait_until(WAIT, || harness.dirty.is_empty()));

    // an unpainted mask suppresses everything: the chunk's slice of the
    // filtered buffer goes near-silent, neighbors stay untouched
    let filtered = harness.filtered.lock().unwrap();
    let start = 10 * sizes.output_len;
    assert!(filtered[start..start + sizes.output_len]
        .iter()
        .all(|v| v.abs() < 1e-3));
    let neighbor = 11 * sizes.output_len;
    assert!(filtered[neighbor..neighbor + sizes.output_len]
        .iter()
        .any(|v| v.abs() > 1e-3));
    drop(filtered);

    harness.shutdown(handle);
}

#[test]
fn worker_passes_painted_chunk_through() {
    let engine = Arc::new(
        SdftEngine::new(EngineConfig {
            hop: 4,
            spec_height: 8,
            segment_width: 4,
        })
        .unwrap(),
    );
    let sizes = engine.sizes();
    let pad = engine.signal_pad();
    let harness = WorkerHarness::with_engine(engine, 50, 4);
    {
        let mut mask = harness.mask.lock().unwrap();
        let w = mask.width;
        mask.fill_columns(0, w, 255);
    }
    let (handle, rx) = harness.spawn();

    harness.dirty.mark_dirty(12);
    harness.dirty.trigger();
    rx.recv_timeout(WAIT).expect("worker publishes the chunk");
    assert!(wait_until(WAIT, || harness.dirty.is_empty()));

    let filtered = harness.filtered.lock().unwrap();
    let start = 12 * sizes.output_len;
    for j in 0..sizes.output_len {
        let expect = harness.samples[pad + start + j];
        let got = filtered[start + j];
        assert!(
            (got - expect).abs() < 1e-2,
            "sample {j}: {got} vs {expect}"
        );
    }
    drop(filtered);

    harness.shutdown(handle);
}

#[test]
fn worker_drops_out_of_range_chunks() {
    let engine = Arc::new(
        SdftEngine::new(EngineConfig {
            hop: 4,
            spec_height: 8,
            segment_width: 4,
        })
        .unwrap(),
    );
    let harness = WorkerHarness::with_engine(engine, 5, 4);
    let (handle, rx) = harness.spawn();

    harness.dirty.mark_dirty(999);
    harness.dirty.trigger();
    assert!(wait_until(WAIT, || harness.dirty.is_empty()));
    assert!(rx.try_recv().is_err());

    harness.shutdown(handle);
}

/// Fails the first `process` call, succeeds afterwards.
struct FlakyEngine {
    inner: SdftEngine,
    failures: AtomicUsize,
}

impl SpectralEngine for FlakyEngine {
    fn sizes(&self) -> EngineSizes {
        self.inner.sizes()
    }

    fn transform(&self, signal: &[f32]) -> Result<Vec<f32>> {
        self.inner.transform(signal)
    }

    fn process(&self, signal: &[f32], mask: &[u8]) -> Result<Vec<f32>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            bail!("transient device loss");
        }
        self.inner.process(signal, mask)
    }
}

#[test]
fn worker_requeues_failed_chunk_and_retries() {
    let engine = Arc::new(FlakyEngine {
        inner: SdftEngine::new(EngineConfig {
            hop: 4,
            spec_height: 8,
            segment_width: 4,
        })
        .unwrap(),
        failures: AtomicUsize::new(1),
    });
    let harness = WorkerHarness::with_engine(engine, 5, 4);
    let (handle, rx) = harness.spawn();

    harness.dirty.mark_dirty(2);
    harness.dirty.trigger();

    let update = rx.recv_timeout(WAIT).expect("retry succeeds");
    assert_eq!(update.chunk, 2);
    assert!(wait_until(WAIT, || harness.dirty.is_empty()));

    harness.shutdown(handle);
}
