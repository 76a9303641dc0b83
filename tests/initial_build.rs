use specbrush::app::build_initial_spectra;
use specbrush::app::layers::BackgroundImage;
use specbrush::engine::{EngineConfig, SdftEngine, SpectralEngine};

fn small_engine() -> SdftEngine {
    SdftEngine::new(EngineConfig {
        hop: 4,
        spec_height: 8,
        segment_width: 4,
    })
    .unwrap()
}

fn sine(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i as f32 * 0.7).sin() * 0.5).collect()
}

#[test]
fn builds_both_panes_and_the_playback_buffer() {
    let engine = small_engine();
    let sizes = engine.sizes();
    let pad = engine.signal_pad();
    // trimmed length is an exact multiple of the chunk length
    let chunk_count = 3;
    let samples = sine(2 * pad + chunk_count * sizes.output_len);
    let mut edit_bg = BackgroundImage::new(chunk_count * 4, 8);
    let mut play_bg = BackgroundImage::new(chunk_count * 4, 8);
    let filtered =
        build_initial_spectra(&engine, &samples, &mut edit_bg, &mut play_bg, 4, chunk_count)
            .unwrap();
    assert_eq!(filtered, samples[pad..samples.len() - pad].to_vec());
    for chunk in 0..chunk_count {
        assert!(edit_bg.column_block(chunk, 4).iter().any(|&v| v > 0.0));
        assert!(play_bg.column_block(chunk, 4).iter().any(|&v| v > 0.0));
    }
}

#[test]
fn short_final_chunk_leaves_playback_block_clear() {
    let engine = small_engine();
    let sizes = engine.sizes();
    let pad = engine.signal_pad();
    // the signal fits 3 chunks after the leading pad, so the trimmed
    // playback buffer comes up one pad short for the last one
    let samples = sine(pad + 3 * sizes.output_len);
    let mut edit_bg = BackgroundImage::new(12, 8);
    let mut play_bg = BackgroundImage::new(12, 8);
    let filtered =
        build_initial_spectra(&engine, &samples, &mut edit_bg, &mut play_bg, 4, 3).unwrap();
    assert_eq!(filtered.len(), 3 * sizes.output_len - pad);
    // the edit pane still shows the full chunk from the raw signal
    assert!(edit_bg.column_block(2, 4).iter().any(|&v| v > 0.0));
    // the playback block for the short chunk stays at its cleared value
    assert!(play_bg.column_block(2, 4).iter().all(|&v| v == 0.0));
    assert!(play_bg.column_block(1, 4).iter().any(|&v| v > 0.0));
}
