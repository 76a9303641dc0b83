pub mod app;
pub mod audio;
pub mod engine;
pub mod wave;

pub use app::{SessionConfig, SpecBrush, StartupConfig};
