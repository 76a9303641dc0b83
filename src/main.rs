#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use specbrush::app;

fn parse_startup_config() -> app::StartupConfig {
    let mut cfg = app::StartupConfig::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--open-file" => {
                if let Some(p) = args.next() {
                    cfg.open_file = Some(std::path::PathBuf::from(p));
                }
            }
            "--spec-height" => {
                if let Some(v) = args.next() {
                    if let Ok(n) = v.parse::<usize>() {
                        if n >= 2 {
                            cfg.session.spec_height = n;
                        }
                    }
                }
            }
            "--hop" => {
                if let Some(v) = args.next() {
                    if let Ok(n) = v.parse::<usize>() {
                        if n >= 1 {
                            cfg.session.hop = n;
                        }
                    }
                }
            }
            "--chunk-width" => {
                if let Some(v) = args.next() {
                    if let Ok(n) = v.parse::<usize>() {
                        if n >= 1 {
                            cfg.session.chunk_width = n;
                        }
                    }
                }
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage:\n  specbrush [options] [file.wav]\n\nOptions:\n  --open-file <file.wav>\n  --spec-height <bins>\n  --hop <samples>\n  --chunk-width <columns>\n  --help"
                );
                std::process::exit(0);
            }
            _ => {
                if arg.starts_with('-') {
                    continue;
                }
                cfg.open_file = Some(std::path::PathBuf::from(arg));
            }
        }
    }
    cfg
}

fn main() -> eframe::Result<()> {
    let mut startup = parse_startup_config();
    if startup.open_file.is_none() {
        startup.open_file = rfd::FileDialog::new()
            .add_filter("WAV audio", &["wav"])
            .pick_file();
    }
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size(app::WINDOW_SIZE)
        .with_resizable(false);
    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "SpecBrush Mask Editor",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(
                app::SpecBrush::new(cc, startup.clone()).expect("failed to init app"),
            ))
        }),
    )
}
