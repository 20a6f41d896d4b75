//! Export a scene timeline to video.

use std::io::Write;
use std::path::PathBuf;

use scenecast_common::config::{ContainerFormat, EngineConfig};
use scenecast_engine::{EngineEvent, OfflineTarget};
use scenecast_render_engine::{CancelToken, RecordingFormat};

enum Strategy {
    Live(RecordingFormat),
    Offline(OfflineTarget),
}

fn parse_format(format: &str) -> anyhow::Result<Strategy> {
    Ok(match format {
        "gif" => Strategy::Live(RecordingFormat::Gif),
        "webm" => Strategy::Live(RecordingFormat::Webm),
        "mp4" => Strategy::Offline(OfflineTarget::Container(ContainerFormat::Mp4)),
        "mov" => Strategy::Offline(OfflineTarget::Container(ContainerFormat::Mov)),
        "raw" => Strategy::Offline(OfflineTarget::Raw),
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown format: {format}. Use: gif, webm, mp4, mov, raw"
            ));
        }
    })
}

pub async fn run(
    config: EngineConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    format: String,
    fps: Option<f64>,
) -> anyhow::Result<()> {
    let strategy = parse_format(&format)?;
    let mut engine = super::open_scene(config, &path)?;
    println!("Exporting scene at: {}", path.display());

    let mut events = engine.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::ExportProgress {
                    progress,
                    frame,
                    total_frames,
                    ..
                } => {
                    print!(
                        "\r  Progress: {:.1}% ({frame}/{total_frames} frames)  ",
                        progress * 100.0
                    );
                    let _ = std::io::stdout().flush();
                }
                EngineEvent::ExportFinished { .. } | EngineEvent::ExportFailed { .. } => break,
                _ => {}
            }
        }
    });

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling export");
            on_interrupt.cancel();
        }
    });

    let result = match strategy {
        Strategy::Live(format) => engine.export_live(&[format], fps, &cancel).await,
        Strategy::Offline(target) => engine.export_offline(target, fps).await,
    };
    let _ = printer.await;

    let export = match result {
        Ok(export) => export,
        Err(e) => {
            println!("\nExport failed: {e}");
            return Err(e.into());
        }
    };

    let output_path = output.unwrap_or_else(|| path.with_extension(export.extension));
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output_path, &export.bytes)?;
    println!(
        "\nExport complete: {} ({} frames, {} bytes, {})",
        output_path.display(),
        export.frames,
        export.bytes.len(),
        export.mime_type
    );
    Ok(())
}
