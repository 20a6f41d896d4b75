//! Show scene information.

use std::path::PathBuf;

use scenecast_common::config::EngineConfig;

pub fn run(config: EngineConfig, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let engine = super::open_scene(config, &path)?;
    let summaries = engine.object_summaries();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    let canvas = &engine.config().canvas;
    println!("Scene: {}", path.display());
    println!("  Canvas: {}x{}", canvas.width, canvas.height);
    println!(
        "  Duration: {:.0}ms{}",
        engine.clock().total_duration(),
        if engine.clock().is_looping() { " (looping)" } else { "" }
    );
    println!();

    println!("Objects ({}), back to front:", summaries.len());
    for summary in &summaries {
        println!(
            "  {:<10} {:<24} {:>7.0}ms +{:.0}ms  {}",
            summary.kind.to_string(),
            summary.name,
            summary.start_time,
            summary.duration,
            summary.id
        );
    }

    Ok(())
}
