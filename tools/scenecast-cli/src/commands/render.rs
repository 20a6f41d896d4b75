//! Render one frame of a scene to PNG.

use std::path::PathBuf;

use scenecast_common::config::EngineConfig;
use scenecast_render_engine::raster::save_png;

pub async fn run(config: EngineConfig, path: PathBuf, time: f64, output: PathBuf) -> anyhow::Result<()> {
    let mut engine = super::open_scene(config, &path)?;
    if !engine.wait_for_images().await {
        tracing::warn!("Rendering before every image finished loading");
    }
    engine.seek(time);
    save_png(engine.frame(), &output).map_err(|e| anyhow::anyhow!("Failed to write frame: {e}"))?;
    println!(
        "Rendered {:.0}ms to {}",
        engine.current_time(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_common::config::CanvasConfig;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scenecast-cli-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn test_still_frame_includes_images() {
        let png = temp_path("red.png");
        image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]))
            .save(&png)
            .unwrap();
        let scene = temp_path("scene.json");
        let document = serde_json::json!({
            "version": "1.0",
            "totalDuration": 1000,
            "looping": false,
            "objects": [{
                "kind": "image",
                "x": 0, "y": 0, "width": 32, "height": 18,
                "startTime": 0, "duration": 0,
                "properties": { "src": png.to_string_lossy(), "cornerRadius": 0 }
            }]
        });
        std::fs::write(&scene, document.to_string()).unwrap();
        let output = temp_path("frame.png");
        let config = EngineConfig {
            canvas: CanvasConfig {
                width: 32,
                height: 18,
                ..CanvasConfig::default()
            },
            ..EngineConfig::default()
        };

        run(config, scene.clone(), 500.0, output.clone()).await.unwrap();

        let frame = image::open(&output).unwrap().to_rgba8();
        assert_eq!(frame.get_pixel(16, 9).0, [255, 0, 0, 255]);
        for path in [png, scene, output] {
            std::fs::remove_file(path).ok();
        }
    }
}
