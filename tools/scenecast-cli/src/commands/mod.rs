pub mod export;
pub mod info;
pub mod render;

use std::path::Path;

use scenecast_common::config::EngineConfig;
use scenecast_engine::Engine;
use scenecast_scene_model::SceneDocument;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {e}")),
        None => Ok(EngineConfig::load()),
    }
}

/// Build an engine and load the scene document at `path` into it.
pub fn open_scene(config: EngineConfig, path: &Path) -> anyhow::Result<Engine> {
    let document =
        SceneDocument::load(path).map_err(|e| anyhow::anyhow!("Failed to load scene: {e}"))?;
    let mut engine =
        Engine::new(config).map_err(|e| anyhow::anyhow!("Failed to create engine: {e}"))?;
    engine.load_document(&document);
    Ok(engine)
}
