//! Persisted scene state.
//!
//! A document is a plain record of each object's variant, geometry, timing
//! and variant properties. Loading rebuilds objects through their
//! constructors and `update_properties`, so older documents missing newer
//! keys simply keep the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::object::{ObjectData, ObjectId, ObjectKind, SceneObject};
use crate::props::PropertyMap;
use crate::scene::Scene;

/// Current document schema version.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Top-level scene file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    /// Schema version.
    pub version: String,

    /// Scene-wide timeline length in milliseconds.
    pub total_duration: f64,

    #[serde(default)]
    pub looping: bool,

    /// Last saved timestamp (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,

    /// Objects in paint order.
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

/// One persisted object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Variant-specific properties.
    #[serde(default)]
    pub properties: PropertyMap,
}

fn default_duration() -> f64 {
    crate::object::DEFAULT_DURATION_MS
}

impl ObjectRecord {
    /// Rebuild the object. A missing id gets a fresh one.
    pub fn into_object(self) -> SceneObject {
        let mut object = SceneObject::new(
            ObjectData::default_for(self.kind),
            Rect::new(self.x, self.y, self.width, self.height),
        )
        .with_timing(self.start_time, self.duration);
        if let Some(id) = self.id {
            object = object.with_id(id);
        }
        object.set_name(self.name);
        object.update_properties(&self.properties);
        object
    }
}

impl SceneObject {
    /// Snapshot as a persisted record.
    pub fn to_record(&self) -> ObjectRecord {
        let mut properties = crate::props::PropertyMap::new();
        crate::object::Drawable::write_properties(self.data(), &mut properties);
        let bounds = self.bounds();
        ObjectRecord {
            kind: self.kind(),
            id: Some(self.id()),
            name: self.name().map(str::to_string),
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            start_time: self.start_time(),
            duration: self.duration(),
            properties,
        }
    }
}

impl SceneDocument {
    pub fn new(total_duration: f64, looping: bool) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            total_duration,
            looping,
            saved_at: None,
            objects: Vec::new(),
        }
    }

    /// Snapshot a scene.
    pub fn from_scene(scene: &Scene, total_duration: f64, looping: bool) -> Self {
        Self {
            objects: scene.iter().map(SceneObject::to_record).collect(),
            ..Self::new(total_duration, looping)
        }
    }

    /// Rebuild the scene, preserving order.
    pub fn to_scene(&self) -> Scene {
        let mut scene = Scene::new();
        for record in &self.objects {
            scene.add(record.clone().into_object());
        }
        scene
    }

    /// Load a document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| DocumentError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let doc: SceneDocument =
            serde_json::from_str(&json).map_err(|e| DocumentError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        if !(doc.total_duration.is_finite() && doc.total_duration > 0.0) {
            return Err(DocumentError::ValidationError {
                message: format!("totalDuration must be positive, got {}", doc.total_duration),
            });
        }
        tracing::debug!(path = %path.display(), objects = doc.objects.len(), "Loaded scene document");
        Ok(doc)
    }

    /// Write the document as pretty JSON, stamping `saved_at`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocumentError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.saved_at = Some(chrono::Utc::now().to_rfc3339());
        let json = serde_json::to_string_pretty(self).map_err(|e| DocumentError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| DocumentError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

/// Errors that can occur when reading or writing scene documents.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid scene document: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{BarChartObject, BarDatum, TextAnimation, TextObject};
    use serde_json::json;

    fn sample_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add(
            SceneObject::new(
                TextObject::new("Hello").with_animation(TextAnimation::Slide),
                Rect::new(10.0, 20.0, 100.0, 40.0),
            )
            .with_timing(250.0, 750.0)
            .with_name("Title"),
        );
        scene.add(SceneObject::new(
            BarChartObject::new(vec![BarDatum::new("a", 1.0), BarDatum::new("b", 2.0)]),
            Rect::new(0.0, 100.0, 300.0, 200.0),
        ));
        scene
    }

    #[test]
    fn test_records_rebuild_equivalent_objects() {
        let scene = sample_scene();
        let doc = SceneDocument::from_scene(&scene, 5000.0, true);
        let rebuilt = doc.to_scene();
        assert_eq!(rebuilt.ids(), scene.ids());
        for (a, b) in scene.iter().zip(rebuilt.iter()) {
            assert_eq!(a.properties(), b.properties());
            assert_eq!(a.kind(), b.kind());
        }
    }

    #[test]
    fn test_record_json_is_camel_case() {
        let scene = sample_scene();
        let record = scene.objects()[0].to_record();
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["kind"], json!("text"));
        assert_eq!(v["startTime"], json!(250.0));
        assert_eq!(v["properties"]["animation"], json!("slide"));
    }

    #[test]
    fn test_minimal_record_uses_defaults() {
        let record: ObjectRecord = serde_json::from_value(json!({
            "kind": "counter", "x": 1, "y": 2, "width": 3, "height": 4,
            "properties": { "endValue": "500", "unknown": true }
        }))
        .unwrap();
        let obj = record.into_object();
        assert_eq!(obj.duration(), crate::object::DEFAULT_DURATION_MS);
        assert_eq!(obj.properties()["endValue"], json!(500));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("scenecast-doc-{}", ObjectId::new()));
        let path = dir.join("scene.json");
        let mut doc = SceneDocument::from_scene(&sample_scene(), 3000.0, false);
        doc.save(&path).unwrap();
        let loaded = SceneDocument::load(&path).unwrap();
        assert_eq!(loaded.objects, doc.objects);
        assert!(loaded.saved_at.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SceneDocument::load("/nonexistent/scenecast/scene.json").unwrap_err();
        assert!(matches!(err, DocumentError::IoError { .. }));
    }

    #[test]
    fn test_load_rejects_non_positive_duration() {
        let dir = std::env::temp_dir().join(format!("scenecast-doc-{}", ObjectId::new()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, r#"{"version":"1.0","totalDuration":0}"#).unwrap();
        let err = SceneDocument::load(&path).unwrap_err();
        assert!(matches!(err, DocumentError::ValidationError { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
