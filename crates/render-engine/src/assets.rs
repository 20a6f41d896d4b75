//! Background decoding of image assets.
//!
//! Image objects start out not ready. A load request decodes the source off
//! the calling thread and fills the object's slot; until then (or forever,
//! if decoding fails) the object paints nothing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scenecast_common::error::{SceneError, SceneResult};
use scenecast_scene_model::{AssetState, Bitmap, ImageObject, ImageSlot, ObjectData, Scene};

/// Resolve an image source to a filesystem path. Accepts plain paths and
/// `file://` URIs.
pub fn resolve_source(src: &str) -> SceneResult<PathBuf> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Err(SceneError::asset("empty image source", PathBuf::new()));
    }
    if let Some(rest) = trimmed.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if let Some((scheme, _)) = trimmed.split_once("://") {
        return Err(SceneError::unsupported(format!(
            "image scheme {scheme:?} is not supported"
        )));
    }
    Ok(PathBuf::from(trimmed))
}

/// Decode an image file into an RGBA bitmap.
pub fn decode_file(path: &Path) -> SceneResult<Bitmap> {
    let img = image::open(path)
        .map_err(|e| SceneError::asset(format!("failed to decode image: {e}"), path))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Bitmap::from_rgba8(width, height, img.into_raw())
        .ok_or_else(|| SceneError::asset("decoded image has inconsistent size", path))
}

/// Decode `src` and fill `slot`, logging failures.
fn load_into(src: &str, slot: &ImageSlot) {
    match resolve_source(src).and_then(|path| decode_file(&path)) {
        Ok(bitmap) => {
            tracing::debug!(src, width = bitmap.width(), height = bitmap.height(), "Image loaded");
            slot.resolve(bitmap);
        }
        Err(err) => {
            tracing::warn!(src, error = %err, "Image failed to load; it will not be drawn");
            slot.fail(err.to_string());
        }
    }
}

/// Start loading an image in the background if nobody has yet.
///
/// Uses the tokio blocking pool when called inside a runtime, otherwise a
/// plain thread.
pub fn request_image(image: &ImageObject) {
    let slot = image.slot().clone();
    if !slot.begin_load() {
        return;
    }
    let src = image.src().to_string();
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || load_into(&src, &slot));
        }
        Err(_) => {
            std::thread::spawn(move || load_into(&src, &slot));
        }
    }
}

fn images(scene: &Scene) -> impl Iterator<Item = &ImageObject> {
    scene.iter().filter_map(|o| match o.data() {
        ObjectData::Image(img) => Some(img),
        _ => None,
    })
}

/// Request every image in the scene that has not started loading.
pub fn request_scene_images(scene: &Scene) {
    for image in images(scene) {
        request_image(image);
    }
}

/// Number of images still decoding.
pub fn images_loading(scene: &Scene) -> usize {
    images(scene)
        .filter(|img| matches!(img.slot().state(), AssetState::Loading))
        .count()
}

/// Wait until no image is mid-load, up to `timeout`. Returns `true` if
/// everything settled.
pub async fn wait_for_images(scene: &Scene, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if images_loading(scene) == 0 {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(
                loading = images_loading(scene),
                "Gave up waiting for images to load"
            );
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
