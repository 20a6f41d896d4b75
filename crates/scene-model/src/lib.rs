//! Scenecast Scene Model
//!
//! Defines the core data contracts for a Scenecast composition:
//! - **Objects:** Drawable units (text, image, bar chart, code, counter,
//!   progress) with their own entrance animation window
//! - **Scene:** The ordered collection of objects; order is paint order
//! - **Surface:** The drawing contract objects paint through
//! - **Documents:** Plain records that persist and rebuild a scene
//!
//! All coordinates are canvas pixels with the origin at the top-left.
//! All times are milliseconds on the scene timeline.

pub mod bitmap;
pub mod color;
pub mod document;
pub mod easing;
pub mod geometry;
pub mod object;
pub mod props;
pub mod scene;
pub mod surface;

pub use bitmap::Bitmap;
pub use color::Color;
pub use document::*;
pub use easing::Easing;
pub use geometry::*;
pub use object::*;
pub use props::PropertyMap;
pub use scene::*;
pub use surface::*;
