//! In-memory document model.

pub mod content;
pub mod document;
pub mod font;
pub mod page;
pub mod resource;

pub use content::{Color, ContentInstruction, Rect, ShapeKind, TextRender};
pub use document::{Document, DocumentInfo, SecurityState};
pub use font::{StandardFont, TextStyle};
pub use page::{MediaBox, Page, Rotation};
pub use resource::{
    ColorSpace, FontId, FontResource, ImageEncoding, ImageId, ImageResource, ResourcePool,
};
