

pub mod mirror;
pub mod models;
pub mod record;

pub use mirror::RecordMirror;
pub use models::{BlogPost, Faq, GalleryImage, Material, Product, Testimonial, slugify};
pub use record::{AssetRef, Record, RecordId, RecordKind, Stored};
