pub mod image_blob;
pub mod normalized_image;

pub use image_blob::{ImageBlob, ImageSource};
pub use normalized_image::NormalizedImage;
