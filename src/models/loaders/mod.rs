pub mod image_loader;

pub use image_loader::{list_images, load_image};
