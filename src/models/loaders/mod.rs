pub mod image_loader;

pub use image_loader::{load_image, load_images_from_dir, scan_image_paths, LoadLimits};
