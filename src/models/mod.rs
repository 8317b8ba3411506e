pub mod batch;
pub mod image;
pub mod loaders;
pub mod report;

pub use batch::{Batch, BatchResult, BatchStatus};
pub use image::{ImageItem, MediaType};
pub use loaders::{load_images_from_dir, scan_image_paths, LoadLimits};
pub use report::{ConsolidatedReport, FailedBatch, ReportStatus, RunStatus};
