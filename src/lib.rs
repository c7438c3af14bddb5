//! Featured-image lifecycle for the portfolio admin editors: capture a local
//! file, crop it to the configured aspect ratio, upload it, track which upload
//! the entity references and delete the ones it stops referencing.

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::ImageConfig;
pub use crate::error::{
    CropError, DeleteError, EntityError, LifecycleError, ReadError, TrackerError, UploadError,
};
pub use crate::models::{CropRegion, DataUrl, EntityKind, ImageRef, ImageSource, PendingUpload, Rotation};
pub use crate::services::crop::{CropTool, render_crop};
pub use crate::services::image_store::{HttpImageStore, ImageStore, MemoryImageStore};
pub use crate::services::lifecycle::ImageEditorSession;
pub use crate::services::tracker::{CleanupWarning, ReferenceTracker, TrackerState};
