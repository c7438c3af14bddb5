use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::config::ImageConfig;
use crate::error::LifecycleError;
use crate::models::{ImageRef, ImageSource};
use crate::services::capture::capture;
use crate::services::crop::CropTool;
use crate::services::image_store::ImageStore;
use crate::services::tracker::{CleanupWarning, ReferenceTracker};

/// Featured-image state of one editor (article, product or about).
///
/// Runs capture → crop → upload → adopt as one sequential pipeline; each
/// stage fails on its own error branch and leaves the session usable.
pub struct ImageEditorSession {
    config: ImageConfig,
    store: Arc<dyn ImageStore>,
    tracker: ReferenceTracker,
}

impl ImageEditorSession {
    pub fn new(config: ImageConfig, store: Arc<dyn ImageStore>) -> Self {
        let tracker = ReferenceTracker::new(store.clone());
        Self {
            config,
            store,
            tracker,
        }
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ReferenceTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ReferenceTracker {
        &mut self.tracker
    }

    pub fn current(&self) -> Option<&ImageRef> {
        self.tracker.current()
    }

    pub fn subscribe_warnings(&mut self) -> mpsc::UnboundedReceiver<CleanupWarning> {
        self.tracker.subscribe()
    }

    /// The edited entity came with this image
    pub fn load(&mut self, url: impl Into<String>) {
        self.tracker.set_from_load(url);
    }

    /// Reads the selected file and opens the crop tool on it
    pub async fn capture(&self, path: impl AsRef<Path>) -> Result<CropTool, LifecycleError> {
        let data_url = capture(path).await?;
        self.open(&ImageSource::Local(data_url)).await
    }

    /// Re-crops an already uploaded image
    pub async fn open_remote(&self, url: &Url) -> Result<CropTool, LifecycleError> {
        self.open(&ImageSource::Remote(url.clone())).await
    }

    pub async fn open(&self, source: &ImageSource) -> Result<CropTool, LifecycleError> {
        let tool = match source {
            ImageSource::Local(data_url) => CropTool::from_data_url(data_url, &self.config)?,
            ImageSource::Remote(url) => {
                let data = self.store.fetch_source(url).await?;
                CropTool::from_remote_bytes(url.as_str(), &data, &self.config)?
            }
        };
        Ok(tool)
    }

    /// Confirms the crop, uploads it and makes it the current image.
    ///
    /// A crop error leaves the tool open for another try. An upload error
    /// restores the previous image; nothing is retried automatically.
    pub async fn upload_crop(&mut self, tool: &CropTool) -> Result<ImageRef, LifecycleError> {
        let blob = tool.confirm_crop()?;

        self.tracker.begin_replace()?;
        match self.store.upload(&blob).await {
            Ok(image) => {
                self.tracker.set_from_upload(image.clone()).await;
                Ok(image)
            }
            Err(e) => {
                warn!("Image upload failed: {}", e);
                self.tracker.cancel_replace();
                Err(e.into())
            }
        }
    }

    /// Capture, adjust the crop and upload in one go
    pub async fn replace_from_file<F>(
        &mut self,
        path: impl AsRef<Path>,
        adjust: F,
    ) -> Result<ImageRef, LifecycleError>
    where
        F: FnOnce(&mut CropTool),
    {
        let mut tool = self.capture(path).await?;
        adjust(&mut tool);
        let image = self.upload_crop(&tool).await?;
        tool.cancel();
        Ok(image)
    }

    pub async fn remove(&mut self) {
        self.tracker.remove().await;
    }

    /// Closing the editor without saving
    pub async fn abandon(mut self) {
        info!("Editor closed without saving");
        self.tracker.abandon().await;
    }

    /// The parent entity was saved
    pub async fn commit(&mut self) -> Option<String> {
        self.tracker.commit().await
    }
}
