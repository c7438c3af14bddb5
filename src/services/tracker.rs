use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::models::ImageRef;
use crate::services::image_store::ImageStore;

/// Where the featured image of one editing session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Empty,
    /// Loaded with the entity, already saved against it
    Persisted(ImageRef),
    /// An upload is in flight; `previous` is what the editor still shows
    Replacing { previous: Box<TrackerState> },
    /// Uploaded during this session, not yet saved with the entity
    Pending(ImageRef),
    /// Explicitly removed; the entity will be saved without an image
    Removed,
}

impl TrackerState {
    fn current(&self) -> Option<&ImageRef> {
        match self {
            TrackerState::Persisted(image) | TrackerState::Pending(image) => Some(image),
            TrackerState::Replacing { previous } => previous.current(),
            TrackerState::Empty | TrackerState::Removed => None,
        }
    }

    fn committed(self) -> TrackerState {
        match self {
            TrackerState::Pending(image) | TrackerState::Persisted(image) => {
                TrackerState::Persisted(ImageRef::persisted(image.url))
            }
            TrackerState::Replacing { previous } => TrackerState::Replacing {
                previous: Box::new(previous.committed()),
            },
            TrackerState::Empty | TrackerState::Removed => TrackerState::Empty,
        }
    }
}

/// A cleanup delete that did not go through. Editing carries on regardless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub url: String,
    pub message: String,
}

/// Owns the current featured image of one editor session and deletes the
/// uploads it stops referencing.
///
/// The image loaded with the entity is kept until a save confirms its
/// replacement ([`commit`](Self::commit)) or it is explicitly
/// [`remove`](Self::remove)d; abandoning the session never deletes it.
pub struct ReferenceTracker {
    store: Arc<dyn ImageStore>,
    state: TrackerState,
    original: Option<String>,
    warnings: Option<mpsc::UnboundedSender<CleanupWarning>>,
}

impl ReferenceTracker {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            state: TrackerState::Empty,
            original: None,
            warnings: None,
        }
    }

    /// Routes cleanup failures to the returned receiver
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CleanupWarning> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.warnings = Some(tx);
        rx
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn current(&self) -> Option<&ImageRef> {
        self.state.current()
    }

    /// URL the entity had when it was loaded or last saved
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self.state, TrackerState::Replacing { .. })
    }

    /// Value for the entity's image field: `None` when the entity never had
    /// one, an empty string once it was removed.
    pub fn payload_value(&self) -> Option<String> {
        match &self.state {
            TrackerState::Removed => Some(String::new()),
            TrackerState::Replacing { previous } if **previous == TrackerState::Removed => {
                Some(String::new())
            }
            state => state.current().map(|image| image.url.clone()),
        }
    }

    /// An existing entity was loaded for editing
    pub fn set_from_load(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url.is_empty() {
            self.state = TrackerState::Empty;
            self.original = None;
        } else {
            debug!("Tracking persisted image {}", url);
            self.state = TrackerState::Persisted(ImageRef::persisted(url.clone()));
            self.original = Some(url);
        }
    }

    /// Marks a crop/upload as in flight. Only one may run at a time.
    pub fn begin_replace(&mut self) -> Result<(), TrackerError> {
        if self.is_uploading() {
            return Err(TrackerError::UploadInFlight);
        }
        let previous = std::mem::replace(&mut self.state, TrackerState::Empty);
        self.state = TrackerState::Replacing {
            previous: Box::new(previous),
        };
        Ok(())
    }

    /// The in-flight upload failed; the editor keeps what it had
    pub fn cancel_replace(&mut self) {
        if let TrackerState::Replacing { previous } =
            std::mem::replace(&mut self.state, TrackerState::Empty)
        {
            self.state = *previous;
        } else {
            warn!("cancel_replace called with no upload in flight");
        }
    }

    /// Adopts a fresh upload. The superseded unsaved upload, if any, is deleted
    /// after the new one is current; the loaded original is kept.
    pub async fn set_from_upload(&mut self, image: ImageRef) {
        let previous = match std::mem::replace(&mut self.state, TrackerState::Empty) {
            TrackerState::Replacing { previous } => *previous,
            other => other,
        };

        let superseded = previous
            .current()
            .map(|old| old.url.clone())
            .filter(|old| *old != image.url && Some(old.as_str()) != self.original());

        info!("Featured image is now {}", image.url);
        self.state = TrackerState::Pending(ImageRef::pending(image.url));

        if let Some(old) = superseded {
            self.cleanup(&old).await;
        }
    }

    /// Deletes the current image (original included) and clears it.
    /// The state moves to `Removed` even if the delete fails.
    pub async fn remove(&mut self) {
        let previous = match std::mem::replace(&mut self.state, TrackerState::Removed) {
            TrackerState::Replacing { previous } => *previous,
            other => other,
        };

        if let Some(image) = previous.current() {
            info!("Removing featured image {}", image.url);
            let url = image.url.clone();
            if self.original.as_deref() == Some(url.as_str()) {
                self.original = None;
            }
            self.cleanup(&url).await;
        }
    }

    /// Editor closed without saving: deletes the current image unless it is
    /// the one the entity was loaded with.
    pub async fn abandon(&mut self) {
        let previous = std::mem::replace(&mut self.state, TrackerState::Empty);
        let unsaved = previous
            .current()
            .map(|image| image.url.clone())
            .filter(|url| Some(url.as_str()) != self.original());

        if let Some(url) = unsaved {
            debug!("Abandoning unsaved upload {}", url);
            self.cleanup(&url).await;
        }
        self.original = None;
    }

    /// The entity was saved with [`payload_value`](Self::payload_value); the
    /// current image is now persisted and becomes the original. A loaded
    /// original it replaced is no longer referenced and is deleted.
    pub async fn commit(&mut self) -> Option<String> {
        let state = std::mem::replace(&mut self.state, TrackerState::Empty);
        self.state = state.committed();

        let saved = self.current().map(|image| image.url.clone());
        let replaced = std::mem::replace(&mut self.original, saved.clone())
            .filter(|old| Some(old) != saved.as_ref());

        if let Some(url) = &saved {
            info!("Featured image {} committed", url);
        }
        if let Some(old) = replaced {
            debug!("Deleting replaced image {}", old);
            self.cleanup(&old).await;
        }
        saved
    }

    async fn cleanup(&self, url: &str) {
        if let Err(e) = self.store.delete(url).await {
            warn!("Best-effort image cleanup failed: {}", e);
            if let Some(tx) = &self.warnings {
                let _ = tx.send(CleanupWarning {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

impl Drop for ReferenceTracker {
    fn drop(&mut self) {
        if let Some(image) = self.state.current()
            && !image.is_persisted
            && Some(image.url.as_str()) != self.original.as_deref()
        {
            warn!(
                "Editor session dropped without abandon(); {} may be orphaned",
                image.url
            );
        }
    }
}
