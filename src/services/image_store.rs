use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use url::Url;

use crate::error::{CropError, DeleteError, UploadError};
use crate::models::{ImageRef, PendingUpload};
use crate::utils::validation::is_decodable_image;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub image_url: String,
}

/// Error body shape shared by the storage and entity endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorResponse {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ApiErrorResponse {
    /// `message`, then `error`, then the raw body
    pub fn describe(body: &str) -> String {
        let parsed: ApiErrorResponse = serde_json::from_str(body).unwrap_or_default();
        parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_string())
    }
}

/// Remote image storage used by the editors
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores a cropped image; the returned reference is not yet persisted
    async fn upload(&self, blob: &PendingUpload) -> Result<ImageRef, UploadError>;

    /// Deletes a previous upload by URL
    async fn delete(&self, url: &str) -> Result<(), DeleteError>;

    /// Downloads an already uploaded image so it can be re-cropped
    async fn fetch_source(&self, url: &Url) -> Result<Vec<u8>, CropError>;
}

/// Storage endpoint client: `POST /image` (multipart) and `DELETE /image` (JSON)
pub struct HttpImageStore {
    client: Client,
    endpoint: String,
    session_cookie: Option<String>,
}

impl HttpImageStore {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            client,
            endpoint,
            session_cookie: None,
        }
    }

    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.session_cookie {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    fn image_url(&self) -> String {
        format!("{}/image", self.endpoint)
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(&self, blob: &PendingUpload) -> Result<ImageRef, UploadError> {
        let part = Part::bytes(blob.data.to_vec())
            .file_name(blob.file_name.clone())
            .mime_str(&blob.mime_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .request(Method::POST, &self.image_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!("Image upload rejected ({}): {}", status, body);
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::InvalidResponse(format!("{}: {}", e, body)))?;
        if parsed.image_url.is_empty() {
            return Err(UploadError::InvalidResponse(
                "storage returned an empty image_url".to_string(),
            ));
        }

        info!("Uploaded {} bytes as {}", blob.len(), parsed.image_url);
        Ok(ImageRef::pending(parsed.image_url))
    }

    async fn delete(&self, url: &str) -> Result<(), DeleteError> {
        if url.is_empty() {
            return Ok(());
        }

        let response = self
            .request(Method::DELETE, &self.image_url())
            .json(&DeleteRequest {
                image_url: url.to_string(),
            })
            .send()
            .await
            .map_err(|source| DeleteError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeleteError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                message: ApiErrorResponse::describe(&body),
            });
        }

        info!("Deleted image {}", url);
        Ok(())
    }

    async fn fetch_source(&self, url: &Url) -> Result<Vec<u8>, CropError> {
        let remote = |reason: String| CropError::RemoteSource {
            url: url.to_string(),
            reason,
        };

        let response = self
            .request(Method::GET, url.as_str())
            .send()
            .await
            .map_err(|e| remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote(format!("server answered {}", status)));
        }

        // A non-image body means the pixels are not readable from here
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.is_empty() && !is_decodable_image(&content_type) {
            return Err(remote(format!("unexpected content type {}", content_type)));
        }

        let data = response.bytes().await.map_err(|e| remote(e.to_string()))?;
        debug!("Fetched {} bytes from {}", data.len(), url);
        Ok(data.to_vec())
    }
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, Bytes>,
    next_id: u64,
    delete_calls: Vec<String>,
}

/// In-process store for offline runs and tests
pub struct MemoryImageStore {
    base_url: String,
    state: Mutex<MemoryState>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryImageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(MemoryState::default()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds an object, e.g. the image of an entity loaded for editing
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.state().objects.insert(url.into(), data.into());
    }

    pub fn contains(&self, url: &str) -> bool {
        self.state().objects.contains_key(url)
    }

    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Every URL passed to `delete`, in call order
    pub fn delete_calls(&self) -> Vec<String> {
        self.state().delete_calls.clone()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, blob: &PendingUpload) -> Result<ImageRef, UploadError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(UploadError::Rejected {
                status: 500,
                body: "upload disabled".to_string(),
            });
        }

        let mut state = self.state();
        state.next_id += 1;
        let url = format!("{}/{}.jpg", self.base_url, state.next_id);
        state.objects.insert(url.clone(), blob.data.clone());
        Ok(ImageRef::pending(url))
    }

    async fn delete(&self, url: &str) -> Result<(), DeleteError> {
        let mut state = self.state();
        state.delete_calls.push(url.to_string());

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(DeleteError::Rejected {
                url: url.to_string(),
                status: 500,
                message: "delete disabled".to_string(),
            });
        }

        state.objects.remove(url);
        Ok(())
    }

    async fn fetch_source(&self, url: &Url) -> Result<Vec<u8>, CropError> {
        self.state()
            .objects
            .get(url.as_str())
            .map(|data| data.to_vec())
            .ok_or_else(|| CropError::RemoteSource {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}
