use std::path::PathBuf;
use thiserror::Error;

/// The selected local file could not be turned into a preview data URL.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File {0} is empty")]
    Empty(PathBuf),

    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("{0} is neither a data URL nor an http(s) image URL")]
    UnsupportedSource(String),
}

/// Trimming failed. The crop tool stays open so the user can retry.
#[derive(Error, Debug)]
pub enum CropError {
    #[error("Trimming failed: no crop area selected")]
    EmptySelection,

    #[error("Trimming failed: could not allocate a {width}x{height} bitmap")]
    BitmapUnavailable { width: u32, height: u32 },

    #[error("Trimming failed: encoder produced no data")]
    EmptyEncoding,

    #[error("Trimming failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Cropped image is {size} bytes, the maximum upload size is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Source image could not be decoded: {0}")]
    UndecodableSource(String),

    #[error("Remote image {url} cannot be read for cropping: {reason}")]
    RemoteSource { url: String, reason: String },
}

/// The storage endpoint refused or failed the upload. No automatic retry.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload failed with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Upload request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upload response was not understood: {0}")]
    InvalidResponse(String),
}

/// A best-effort delete did not go through. Never blocks editing.
#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("Deleting {url} failed with status {status}: {message}")]
    Rejected {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Deleting {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DeleteError {
    pub fn url(&self) -> &str {
        match self {
            DeleteError::Rejected { url, .. } | DeleteError::Transport { url, .. } => url,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    #[error("An image upload is already in progress")]
    UploadInFlight,
}

/// Saving the parent entity failed.
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Entity API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Entity API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Any failure of the capture → crop → upload pipeline.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}
