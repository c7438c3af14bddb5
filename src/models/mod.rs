use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::ReadError;

/// The featured image currently attached to the entity being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Canonical location returned by the storage endpoint
    pub url: String,
    /// Already recorded against the saved entity on the server
    pub is_persisted: bool,
}

impl ImageRef {
    pub fn persisted(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_persisted: true,
        }
    }

    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_persisted: false,
        }
    }
}

/// Quarter-turn rotation applied to the source before cropping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn rotate_right(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }

    pub fn rotate_left(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw270,
            Rotation::Cw90 => Rotation::None,
            Rotation::Cw180 => Rotation::Cw90,
            Rotation::Cw270 => Rotation::Cw180,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Width and height swap on odd quarter turns
    pub fn rotated_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::Cw90 | Rotation::Cw270 => (height, width),
            Rotation::None | Rotation::Cw180 => (width, height),
        }
    }
}

/// Selected rectangle in rotated-source pixels, plus the viewport state it was made in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub zoom: f64,
    pub rotation: Rotation,
}

impl CropRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Encoded crop waiting for the storage endpoint to accept it.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub data: Bytes,
    pub file_name: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl PendingUpload {
    pub const FILE_NAME: &'static str = "cropped-image.jpg";

    pub fn jpeg(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: Bytes::from(data),
            file_name: Self::FILE_NAME.to_string(),
            mime_type: mime::IMAGE_JPEG.to_string(),
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory `data:<mime>;base64,<payload>` image used for previews.
#[derive(Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ReadError> {
        let rest = input
            .strip_prefix("data:")
            .ok_or_else(|| ReadError::MalformedDataUrl("missing data: scheme".to_string()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ReadError::MalformedDataUrl("missing payload separator".to_string()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| ReadError::MalformedDataUrl("only base64 payloads are supported".to_string()))?;

        let data = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ReadError::MalformedDataUrl(e.to_string()))?;

        Ok(Self::new(mime_type, data))
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

// Payloads can be megabytes; keep them out of logs.
impl fmt::Debug for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataUrl")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// What the crop tool is opened on.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Freshly captured local file
    Local(DataUrl),
    /// Already uploaded image, re-cropped in an edit flow
    Remote(Url),
}

impl FromStr for ImageSource {
    type Err = ReadError;

    /// Accepts a `data:` URL or an http(s) URL of an uploaded image
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.starts_with("data:") {
            return DataUrl::parse(input).map(ImageSource::Local);
        }
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(ImageSource::Remote(url)),
            _ => Err(ReadError::UnsupportedSource(input.to_string())),
        }
    }
}

/// Entities whose editors carry a featured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Article,
    Product,
    About,
}

impl EntityKind {
    /// Field the entity API expects the image URL in
    pub fn image_field(&self) -> &'static str {
        match self {
            // Articles still use the legacy field name
            EntityKind::Article => "image_path",
            EntityKind::Product | EntityKind::About => "image_url",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Article => "article",
            EntityKind::Product => "product",
            EntityKind::About => "about",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_display_and_parse() {
        let url = DataUrl::new("image/png", vec![1, 2, 3, 4]);
        let text = url.to_string();
        assert_eq!(text, "data:image/png;base64,AQIDBA==");
        assert_eq!(DataUrl::parse(&text).unwrap(), url);
    }

    #[test]
    fn test_data_url_rejects_non_base64() {
        assert!(matches!(
            DataUrl::parse("data:text/plain,hello"),
            Err(ReadError::MalformedDataUrl(_))
        ));
        assert!(DataUrl::parse("https://store/abc.jpg").is_err());
    }

    #[test]
    fn test_image_source_from_str() {
        match "data:image/png;base64,AQIDBA==".parse::<ImageSource>() {
            Ok(ImageSource::Local(url)) => assert_eq!(url.data, vec![1, 2, 3, 4]),
            other => panic!("expected Local, got {:?}", other),
        }
        match "https://store/abc.jpg".parse::<ImageSource>() {
            Ok(ImageSource::Remote(url)) => assert_eq!(url.path(), "/abc.jpg"),
            other => panic!("expected Remote, got {:?}", other),
        }
        assert!(matches!(
            "data:image/png,raw".parse::<ImageSource>(),
            Err(ReadError::MalformedDataUrl(_))
        ));
        assert!(matches!(
            "ftp://store/abc.jpg".parse::<ImageSource>(),
            Err(ReadError::UnsupportedSource(_))
        ));
        assert!(matches!(
            "photos/cat.png".parse::<ImageSource>(),
            Err(ReadError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_rotation_cycles() {
        let mut rotation = Rotation::None;
        for _ in 0..4 {
            rotation = rotation.rotate_right();
        }
        assert_eq!(rotation, Rotation::None);
        assert_eq!(Rotation::None.rotate_left(), Rotation::Cw270);
        assert_eq!(Rotation::Cw90.rotated_dimensions(1600, 900), (900, 1600));
        assert_eq!(Rotation::Cw180.degrees(), 180);
    }

    #[test]
    fn test_entity_image_fields() {
        assert_eq!(EntityKind::Article.image_field(), "image_path");
        assert_eq!(EntityKind::Product.image_field(), "image_url");
        assert_eq!(EntityKind::About.image_field(), "image_url");
    }
}
