use std::path::Path;
use tracing::{debug, info};

use crate::error::ReadError;
use crate::models::DataUrl;
use crate::utils::validation::{is_decodable_image, sniff_mime};

/// Reads a user-selected file into a preview data URL.
///
/// The MIME type comes from the file's magic bytes. Non-image content is not
/// rejected here; it fails later when the crop tool decodes it.
pub async fn capture(path: impl AsRef<Path>) -> Result<DataUrl, ReadError> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await.map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if data.is_empty() {
        return Err(ReadError::Empty(path.to_path_buf()));
    }

    let mime_type = sniff_mime(&data);
    if !is_decodable_image(&mime_type) {
        debug!("{} is not a decodable image ({})", path.display(), mime_type);
    }

    info!(
        "Captured {} ({} bytes, {})",
        path.display(),
        data.len(),
        mime_type
    );
    Ok(DataUrl::new(mime_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_capture_png() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&png_bytes()).unwrap();

        let url = capture(file.path()).await.unwrap();
        assert_eq!(url.mime_type, "image/png");
        assert!(url.to_string().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_capture_missing_file() {
        let err = capture("/definitely/not/here.jpg").await.unwrap_err();
        assert!(matches!(err, ReadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_capture_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = capture(file.path()).await.unwrap_err();
        assert!(matches!(err, ReadError::Empty(_)));
    }

    #[tokio::test]
    async fn test_capture_non_image_is_not_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text").unwrap();

        let url = capture(file.path()).await.unwrap();
        assert_eq!(url.mime_type, "application/octet-stream");
    }
}
