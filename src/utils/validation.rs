use crate::error::CropError;

/// Fallback MIME type for content the sniffer does not recognise
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Image MIME types the decoder in this crate can read
pub const DECODABLE_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Validates the encoded crop size against the upload limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), CropError> {
    if size > max_size {
        tracing::debug!(
            "Cropped image of {} bytes exceeds limit of {} bytes",
            size,
            max_size
        );
        return Err(CropError::TooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// Normalises a MIME type: strips parameters and lowercases it
pub fn normalize_mime(content_type: &str) -> String {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    // Browsers and older tools still emit these aliases
    match normalized.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-png" => "image/png".to_string(),
        _ => normalized,
    }
}

/// True when the MIME type is one the crop tool can decode
pub fn is_decodable_image(content_type: &str) -> bool {
    DECODABLE_IMAGE_TYPES.contains(&normalize_mime(content_type).as_str())
}

/// Sniffs the MIME type from magic bytes, falling back to octet-stream
pub fn sniff_mime(data: &[u8]) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Checks that `width / height` matches `ratio` once pixel rounding is allowed for.
///
/// A dimension derived from the other one by rounding can be off by at most one
/// pixel, so the tolerance is the ratio change caused by one pixel of height.
pub fn matches_aspect_ratio(width: u32, height: u32, ratio: f64) -> bool {
    if width == 0 || height == 0 || ratio <= 0.0 {
        return false;
    }
    let actual = width as f64 / height as f64;
    let tolerance = ratio / height as f64 + f64::EPSILON;
    (actual - ratio).abs() <= tolerance
}
