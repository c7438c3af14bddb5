use std::env;
use validator::Validate;

/// Configuration for the featured-image pipeline
#[derive(Debug, Clone, Validate)]
pub struct ImageConfig {
    /// Base URL of the storage and entity API (default: "http://localhost:8080")
    #[validate(url(message = "STORAGE_ENDPOINT must be an absolute URL"))]
    pub storage_endpoint: String,

    /// Maximum encoded crop size in bytes (default: 5 MB)
    #[validate(range(min = 1, message = "Maximum upload size must be positive"))]
    pub max_upload_bytes: usize,

    /// JPEG quality factor used when encoding crops (default: 85)
    #[validate(range(min = 1, max = 100, message = "JPEG quality must be between 1 and 100"))]
    pub jpeg_quality: u8,

    /// Aspect ratio numerator enforced by the crop tool (default: 16)
    #[validate(range(min = 1))]
    pub aspect_width: u32,

    /// Aspect ratio denominator enforced by the crop tool (default: 9)
    #[validate(range(min = 1))]
    pub aspect_height: u32,

    /// Minimum crop box edge in viewport pixels (default: 50)
    #[validate(range(min = 1))]
    pub min_crop_box: u32,

    /// Cookie header forwarded with every storage/entity request
    pub session_cookie: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            storage_endpoint: "http://localhost:8080".to_string(),
            max_upload_bytes: 5 * 1024 * 1024, // 5 MB
            jpeg_quality: 85,
            aspect_width: 16,
            aspect_height: 9,
            min_crop_box: 50,
            session_cookie: None,
        }
    }
}

impl ImageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_endpoint: env::var("STORAGE_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.storage_endpoint),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_bytes),

            jpeg_quality: env::var("JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.jpeg_quality),

            aspect_width: env::var("CROP_ASPECT_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.aspect_width),

            aspect_height: env::var("CROP_ASPECT_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.aspect_height),

            min_crop_box: env::var("MIN_CROP_BOX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.min_crop_box),

            session_cookie: env::var("SESSION_COOKIE").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Create config for local development (generous size limit, best quality)
    pub fn development() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            jpeg_quality: 95,
            ..Self::default()
        }
    }

    /// Create config for production (strict size limit)
    pub fn production() -> Self {
        Self {
            storage_endpoint: env::var("STORAGE_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            max_upload_bytes: 2 * 1024 * 1024,
            jpeg_quality: 85,
            ..Self::default()
        }
    }

    /// Aspect ratio (width / height) the crop tool enforces
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_width as f64 / self.aspect_height as f64
    }
}
