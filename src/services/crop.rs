use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::CropError;
use crate::models::{CropRegion, DataUrl, PendingUpload, Rotation};
use crate::utils::validation::validate_file_size;

/// Zoom bounds and step of the crop viewport
pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.1;

/// Share of the viewport the initial crop box covers
const AUTO_CROP_AREA: f64 = 0.8;

/// Renders `region` of `source` at native resolution and encodes it as JPEG.
///
/// The source is rotated first; the region is expressed in rotated pixels.
pub fn render_crop(
    source: &DynamicImage,
    region: &CropRegion,
    quality: u8,
) -> Result<Vec<u8>, CropError> {
    if region.is_empty() {
        return Err(CropError::EmptySelection);
    }

    let rotated = match region.rotation {
        Rotation::None => None,
        Rotation::Cw90 => Some(source.rotate90()),
        Rotation::Cw180 => Some(source.rotate180()),
        Rotation::Cw270 => Some(source.rotate270()),
    };
    let oriented = rotated.as_ref().unwrap_or(source);

    let fits = region
        .x
        .checked_add(region.width)
        .is_some_and(|right| right <= oriented.width())
        && region
            .y
            .checked_add(region.height)
            .is_some_and(|bottom| bottom <= oriented.height());
    if !fits {
        return Err(CropError::BitmapUnavailable {
            width: region.width,
            height: region.height,
        });
    }

    // JPEG has no alpha channel
    let cropped = oriented
        .crop_imm(region.x, region.y, region.width, region.height)
        .to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        cropped.as_raw(),
        cropped.width(),
        cropped.height(),
        ColorType::Rgb8,
    )?;

    if out.is_empty() {
        return Err(CropError::EmptyEncoding);
    }

    debug!(
        "Rendered {}x{} crop at ({}, {}) rotated {}° into {} bytes",
        region.width,
        region.height,
        region.x,
        region.y,
        region.rotation.degrees(),
        out.len()
    );
    Ok(out)
}

/// Crop box in viewport pixels (the rotated source scaled by the zoom)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Interactive crop surface over one source image.
///
/// Holds the only mutable crop state (selection, zoom, rotation); the pixels
/// are produced by [`render_crop`] on confirmation.
#[derive(Debug)]
pub struct CropTool {
    source: DynamicImage,
    aspect_ratio: f64,
    min_crop_box: f64,
    jpeg_quality: u8,
    max_upload_bytes: usize,
    zoom: f64,
    rotation: Rotation,
    selection: Option<Selection>,
}

impl CropTool {
    pub fn open(source: DynamicImage, config: &ImageConfig) -> Self {
        let mut tool = Self {
            source,
            aspect_ratio: config.aspect_ratio(),
            min_crop_box: config.min_crop_box as f64,
            jpeg_quality: config.jpeg_quality,
            max_upload_bytes: config.max_upload_bytes,
            zoom: MIN_ZOOM,
            rotation: Rotation::None,
            selection: None,
        };
        tool.selection = Some(tool.default_selection());
        info!(
            "Crop tool opened on {}x{} image",
            tool.source.width(),
            tool.source.height()
        );
        tool
    }

    /// Opens the tool on a captured local file
    pub fn from_data_url(data_url: &DataUrl, config: &ImageConfig) -> Result<Self, CropError> {
        let source = image::load_from_memory(&data_url.data)
            .map_err(|e| CropError::UndecodableSource(e.to_string()))?;
        Ok(Self::open(source, config))
    }

    /// Opens the tool on bytes fetched from an already uploaded image
    pub fn from_remote_bytes(url: &str, data: &[u8], config: &ImageConfig) -> Result<Self, CropError> {
        let source = image::load_from_memory(data).map_err(|e| CropError::RemoteSource {
            url: url.to_string(),
            reason: format!("not a decodable image: {}", e),
        })?;
        Ok(Self::open(source, config))
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Size of the rotated, zoomed source as shown in the viewport
    pub fn viewport_size(&self) -> (f64, f64) {
        let (w, h) = self.oriented_size();
        (w as f64 * self.zoom, h as f64 * self.zoom)
    }

    fn oriented_size(&self) -> (u32, u32) {
        self.rotation
            .rotated_dimensions(self.source.width(), self.source.height())
    }

    /// Largest aspect-correct box inside the centred auto-crop area
    fn default_selection(&self) -> Selection {
        let (vw, vh) = self.viewport_size();
        let (width, height) = self.fit_aspect(vw * AUTO_CROP_AREA, vh * AUTO_CROP_AREA);
        Selection {
            x: (vw - width) / 2.0,
            y: (vh - height) / 2.0,
            width,
            height,
        }
    }

    fn fit_aspect(&self, max_width: f64, max_height: f64) -> (f64, f64) {
        let width = max_width.min(max_height * self.aspect_ratio);
        (width, width / self.aspect_ratio)
    }

    /// Drags a crop box. The box keeps the configured aspect ratio, is at least
    /// the minimum size and stays inside the viewport. A zero-sized drag clears
    /// the selection.
    pub fn select(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if width <= 0.0 || height <= 0.0 || !width.is_finite() || !height.is_finite() {
            self.clear_selection();
            return;
        }

        let (mut w, mut h) = self.fit_aspect(width, height);

        if w < self.min_crop_box || h < self.min_crop_box {
            let scale = (self.min_crop_box / w).max(self.min_crop_box / h);
            w *= scale;
            h *= scale;
        }

        let (vw, vh) = self.viewport_size();
        if w > vw || h > vh {
            (w, h) = self.fit_aspect(vw, vh);
        }

        self.selection = Some(Selection {
            x: x.clamp(0.0, (vw - w).max(0.0)),
            y: y.clamp(0.0, (vh - h).max(0.0)),
            width: w,
            height: h,
        });
    }

    pub fn clear_selection(&mut self) {
        debug!("Crop selection cleared");
        self.selection = None;
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - ZOOM_STEP);
    }

    /// Sets the zoom (clamped to 1x-3x); the crop box stays where it is on screen
    pub fn set_zoom(&mut self, zoom: f64) {
        // Snap to the step grid so repeated steps do not drift
        let zoom = ((zoom / ZOOM_STEP).round() * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom = zoom;
        if let Some(s) = self.selection {
            self.select(s.x, s.y, s.width, s.height);
        }
    }

    pub fn rotate_right(&mut self) {
        self.rotation = self.rotation.rotate_right();
        self.selection = Some(self.default_selection());
    }

    pub fn rotate_left(&mut self) {
        self.rotation = self.rotation.rotate_left();
        self.selection = Some(self.default_selection());
    }

    /// Back to zoom 1x, no rotation and the initial crop box
    pub fn reset(&mut self) {
        self.zoom = MIN_ZOOM;
        self.rotation = Rotation::None;
        self.selection = Some(self.default_selection());
    }

    /// Current selection mapped to rotated-source pixels
    pub fn region(&self) -> Option<CropRegion> {
        let selection = self.selection?;
        let (ow, oh) = self.oriented_size();

        let x = ((selection.x / self.zoom).round() as u32).min(ow);
        let y = ((selection.y / self.zoom).round() as u32).min(oh);
        let width = ((selection.width / self.zoom).round() as u32).min(ow - x);
        let height = ((selection.height / self.zoom).round() as u32).min(oh - y);

        Some(CropRegion {
            x,
            y,
            width,
            height,
            zoom: self.zoom,
            rotation: self.rotation,
        })
    }

    /// Renders and encodes the selection, enforcing the upload size limit
    pub fn confirm_crop(&self) -> Result<PendingUpload, CropError> {
        let region = self.region().ok_or(CropError::EmptySelection)?;
        let data = render_crop(&self.source, &region, self.jpeg_quality)?;
        validate_file_size(data.len(), self.max_upload_bytes)?;

        info!(
            "Crop confirmed: {}x{} JPEG, {} bytes",
            region.width,
            region.height,
            data.len()
        );
        Ok(PendingUpload::jpeg(data, region.width, region.height))
    }

    /// Closes the tool without producing anything
    pub fn cancel(self) {
        debug!("Crop tool cancelled");
    }
}
