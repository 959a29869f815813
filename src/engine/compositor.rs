//! Artwork compositing pipeline
//!
//! Layers the flattened 2D artwork onto a material's base color texture at
//! every patch position, pre-compensated for the mesh stretch of the selected
//! tape width, and encodes the result as a PNG texture.

use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use image::{ImageEncoder, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::Patch;
use super::compensation::StretchCompensation;

/// Compositing errors
#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("Failed to decode image: {0}")]
    DecodeFailed(#[from] image::ImageError),
    #[error("Failed to encode texture: {0}")]
    EncodeFailed(String),
    #[error("Invalid image data: {0}")]
    InvalidData(String),
    #[error("Tape width must be positive")]
    InvalidWidth,
    #[error("Compositing task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Snapshot & texture
// ============================================================================

/// Flattened raster of the 2D artwork canvas
#[derive(Debug, Clone)]
pub struct Snapshot {
    image: Arc<RgbaImage>,
}

impl Snapshot {
    pub fn from_image(image: RgbaImage) -> Self {
        Snapshot { image: Arc::new(image) }
    }

    /// Decode an encoded image (PNG, JPEG, ...)
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, CompositorError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_image(image.to_rgba8()))
    }

    /// Decode a `data:` URL or a bare base64 string
    pub fn from_data_url(data: &str) -> Result<Self, CompositorError> {
        let bytes = decode_data_url(data)?;
        Self::from_encoded(&bytes)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, CompositorError> {
        encode_png(&self.image)
    }
}

/// Composited material texture ready to be installed on the 3D model
#[derive(Debug, Clone)]
pub struct CompositeTexture {
    pub png: Bytes,
    pub width: u32,
    pub height: u32,
    /// Vertical compensation the artwork was drawn with
    pub compensation_factor: f64,
}

impl CompositeTexture {
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

/// Extract the payload of a base64 `data:` URL; bare base64 is accepted too
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, CompositorError> {
    let data = data.trim();
    let payload = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| CompositorError::InvalidData("data URL has no payload".to_string()))?;
            if !header.ends_with(";base64") {
                return Err(CompositorError::InvalidData("data URL is not base64 encoded".to_string()));
            }
            payload
        }
        None => data,
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CompositorError::InvalidData(e.to_string()))
}

/// Encode an RGBA image to PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CompositorError> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)
        .map_err(|e| CompositorError::EncodeFailed(e.to_string()))?;
    Ok(buffer)
}

// ============================================================================
// Patch geometry
// ============================================================================

/// Pixel rectangle on the texture surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Affine map from artwork pixels to texture pixels for one patch
///
/// Equivalent to the canvas sequence `translate(x·W, y·H)`,
/// `scale(1, compensation)`, `rotate(rot)`, `scale(s, s)` followed by drawing
/// the artwork centered on the origin:
///
/// ```text
/// tx = a·u + b·v + c
/// ty = d·u + e·v + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchTransform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    artwork_width: u32,
    artwork_height: u32,
}

impl PatchTransform {
    pub fn new(
        patch: &Patch,
        compensation_factor: f64,
        surface: (u32, u32),
        artwork: (u32, u32),
    ) -> Self {
        let (surface_width, surface_height) = surface;
        let (artwork_width, artwork_height) = artwork;
        let (sin, cos) = patch.rotation_radians().sin_cos();
        let s = patch.scale;

        let a = s * cos;
        let b = -s * sin;
        let d = compensation_factor * s * sin;
        let e = compensation_factor * s * cos;

        let half_w = artwork_width as f64 / 2.0;
        let half_h = artwork_height as f64 / 2.0;
        let c = surface_width as f64 * patch.x - a * half_w - b * half_h;
        let f = surface_height as f64 * patch.y - d * half_w - e * half_h;

        PatchTransform { a, b, c, d, e, f, artwork_width, artwork_height }
    }

    /// Map an artwork pixel coordinate onto the texture surface
    pub fn map(&self, u: f64, v: f64) -> (f64, f64) {
        (
            self.a * u + self.b * v + self.c,
            self.d * u + self.e * v + self.f,
        )
    }

    /// Bounding box of the transformed artwork, clipped to the surface
    pub fn clipped_bounds(&self, surface_width: u32, surface_height: u32) -> Option<PixelRect> {
        let w = self.artwork_width as f64;
        let h = self.artwork_height as f64;
        let corners = [self.map(0.0, 0.0), self.map(w, 0.0), self.map(0.0, h), self.map(w, h)];

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let x0 = min_x.floor().max(0.0);
        let y0 = min_y.floor().max(0.0);
        let x1 = max_x.ceil().min(surface_width as f64);
        let y1 = max_y.ceil().min(surface_height as f64);
        if !(x1 > x0 && y1 > y0) {
            return None;
        }

        Some(PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Projection drawing the artwork into a layer whose origin is `bounds`
    fn projection_into(&self, bounds: PixelRect) -> Option<Projection> {
        Projection::from_matrix([
            self.a as f32,
            self.b as f32,
            (self.c - bounds.x as f64) as f32,
            self.d as f32,
            self.e as f32,
            (self.f - bounds.y as f64) as f32,
            0.0,
            0.0,
            1.0,
        ])
    }
}

// ============================================================================
// Compositor
// ============================================================================

/// Image compositor for artwork textures
#[derive(Debug, Clone)]
pub struct Compositor {
    compensation: Arc<StretchCompensation>,
}

impl Compositor {
    pub fn new(compensation: StretchCompensation) -> Self {
        Compositor { compensation: Arc::new(compensation) }
    }

    pub fn compensation(&self) -> &StretchCompensation {
        &self.compensation
    }

    /// Composite the snapshot onto the base texture at every patch
    ///
    /// Returns `Ok(None)` without drawing when there is no snapshot yet.
    pub fn compose(
        &self,
        base: &RgbaImage,
        width_mm: u32,
        patches: &[Patch],
        snapshot: Option<&Snapshot>,
    ) -> Result<Option<CompositeTexture>, CompositorError> {
        let Some(snapshot) = snapshot else {
            debug!("No artwork snapshot available, nothing to composite");
            return Ok(None);
        };
        if width_mm == 0 {
            return Err(CompositorError::InvalidWidth);
        }

        let compensation_factor = self.compensation.factor(width_mm);
        debug!(
            width_mm = width_mm,
            compensation_factor = compensation_factor,
            patches = patches.len(),
            "Starting artwork composite"
        );

        let surface = layer_patches(base, snapshot.image(), patches, compensation_factor);
        let (width, height) = surface.dimensions();
        let png = encode_png(&surface)?;

        info!(
            width = width,
            height = height,
            bytes = png.len(),
            "Artwork composite complete"
        );

        Ok(Some(CompositeTexture {
            png: Bytes::from(png),
            width,
            height,
            compensation_factor,
        }))
    }

    /// Run [`Compositor::compose`] on the blocking pool
    pub async fn compose_async(
        &self,
        base: Arc<RgbaImage>,
        width_mm: u32,
        patches: Vec<Patch>,
        snapshot: Option<Snapshot>,
    ) -> Result<Option<CompositeTexture>, CompositorError> {
        if snapshot.is_none() {
            return Ok(None);
        }

        let compositor = self.clone();
        tokio::task::spawn_blocking(move || {
            compositor.compose(&base, width_mm, &patches, snapshot.as_ref())
        })
        .await
        .map_err(|e| CompositorError::TaskFailed(e.to_string()))?
    }
}

/// Draw the artwork onto a copy of the base once per patch, in list order
pub fn layer_patches(
    base: &RgbaImage,
    artwork: &RgbaImage,
    patches: &[Patch],
    compensation_factor: f64,
) -> RgbaImage {
    let mut surface = base.clone();
    let (surface_width, surface_height) = surface.dimensions();
    if artwork.width() == 0 || artwork.height() == 0 {
        return surface;
    }

    for (index, patch) in patches.iter().enumerate() {
        if let Err(e) = patch.check_drawable() {
            warn!(index = index, error = %e, "Skipping patch with degenerate geometry");
            continue;
        }

        let transform = PatchTransform::new(
            patch,
            compensation_factor,
            (surface_width, surface_height),
            artwork.dimensions(),
        );
        let Some(bounds) = transform.clipped_bounds(surface_width, surface_height) else {
            debug!(index = index, "Patch lies outside the texture");
            continue;
        };
        let Some(projection) = transform.projection_into(bounds) else {
            warn!(index = index, "Patch transform is not invertible");
            continue;
        };

        let mut layer = RgbaImage::new(bounds.width, bounds.height);
        warp_into(artwork, &projection, Interpolation::Bilinear, Rgba([0, 0, 0, 0]), &mut layer);
        blend_over(&mut surface, &layer, bounds.x, bounds.y);
    }

    surface
}

/// Source-over blend a layer onto the surface with its top-left at (x, y)
fn blend_over(surface: &mut RgbaImage, layer: &RgbaImage, x: u32, y: u32) {
    let stride = surface.width() as usize * 4;
    let layer_stride = layer.width() as usize * 4;
    let start = x as usize * 4;
    let pixels: &mut [u8] = &mut **surface;

    pixels
        .par_chunks_mut(stride)
        .skip(y as usize)
        .zip(layer.as_raw().par_chunks(layer_stride))
        .for_each(|(row, layer_row)| {
            let row = &mut row[start..start + layer_stride];
            for (dst, src) in row.chunks_exact_mut(4).zip(layer_row.chunks_exact(4)) {
                // Skip fully transparent pixels
                if src[3] == 0 {
                    continue;
                }
                let blended = source_over([dst[0], dst[1], dst[2], dst[3]], [src[0], src[1], src[2], src[3]]);
                dst.copy_from_slice(&blended);
            }
        });
}

/// Straight-alpha source-over
fn source_over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 {
        return src;
    }

    let sa = src[3] as f64 / 255.0;
    let da = dst[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (src[i] as f64 * sa + dst[i] as f64 * da * (1.0 - sa)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}
