//! 2D artwork editor
//!
//! Holds the artwork as a stack of text and image objects on a fixed-size
//! transparent canvas. Every mutation bumps a revision on a watch channel so
//! the owning session can regenerate the preview texture.
//!
//! Decoding uploads and rasterizing the canvas are kept out of the editor so
//! callers can run them off the lock that guards it: `decode_upload` prepares
//! an image before insertion and `scene` hands out a cheap copy to render.

use std::sync::Arc;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::Scale;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{CompositingSettings, EditorSettings};
use super::compositor::Snapshot;
use super::fonts::{FontBook, FontError};

/// Where new objects are dropped on the canvas
const TEXT_ORIGIN: (i32, i32) = (50, 20);
const IMAGE_ORIGIN: (i32, i32) = (50, 50);

/// Editor errors
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Font(#[from] FontError),
    #[error("Invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Object {0} does not exist")]
    ObjectNotFound(Uuid),
    #[error("Select an element to delete first")]
    NothingSelected,
}

/// Parse a `#rrggbb` or `#rrggbbaa` color
pub fn parse_color(value: &str) -> Result<Rgba<u8>, EditorError> {
    let invalid = || EditorError::InvalidColor(value.to_string());
    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

/// Canvas size and defaults for new objects
#[derive(Debug, Clone)]
pub struct EditorOptions {
    pub width: u32,
    pub height: u32,
    pub default_font: String,
    pub default_color: Rgba<u8>,
    pub font_size: f32,
    pub max_image_dimension: u32,
}

impl EditorOptions {
    pub fn from_settings(compositing: &CompositingSettings, editor: &EditorSettings) -> Result<Self, EditorError> {
        let (width, height) = compositing.canvas_dimensions();
        Ok(EditorOptions {
            width,
            height,
            default_font: editor.default_font.clone(),
            default_color: parse_color(&editor.default_color)?,
            font_size: editor.font_size,
            max_image_dimension: editor.max_image_dimension,
        })
    }
}

#[derive(Debug, Clone)]
struct TextObject {
    content: String,
    font_family: String,
    color: Rgba<u8>,
    font_size: f32,
}

#[derive(Debug, Clone)]
enum ArtworkObject {
    Text(TextObject),
    Image(Arc<RgbaImage>),
}

#[derive(Debug, Clone)]
struct Layer {
    id: Uuid,
    left: i32,
    top: i32,
    object: ArtworkObject,
}

/// Object kind as exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Text,
    Image,
}

/// Read-only view of an editor object
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObjectSummary {
    pub id: Uuid,
    pub kind: ObjectKind,
    pub left: i32,
    pub top: i32,
    /// Text content (text objects only)
    pub text: Option<String>,
    pub font_family: Option<String>,
    /// Pixel size (image objects only)
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Layered artwork canvas
pub struct ArtworkEditor {
    options: EditorOptions,
    fonts: Arc<FontBook>,
    layers: Vec<Layer>,
    selected: Option<Uuid>,
    revision: watch::Sender<u64>,
}

impl ArtworkEditor {
    pub fn new(options: EditorOptions, fonts: Arc<FontBook>) -> Self {
        let (revision, _) = watch::channel(0);
        ArtworkEditor {
            options,
            fonts,
            layers: Vec::new(),
            selected: None,
            revision,
        }
    }

    /// Receiver notified after every mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    fn notify_changed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Add a text object and select it
    pub fn add_text(&mut self, text: &str, font: Option<&str>, color: Option<&str>) -> Result<Uuid, EditorError> {
        if text.trim().is_empty() {
            return Err(EditorError::EmptyText);
        }

        let font_family = font.unwrap_or(&self.options.default_font).to_string();
        if !self.fonts.contains(&font_family) {
            return Err(FontError::NotInstalled(font_family).into());
        }
        let color = match color {
            Some(value) => parse_color(value)?,
            None => self.options.default_color,
        };

        let id = Uuid::new_v4();
        self.layers.push(Layer {
            id,
            left: TEXT_ORIGIN.0,
            top: TEXT_ORIGIN.1,
            object: ArtworkObject::Text(TextObject {
                content: text.to_string(),
                font_family,
                color,
                font_size: self.options.font_size,
            }),
        });
        self.selected = Some(id);

        debug!(object_id = %id, "Added text object");
        self.notify_changed();
        Ok(id)
    }

    /// Switch every text object to a font; returns whether anything changed
    pub fn set_font(&mut self, font: &str) -> Result<bool, EditorError> {
        if !self.fonts.contains(font) {
            return Err(FontError::NotInstalled(font.to_string()).into());
        }

        let mut changed = false;
        for layer in &mut self.layers {
            if let ArtworkObject::Text(text) = &mut layer.object {
                text.font_family = font.to_string();
                changed = true;
            }
        }

        if changed {
            self.notify_changed();
        }
        Ok(changed)
    }

    /// Add an image prepared by [`decode_upload`] and select it
    pub fn add_image(&mut self, image: RgbaImage) -> Uuid {
        let id = Uuid::new_v4();
        debug!(
            object_id = %id,
            width = image.width(),
            height = image.height(),
            "Added image object"
        );
        self.layers.push(Layer {
            id,
            left: IMAGE_ORIGIN.0,
            top: IMAGE_ORIGIN.1,
            object: ArtworkObject::Image(Arc::new(image)),
        });
        self.selected = Some(id);

        self.notify_changed();
        id
    }

    pub fn select(&mut self, id: Uuid) -> Result<(), EditorError> {
        if !self.layers.iter().any(|layer| layer.id == id) {
            return Err(EditorError::ObjectNotFound(id));
        }
        self.selected = Some(id);
        Ok(())
    }

    /// Remove the selected object
    pub fn remove_selected(&mut self) -> Result<Uuid, EditorError> {
        let id = self.selected.take().ok_or(EditorError::NothingSelected)?;
        self.layers.retain(|layer| layer.id != id);

        debug!(object_id = %id, "Removed object");
        self.notify_changed();
        Ok(id)
    }

    /// Objects in stacking order, bottom first
    pub fn objects(&self) -> Vec<ObjectSummary> {
        self.layers
            .iter()
            .map(|layer| match &layer.object {
                ArtworkObject::Text(text) => ObjectSummary {
                    id: layer.id,
                    kind: ObjectKind::Text,
                    left: layer.left,
                    top: layer.top,
                    text: Some(text.content.clone()),
                    font_family: Some(text.font_family.clone()),
                    width: None,
                    height: None,
                },
                ArtworkObject::Image(image) => ObjectSummary {
                    id: layer.id,
                    kind: ObjectKind::Image,
                    left: layer.left,
                    top: layer.top,
                    text: None,
                    font_family: None,
                    width: Some(image.width()),
                    height: Some(image.height()),
                },
            })
            .collect()
    }

    /// Copy of the current objects, detached from the editor
    pub fn scene(&self) -> ArtworkScene {
        ArtworkScene {
            width: self.options.width,
            height: self.options.height,
            fonts: self.fonts.clone(),
            layers: self.layers.clone(),
        }
    }
}

/// Frozen editor content that can be rendered on any thread
#[derive(Clone)]
pub struct ArtworkScene {
    width: u32,
    height: u32,
    fonts: Arc<FontBook>,
    layers: Vec<Layer>,
}

impl ArtworkScene {
    /// Flatten all objects onto a transparent canvas
    pub fn render(&self) -> Result<Snapshot, EditorError> {
        let mut canvas = RgbaImage::new(self.width, self.height);

        for layer in &self.layers {
            match &layer.object {
                ArtworkObject::Text(text) => {
                    let font = self.fonts.get(&text.font_family)?;
                    draw_text_mut(
                        &mut canvas,
                        text.color,
                        layer.left,
                        layer.top,
                        Scale::uniform(text.font_size),
                        &font,
                        &text.content,
                    );
                }
                ArtworkObject::Image(image) => {
                    image::imageops::overlay(&mut canvas, image.as_ref(), layer.left as i64, layer.top as i64);
                }
            }
        }

        Ok(Snapshot::from_image(canvas))
    }
}

/// Decode an uploaded image and fit it to the size cap
pub fn decode_upload(bytes: &[u8], max_dimension: u32) -> Result<RgbaImage, EditorError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    Ok(fit_within(image, max_dimension))
}

/// Scale down uniformly so neither side exceeds `max_dimension`
fn fit_within(image: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }

    let ratio = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);
    image::imageops::resize(&image, new_width, new_height, FilterType::Lanczos3)
}
