//! Font registry for artwork text

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rusttype::Font;
use thiserror::Error;
use tracing::{info, warn};

/// Font loading errors
#[derive(Debug, Error)]
pub enum FontError {
    #[error("Font '{0}' is not installed")]
    NotInstalled(String),
    #[error("Font file {0} could not be parsed")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fonts available to the editor, keyed by family name
#[derive(Clone, Default)]
pub struct FontBook {
    fonts: HashMap<String, Arc<Font<'static>>>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.ttf`/`.otf` file in a directory; the file stem is the family
    pub fn load_dir(dir: &Path) -> Result<Self, FontError> {
        let mut book = FontBook::new();

        if !dir.exists() {
            warn!("Font directory does not exist: {}", dir.display());
            return Ok(book);
        }

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_lowercase().as_str(), "ttf" | "otf"))
                .unwrap_or(false);
            let Some(family) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if !is_font {
                continue;
            }

            let bytes = std::fs::read(&path)?;
            match book.insert_bytes(&family, bytes) {
                Ok(()) => info!(family = %family, "Loaded font"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping font"),
            }
        }

        Ok(book)
    }

    /// Register a font from its file contents
    pub fn insert_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), FontError> {
        let font = Font::try_from_vec(bytes).ok_or_else(|| FontError::Invalid(family.to_string()))?;
        self.fonts.insert(family.to_string(), Arc::new(font));
        Ok(())
    }

    pub fn get(&self, family: &str) -> Result<Arc<Font<'static>>, FontError> {
        self.fonts
            .get(family)
            .cloned()
            .ok_or_else(|| FontError::NotInstalled(family.to_string()))
    }

    pub fn contains(&self, family: &str) -> bool {
        self.fonts.contains_key(family)
    }

    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<_> = self.fonts.keys().cloned().collect();
        families.sort();
        families
    }
}
