//! Material texture loading and management

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use image::{ImageError, RgbaImage};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Catalog, TapeModelKey};

/// Texture-related errors
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("No base texture loaded for {model}/{material}")]
    Unavailable { model: TapeModelKey, material: String },
    #[error("Failed to decode texture: {0}")]
    Decode(#[from] ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to fetch texture: {0}")]
    Fetch(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where a texture file lives
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    Local(PathBuf),
    Remote(String),
}

impl TextureSource {
    /// Resolve a catalog texture reference against the asset root
    pub fn resolve(reference: &str, root: &Path) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            TextureSource::Remote(reference.to_string())
        } else {
            TextureSource::Local(root.join(reference))
        }
    }
}

impl std::fmt::Display for TextureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureSource::Local(path) => write!(f, "{}", path.display()),
            TextureSource::Remote(url) => write!(f, "{}", url),
        }
    }
}

type TextureKey = (TapeModelKey, String);

/// Base color textures of every catalog material, decoded in memory
pub struct TextureLibrary {
    textures: RwLock<HashMap<TextureKey, Arc<RgbaImage>>>,
}

impl TextureLibrary {
    pub fn new() -> Self {
        TextureLibrary {
            textures: RwLock::new(HashMap::new()),
        }
    }

    /// Load the base color map of every material in the catalog
    ///
    /// A texture that fails to load is logged and left out; requests for
    /// that material then fail with [`TextureError::Unavailable`].
    pub async fn load(catalog: &Catalog, root: &Path, fetch_timeout: Duration) -> Result<Self, TextureError> {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .user_agent(concat!("tape-configurator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let jobs: Vec<(TextureKey, TextureSource)> = catalog
            .models()
            .flat_map(|model| {
                model.materials.iter().map(move |material| {
                    (
                        (model.key, material.id.clone()),
                        TextureSource::resolve(&material.textures.map, root),
                    )
                })
            })
            .collect();

        let loads = jobs.into_iter().map(|(key, source)| {
            let client = http_client.clone();
            async move {
                let result = load_texture(&client, &source).await;
                (key, source, result)
            }
        });

        let library = TextureLibrary::new();
        for ((model, material), source, result) in join_all(loads).await {
            match result {
                Ok(image) => {
                    info!(
                        model = %model,
                        material = %material,
                        source = %source,
                        width = image.width(),
                        height = image.height(),
                        "Loaded base texture"
                    );
                    library.insert(model, &material, image);
                }
                Err(e) => {
                    warn!(
                        model = %model,
                        material = %material,
                        source = %source,
                        error = %e,
                        "Failed to load base texture"
                    );
                }
            }
        }

        Ok(library)
    }

    pub fn insert(&self, model: TapeModelKey, material: &str, image: RgbaImage) {
        self.textures
            .write()
            .insert((model, material.to_string()), Arc::new(image));
    }

    /// Base color texture for a material
    pub fn base_color(&self, model: TapeModelKey, material: &str) -> Result<Arc<RgbaImage>, TextureError> {
        self.textures
            .read()
            .get(&(model, material.to_string()))
            .cloned()
            .ok_or_else(|| TextureError::Unavailable {
                model,
                material: material.to_string(),
            })
    }

    pub fn texture_count(&self) -> usize {
        self.textures.read().len()
    }
}

impl Default for TextureLibrary {
    fn default() -> Self {
        Self::new()
    }
}

async fn load_texture(client: &reqwest::Client, source: &TextureSource) -> Result<RgbaImage, TextureError> {
    match source {
        TextureSource::Local(path) => {
            let path = path.clone();
            // Spawn blocking task for file I/O and decoding
            tokio::task::spawn_blocking(move || -> Result<RgbaImage, TextureError> {
                Ok(image::open(&path)?.to_rgba8())
            })
                .await
                .map_err(|e| TextureError::Fetch(format!("Task join error: {}", e)))?
        }
        TextureSource::Remote(url) => {
            debug!(url = %url, "Fetching remote texture");
            let response = client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(TextureError::Fetch(format!("HTTP {}: {}", response.status(), url)));
            }
            let bytes = response.bytes().await?;
            Ok(image::load_from_memory(&bytes)?.to_rgba8())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_resolve_sources() {
        let root = Path::new("assets");
        assert_eq!(
            TextureSource::resolve("texture/base_color.png", root),
            TextureSource::Local(PathBuf::from("assets/texture/base_color.png"))
        );
        assert_eq!(
            TextureSource::resolve("https://cdn.example.com/kraft.png", root),
            TextureSource::Remote("https://cdn.example.com/kraft.png".to_string())
        );
    }

    #[test]
    fn test_missing_texture_is_unavailable() {
        let library = TextureLibrary::new();
        assert!(matches!(
            library.base_color(TapeModelKey::Kraft, "standard"),
            Err(TextureError::Unavailable { .. })
        ));

        library.insert(TapeModelKey::Kraft, "standard", RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])));
        assert_eq!(library.base_color(TapeModelKey::Kraft, "standard").unwrap().width(), 2);
        assert_eq!(library.texture_count(), 1);
    }

    #[tokio::test]
    async fn test_load_from_disk_skips_missing_files() {
        let root = std::env::temp_dir().join(format!("tape-textures-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("texture")).unwrap();

        let catalog = Catalog::builtin();
        let library = TextureLibrary::load(&catalog, &root, Duration::from_secs(1)).await.unwrap();
        assert_eq!(library.texture_count(), 0);

        RgbaImage::from_pixel(4, 3, Rgba([200, 150, 100, 255]))
            .save(root.join("texture/base_color.png"))
            .unwrap();
        let library = TextureLibrary::load(&catalog, &root, Duration::from_secs(1)).await.unwrap();
        let texture = library.base_color(TapeModelKey::Kraft, "standard").unwrap();
        assert_eq!(texture.dimensions(), (4, 3));

        std::fs::remove_dir_all(&root).ok();
    }
}
