//! Tape product catalog
//!
//! Typed description of the tape models the configurator sells: allowed
//! dimensions, materials with their PBR texture files, and pricing factors.
//! The catalog is validated once at load time so later lookups can rely on
//! its invariants.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Catalog loading and validation errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Catalog defines no models")]
    Empty,
    #[error("Model '{0}' is defined more than once")]
    DuplicateModel(TapeModelKey),
    #[error("Default model '{0}' is not defined")]
    MissingDefault(TapeModelKey),
    #[error("Model '{model}' is invalid: {reason}")]
    InvalidModel { model: TapeModelKey, reason: String },
}

// ============================================================================
// Model keys
// ============================================================================

/// Known tape model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TapeModelKey {
    /// Kraft paper tape
    Kraft,
}

impl TapeModelKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TapeModelKey::Kraft => "kraft",
        }
    }

    /// Parse a model key from its wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kraft" => Some(TapeModelKey::Kraft),
            _ => None,
        }
    }
}

impl std::fmt::Display for TapeModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Materials
// ============================================================================

/// How a material's surface is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// The untouched scanned material
    Original,
}

/// PBR texture files of a material
///
/// `map` is the base color texture artwork gets painted on; the remaining
/// maps are passed through to the 3D viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TextureFiles {
    pub map: String,
    pub normal_map: Option<String>,
    pub roughness_map: Option<String>,
    pub metallic_map: Option<String>,
    pub ao_map: Option<String>,
}

/// A selectable material of a tape model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub kind: MaterialKind,
    /// Swatch color shown next to the material name
    pub preview_color: String,
    pub textures: TextureFiles,
}

// ============================================================================
// Pricing
// ============================================================================

/// Multiplicative price factors keyed by dimension (as a string, e.g. "38")
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pricing {
    #[serde(default)]
    pub width: BTreeMap<String, f64>,
    #[serde(default)]
    pub length: BTreeMap<String, f64>,
}

impl Pricing {
    /// Factor for a width in mm; widths without an entry cost the base price
    pub fn width_factor(&self, width_mm: u32) -> f64 {
        self.width.get(&width_mm.to_string()).copied().unwrap_or(1.0)
    }

    /// Factor for a length in m
    pub fn length_factor(&self, length_m: u32) -> f64 {
        self.length.get(&length_m.to_string()).copied().unwrap_or(1.0)
    }
}

// ============================================================================
// Tape model
// ============================================================================

/// A tape model with its allowed configurations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TapeModel {
    pub key: TapeModelKey,
    pub name: String,
    /// Price per roll before dimension factors
    pub base_price: f64,
    pub currency: String,
    /// Allowed roll lengths in meters
    pub lengths: Vec<u32>,
    /// Allowed tape widths in millimeters
    pub widths: Vec<u32>,
    pub materials: Vec<Material>,
    #[serde(default)]
    pub pricing: Pricing,
}

impl TapeModel {
    pub fn material(&self, id: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn allows_width(&self, width_mm: u32) -> bool {
        self.widths.contains(&width_mm)
    }

    pub fn allows_length(&self, length_m: u32) -> bool {
        self.lengths.contains(&length_m)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidModel { model: self.key, reason };

        if self.widths.is_empty() || self.lengths.is_empty() {
            return Err(invalid("widths and lengths must not be empty".to_string()));
        }
        if self.widths.contains(&0) || self.lengths.contains(&0) {
            return Err(invalid("dimensions must be positive".to_string()));
        }
        if !self.base_price.is_finite() || self.base_price < 0.0 {
            return Err(invalid(format!("base price {} is not a valid price", self.base_price)));
        }
        if self.materials.is_empty() {
            return Err(invalid("at least one material is required".to_string()));
        }

        let mut seen = HashSet::new();
        for material in &self.materials {
            if !seen.insert(material.id.as_str()) {
                return Err(invalid(format!("material '{}' is defined more than once", material.id)));
            }
            if material.textures.map.trim().is_empty() {
                return Err(invalid(format!("material '{}' has no base color map", material.id)));
            }
        }

        let check_factors = |label: &str, factors: &BTreeMap<String, f64>, allowed: &[u32]| {
            for (key, factor) in factors {
                let known = key.parse::<u32>().map(|v| allowed.contains(&v)).unwrap_or(false);
                if !known {
                    return Err(invalid(format!("{} pricing key '{}' is not an allowed {}", label, key, label)));
                }
                if !factor.is_finite() || *factor <= 0.0 {
                    return Err(invalid(format!("{} pricing factor for '{}' must be positive", label, key)));
                }
            }
            Ok(())
        };
        check_factors("width", &self.pricing.width, &self.widths)?;
        check_factors("length", &self.pricing.length, &self.lengths)?;

        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    default_model: TapeModelKey,
    models: Vec<TapeModel>,
}

/// Validated set of tape models
#[derive(Debug, Clone)]
pub struct Catalog {
    default_model: TapeModelKey,
    models: BTreeMap<TapeModelKey, TapeModel>,
}

impl Catalog {
    /// Build and validate a catalog from a list of models
    pub fn new(default_model: TapeModelKey, models: Vec<TapeModel>) -> Result<Self, CatalogError> {
        if models.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut by_key = BTreeMap::new();
        for model in models {
            model.validate()?;
            let key = model.key;
            if by_key.insert(key, model).is_some() {
                return Err(CatalogError::DuplicateModel(key));
            }
        }

        if !by_key.contains_key(&default_model) {
            return Err(CatalogError::MissingDefault(default_model));
        }

        Ok(Catalog { default_model, models: by_key })
    }

    /// Parse a catalog from its JSON representation
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.default_model, file.models)
    }

    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// The catalog shipped with the service
    pub fn builtin() -> Self {
        let kraft = TapeModel {
            key: TapeModelKey::Kraft,
            name: "Nastro Carta Kraft".to_string(),
            base_price: 1.50,
            currency: "EUR".to_string(),
            lengths: vec![66, 100],
            widths: vec![38, 50, 75],
            materials: vec![Material {
                id: "standard".to_string(),
                name: "Standard (Base)".to_string(),
                kind: MaterialKind::Original,
                preview_color: "#888888".to_string(),
                textures: TextureFiles {
                    map: "texture/base_color.png".to_string(),
                    normal_map: Some("texture/normal.png".to_string()),
                    roughness_map: Some("texture/roughness.png".to_string()),
                    metallic_map: Some("texture/metallic.png".to_string()),
                    ao_map: Some("texture/ao.png".to_string()),
                },
            }],
            pricing: Pricing {
                width: BTreeMap::from([
                    ("38".to_string(), 0.9),
                    ("50".to_string(), 1.0),
                    ("75".to_string(), 1.15),
                ]),
                length: BTreeMap::from([
                    ("66".to_string(), 1.0),
                    ("100".to_string(), 1.5),
                ]),
            },
        };

        Catalog {
            default_model: TapeModelKey::Kraft,
            models: BTreeMap::from([(TapeModelKey::Kraft, kraft)]),
        }
    }

    pub fn model(&self, key: TapeModelKey) -> Option<&TapeModel> {
        self.models.get(&key)
    }

    pub fn default_model(&self) -> &TapeModel {
        // Presence is checked at construction
        &self.models[&self.default_model]
    }

    pub fn models(&self) -> impl Iterator<Item = &TapeModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft() -> TapeModel {
        Catalog::builtin().default_model().clone()
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = Catalog::builtin();
        let models: Vec<_> = builtin.models().cloned().collect();
        assert!(Catalog::new(TapeModelKey::Kraft, models).is_ok());
        assert_eq!(builtin.default_model().widths, vec![38, 50, 75]);
    }

    #[test]
    fn test_missing_pricing_factor_defaults_to_one() {
        let pricing = Pricing::default();
        assert_eq!(pricing.width_factor(38), 1.0);
        assert_eq!(kraft().pricing.length_factor(100), 1.5);
    }

    #[test]
    fn test_rejects_empty_and_duplicate_models() {
        assert!(matches!(Catalog::new(TapeModelKey::Kraft, vec![]), Err(CatalogError::Empty)));
        assert!(matches!(
            Catalog::new(TapeModelKey::Kraft, vec![kraft(), kraft()]),
            Err(CatalogError::DuplicateModel(TapeModelKey::Kraft))
        ));
    }

    #[test]
    fn test_rejects_pricing_for_unknown_width() {
        let mut model = kraft();
        model.pricing.width.insert("25".to_string(), 0.7);
        assert!(matches!(
            Catalog::new(TapeModelKey::Kraft, vec![model]),
            Err(CatalogError::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_rejects_material_without_map() {
        let mut model = kraft();
        model.materials[0].textures.map = " ".to_string();
        assert!(Catalog::new(TapeModelKey::Kraft, vec![model]).is_err());
    }

    #[test]
    fn test_rejects_duplicate_material_and_zero_width() {
        let mut model = kraft();
        let material = model.materials[0].clone();
        model.materials.push(material);
        assert!(Catalog::new(TapeModelKey::Kraft, vec![model]).is_err());

        let mut model = kraft();
        model.widths.push(0);
        assert!(Catalog::new(TapeModelKey::Kraft, vec![model]).is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r##"{
            "default_model": "kraft",
            "models": [{
                "key": "kraft",
                "name": "Kraft",
                "base_price": 2.0,
                "currency": "EUR",
                "lengths": [66],
                "widths": [50],
                "materials": [{
                    "id": "standard",
                    "name": "Standard",
                    "kind": "original",
                    "preview_color": "#888888",
                    "textures": { "map": "texture/base_color.png" }
                }]
            }]
        }"##;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.default_model().base_price, 2.0);
        assert!(catalog.default_model().material("standard").is_some());
    }

    #[test]
    fn test_from_json_unknown_model_key() {
        let json = r#"{ "default_model": "vinyl", "models": [] }"#;
        assert!(matches!(Catalog::from_json(json), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_model_key_parse() {
        assert_eq!(TapeModelKey::parse("Kraft"), Some(TapeModelKey::Kraft));
        assert_eq!(TapeModelKey::parse("vinyl"), None);
    }
}
