//! Product configuration selected by the user and its derived price

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::catalog::{Catalog, TapeModel, TapeModelKey};

/// Product configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ProductConfigError {
    #[error("Unknown tape model: {0}")]
    UnknownModel(TapeModelKey),
    #[error("Width {width} mm is not available for {model} (allowed: {allowed:?})")]
    WidthNotAllowed { model: TapeModelKey, width: u32, allowed: Vec<u32> },
    #[error("Length {length} m is not available for {model} (allowed: {allowed:?})")]
    LengthNotAllowed { model: TapeModelKey, length: u32, allowed: Vec<u32> },
    #[error("Material '{material}' is not available for {model}")]
    UnknownMaterial { model: TapeModelKey, material: String },
}

/// A tape roll configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductConfig {
    pub model_key: TapeModelKey,
    /// Tape width in millimeters
    pub width_mm: u32,
    /// Roll length in meters
    pub length_m: u32,
    pub material_id: String,
}

/// Derived price for a configuration
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceQuote {
    /// Price per roll
    pub unit_price: f64,
    pub currency: String,
    /// Human readable price, e.g. "1.50 €/roll"
    pub formatted: String,
}

impl ProductConfig {
    /// Starting configuration for a model: 50 mm x 66 m when offered
    pub fn default_for(model: &TapeModel) -> Self {
        let width_mm = if model.allows_width(50) { 50 } else { model.widths[0] };
        let length_m = if model.allows_length(66) { 66 } else { model.lengths[0] };

        ProductConfig {
            model_key: model.key,
            width_mm,
            length_m,
            material_id: model.materials[0].id.clone(),
        }
    }

    /// Check the configuration against the model's allowed sets
    pub fn validate<'a>(&self, catalog: &'a Catalog) -> Result<&'a TapeModel, ProductConfigError> {
        let model = catalog
            .model(self.model_key)
            .ok_or(ProductConfigError::UnknownModel(self.model_key))?;

        if !model.allows_width(self.width_mm) {
            return Err(ProductConfigError::WidthNotAllowed {
                model: model.key,
                width: self.width_mm,
                allowed: model.widths.clone(),
            });
        }
        if !model.allows_length(self.length_m) {
            return Err(ProductConfigError::LengthNotAllowed {
                model: model.key,
                length: self.length_m,
                allowed: model.lengths.clone(),
            });
        }
        if model.material(&self.material_id).is_none() {
            return Err(ProductConfigError::UnknownMaterial {
                model: model.key,
                material: self.material_id.clone(),
            });
        }

        Ok(model)
    }

    /// Price one roll of this configuration
    pub fn quote(&self, catalog: &Catalog) -> Result<PriceQuote, ProductConfigError> {
        let model = self.validate(catalog)?;
        let unit_price = model.base_price
            * model.pricing.width_factor(self.width_mm)
            * model.pricing.length_factor(self.length_m);

        Ok(PriceQuote {
            unit_price,
            currency: model.currency.clone(),
            formatted: format!("{:.2} {}/roll", unit_price, currency_symbol(&model.currency)),
        })
    }
}

fn currency_symbol(code: &str) -> &str {
    match code {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let catalog = Catalog::builtin();
        let config = ProductConfig::default_for(catalog.default_model());
        assert_eq!(config.width_mm, 50);
        assert_eq!(config.length_m, 66);
        assert_eq!(config.material_id, "standard");
        assert!(config.validate(&catalog).is_ok());
    }

    #[test]
    fn test_quote_multiplies_factors() {
        let catalog = Catalog::builtin();
        let mut config = ProductConfig::default_for(catalog.default_model());
        config.width_mm = 38;
        config.length_m = 100;
        let quote = config.quote(&catalog).unwrap();
        assert!((quote.unit_price - 1.50 * 0.9 * 1.5).abs() < 1e-9);

        config.length_m = 66;
        let quote = config.quote(&catalog).unwrap();
        assert_eq!(quote.formatted, "1.35 €/roll");
        assert_eq!(quote.currency, "EUR");
    }

    #[test]
    fn test_base_quote() {
        let catalog = Catalog::builtin();
        let config = ProductConfig::default_for(catalog.default_model());
        assert_eq!(config.quote(&catalog).unwrap().formatted, "1.50 €/roll");
    }

    #[test]
    fn test_rejects_width_outside_model() {
        let catalog = Catalog::builtin();
        let mut config = ProductConfig::default_for(catalog.default_model());
        config.width_mm = 60;
        assert!(matches!(
            config.validate(&catalog),
            Err(ProductConfigError::WidthNotAllowed { width: 60, .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_material_and_length() {
        let catalog = Catalog::builtin();
        let mut config = ProductConfig::default_for(catalog.default_model());
        config.material_id = "glitter".to_string();
        assert!(matches!(config.validate(&catalog), Err(ProductConfigError::UnknownMaterial { .. })));

        let mut config = ProductConfig::default_for(catalog.default_model());
        config.length_m = 50;
        assert!(matches!(config.validate(&catalog), Err(ProductConfigError::LengthNotAllowed { .. })));
    }
}
