//! Stretch compensation for the tape mesh
//!
//! The 3D roll is modelled at a reference width and shown at other widths by
//! scaling one mesh axis. That stretches the texture along the same axis, so
//! artwork is pre-squeezed in the opposite direction before it is mapped.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::CompositingSettings;

/// Compensation table errors
#[derive(Debug, Error, PartialEq)]
pub enum CompensationError {
    #[error("Base reference width must be positive, got {0}")]
    InvalidBaseWidth(f64),
    #[error("Stretch correction key '{0}' is not a width in millimeters")]
    InvalidWidthKey(String),
    #[error("Stretch correction for width {width} must be positive, got {factor}")]
    InvalidFactor { width: u32, factor: f64 },
}

/// Non-uniform scale the viewer applies to the tape mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ModelScale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ModelScale {
    pub const IDENTITY: ModelScale = ModelScale { x: 1.0, y: 1.0, z: 1.0 };
}

/// Vertical compensation factors per tape width
#[derive(Debug, Clone)]
pub struct StretchCompensation {
    base_reference_width_mm: f64,
    overrides: HashMap<u32, f64>,
}

impl StretchCompensation {
    pub fn new(base_reference_width_mm: f64, overrides: HashMap<u32, f64>) -> Result<Self, CompensationError> {
        if !base_reference_width_mm.is_finite() || base_reference_width_mm <= 0.0 {
            return Err(CompensationError::InvalidBaseWidth(base_reference_width_mm));
        }
        for (&width, &factor) in &overrides {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(CompensationError::InvalidFactor { width, factor });
            }
        }

        Ok(StretchCompensation { base_reference_width_mm, overrides })
    }

    /// Build the table from settings, parsing the string width keys
    pub fn from_settings(settings: &CompositingSettings) -> Result<Self, CompensationError> {
        let mut overrides = HashMap::with_capacity(settings.stretch_correction.len());
        for (key, &factor) in &settings.stretch_correction {
            let width = key
                .trim()
                .parse::<u32>()
                .map_err(|_| CompensationError::InvalidWidthKey(key.clone()))?;
            overrides.insert(width, factor);
        }

        Self::new(settings.base_3d_width_mm, overrides)
    }

    pub fn base_reference_width_mm(&self) -> f64 {
        self.base_reference_width_mm
    }

    /// Vertical scale applied to artwork for a given tape width
    ///
    /// An explicit override for the exact width wins; otherwise the factor is
    /// the inverse of the mesh stretch `width / base`.
    pub fn factor(&self, width_mm: u32) -> f64 {
        match self.overrides.get(&width_mm) {
            Some(&factor) => factor,
            None => 1.0 / (width_mm as f64 / self.base_reference_width_mm),
        }
    }

    /// Mesh scale for a given tape width; only the width axis changes
    pub fn model_scale(&self, width_mm: u32) -> ModelScale {
        ModelScale {
            x: 1.0,
            y: width_mm as f64 / self.base_reference_width_mm,
            z: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn table(overrides: &[(u32, f64)]) -> StretchCompensation {
        StretchCompensation::new(50.0, overrides.iter().copied().collect()).unwrap()
    }

    #[test]
    fn test_explicit_override_wins() {
        let compensation = table(&[(38, 0.8)]);
        assert_eq!(compensation.factor(38), 0.8);
    }

    #[test]
    fn test_derived_factor_without_override() {
        let compensation = table(&[(38, 0.8)]);
        assert!((compensation.factor(75) - 50.0 / 75.0).abs() < 1e-12);
        assert_eq!(compensation.factor(50), 1.0);
    }

    #[test]
    fn test_every_width_follows_the_rule() {
        let compensation = table(&[(38, 0.8), (50, 1.0), (75, 1.25)]);
        for width in 10..200u32 {
            let expected = match width {
                38 => 0.8,
                50 => 1.0,
                75 => 1.25,
                w => 50.0 / w as f64,
            };
            assert!((compensation.factor(width) - expected).abs() < 1e-12, "width {}", width);
        }
    }

    #[test]
    fn test_model_scale() {
        let compensation = table(&[]);
        let scale = compensation.model_scale(75);
        assert_eq!(scale.x, 1.0);
        assert_eq!(scale.z, 1.0);
        assert!((scale.y - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::default();
        let compensation = StretchCompensation::from_settings(&settings.compositing).unwrap();
        assert_eq!(compensation.factor(75), 1.25);
        assert_eq!(compensation.base_reference_width_mm(), 50.0);
    }

    #[test]
    fn test_rejects_bad_tables() {
        let mut settings = Settings::default().compositing;
        settings.stretch_correction.insert("wide".to_string(), 1.0);
        assert_eq!(
            StretchCompensation::from_settings(&settings).unwrap_err(),
            CompensationError::InvalidWidthKey("wide".to_string())
        );

        assert!(StretchCompensation::new(0.0, HashMap::new()).is_err());
        assert!(StretchCompensation::new(50.0, HashMap::from([(38, -1.0)])).is_err());
    }
}
