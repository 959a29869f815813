//! Artwork patch placement
//!
//! A patch says where a copy of the 2D artwork lands on the material's base
//! color texture. Coordinates are normalized to the texture size so the same
//! patch list works for any texture resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Patch geometry errors
#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    #[error("Patch field '{field}' is not a finite number: {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("Patch scale must not be zero")]
    ZeroScale,
}

/// Placement of the artwork on the base texture
///
/// `x`/`y` are normalized (0..1) texture coordinates of the artwork center,
/// `rot` is a clockwise rotation in degrees and `scale` a uniform multiplier
/// applied to the artwork's native pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Patch {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
    pub scale: f64,
}

impl Patch {
    pub fn new(x: f64, y: f64, rot: f64, scale: f64) -> Self {
        Patch { x, y, rot, scale }
    }

    /// The two placements used on the kraft roll texture
    pub fn defaults() -> Vec<Patch> {
        vec![
            Patch::new(0.93, 0.62, 90.0, 1.60),
            Patch::new(0.93, 0.21, 90.0, 1.60),
        ]
    }

    /// Rotation in radians
    pub fn rotation_radians(&self) -> f64 {
        self.rot.to_radians()
    }

    /// Check that the patch describes an invertible transform
    ///
    /// Positions outside 0..1 are allowed: they place the artwork (partly)
    /// off the texture, which simply clips.
    pub fn check_drawable(&self) -> Result<(), PatchError> {
        for (field, value) in [("x", self.x), ("y", self.y), ("rot", self.rot), ("scale", self.scale)] {
            if !value.is_finite() {
                return Err(PatchError::NotFinite { field, value });
            }
        }
        if self.scale == 0.0 {
            return Err(PatchError::ZeroScale);
        }
        Ok(())
    }
}
