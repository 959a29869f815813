//! Domain types and models

mod patch;
mod product;
pub mod catalog;

pub use patch::Patch;
pub use product::{PriceQuote, ProductConfig, ProductConfigError};
pub use catalog::{Catalog, Material, TapeModel, TapeModelKey};
