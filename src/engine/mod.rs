//! Artwork compositing engine
//!
//! This module contains the core configurator logic including:
//! - Stretch compensation for the width-scaled tape mesh
//! - Patch layering of the artwork onto the base texture
//! - The artwork editor and its font book
//! - Per-user sessions that coordinate texture swaps with mesh rescaling

mod cancel;
mod compensation;
mod compositor;
mod editor;
mod fonts;
mod preview;
mod registry;
mod session;
mod texture;

pub use compensation::{ModelScale, StretchCompensation};
pub use compositor::{decode_data_url, encode_png, CompositeTexture, Compositor, CompositorError, Snapshot};
pub use editor::{EditorError, EditorOptions, ObjectKind, ObjectSummary};
pub use fonts::{FontBook, FontError};
pub use registry::SessionRegistry;
pub use session::{
    ConfigChange, ConfiguratorSession, EngineContext, RefreshOutcome, SessionError, SessionView, Step,
};
pub use texture::{TextureError, TextureLibrary};

#[cfg(test)]
pub(crate) use session::tests::context as test_context;
