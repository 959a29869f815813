//! Configurator session controller
//!
//! One session per user replaces the page-global canvas/scene state of a
//! single-user configurator: it owns the product configuration, the patch
//! list, the artwork editor and the preview it feeds.
//!
//! Width changes must reach the viewer in causal order: the texture
//! compensated for the new width is installed first and only then is the
//! mesh rescaled, otherwise the old artwork would flash stretched on the new
//! geometry. A newer refresh cancels an older one so a slow, stale refresh
//! can never overwrite a newer result.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Catalog, Patch, PriceQuote, ProductConfig, ProductConfigError};
use super::cancel::CancellationToken;
use super::compensation::ModelScale;
use super::compositor::{Compositor, CompositorError};
use super::editor::{decode_upload, ArtworkEditor, EditorError, EditorOptions, ObjectSummary};
use super::fonts::FontBook;
use super::preview::{PreviewChannel, PreviewError, PreviewSink};
use super::texture::{TextureError, TextureLibrary};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ProductConfigError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Compositor(#[from] CompositorError),
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error("The artwork editor is not open yet")]
    EditorClosed,
    #[error("Session {0} not found")]
    NotFound(Uuid),
    #[error("Session limit of {0} reached")]
    Capacity(usize),
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Run CPU-bound image work on the blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SessionError::TaskFailed(e.to_string()))?
}

/// Shared, read-only engine parts every session works with
pub struct EngineContext {
    pub catalog: Arc<Catalog>,
    pub textures: Arc<TextureLibrary>,
    pub compositor: Compositor,
    pub fonts: Arc<FontBook>,
    pub editor_options: EditorOptions,
}

/// Wizard step the user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Choosing model, dimensions and material
    Configure,
    /// Drawing the artwork
    Design,
}

/// Result of one artwork refresh
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Texture and mesh scale reached the viewer
    Applied {
        width_mm: u32,
        /// `None` when there was no artwork and the base texture was restored
        compensation_factor: Option<f64>,
        model_scale: ModelScale,
    },
    /// A newer refresh started before this one finished
    Superseded,
}

/// Partial configuration update
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ConfigChange {
    pub width_mm: Option<u32>,
    pub length_m: Option<u32>,
    pub material_id: Option<String>,
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub step: Step,
    pub config: ProductConfig,
    pub quote: PriceQuote,
    pub patches: Vec<Patch>,
    pub editor_open: bool,
    pub objects: Vec<ObjectSummary>,
    pub selected_object: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

struct SessionState {
    step: Step,
    config: ProductConfig,
    patches: Vec<Patch>,
    editor: Option<ArtworkEditor>,
}

/// Per-user configurator controller
pub struct ConfiguratorSession<P = PreviewChannel> {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_active: Mutex<DateTime<Utc>>,
    context: Arc<EngineContext>,
    preview: Arc<P>,
    state: Mutex<SessionState>,
    in_flight: Mutex<CancellationToken>,
    apply_lock: tokio::sync::Mutex<()>,
}

impl<P: PreviewSink + 'static> ConfiguratorSession<P> {
    /// Start on the configuration step with the default model's defaults
    pub fn new(context: Arc<EngineContext>, preview: P) -> Self {
        let config = ProductConfig::default_for(context.catalog.default_model());
        let now = Utc::now();

        ConfiguratorSession {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: Mutex::new(now),
            context,
            preview: Arc::new(preview),
            state: Mutex::new(SessionState {
                step: Step::Configure,
                config,
                patches: Patch::defaults(),
                editor: None,
            }),
            in_flight: Mutex::new(CancellationToken::new()),
            apply_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn preview(&self) -> &P {
        &self.preview
    }

    pub fn touch(&self) {
        *self.last_active.lock() = Utc::now();
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.lock()
    }

    #[cfg(test)]
    pub(crate) fn set_last_active(&self, at: DateTime<Utc>) {
        *self.last_active.lock() = at;
    }

    pub fn state(&self) -> Result<SessionView, SessionError> {
        let state = self.state.lock();
        let quote = state.config.quote(&self.context.catalog)?;
        let (objects, selected_object) = match &state.editor {
            Some(editor) => (editor.objects(), editor.selected()),
            None => (Vec::new(), None),
        };

        Ok(SessionView {
            id: self.id,
            step: state.step,
            config: state.config.clone(),
            quote,
            patches: state.patches.clone(),
            editor_open: state.editor.is_some(),
            objects,
            selected_object,
            created_at: self.created_at,
        })
    }

    pub fn config(&self) -> ProductConfig {
        self.state.lock().config.clone()
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Apply a configuration change; width and material changes refresh the preview
    pub async fn update_config(&self, change: ConfigChange) -> Result<Option<RefreshOutcome>, SessionError> {
        let needs_refresh = {
            let mut state = self.state.lock();
            let mut candidate = state.config.clone();
            if let Some(width_mm) = change.width_mm {
                candidate.width_mm = width_mm;
            }
            if let Some(length_m) = change.length_m {
                candidate.length_m = length_m;
            }
            if let Some(material_id) = change.material_id {
                candidate.material_id = material_id;
            }
            candidate.validate(&self.context.catalog)?;

            let needs_refresh = candidate.width_mm != state.config.width_mm
                || candidate.material_id != state.config.material_id;
            debug!(
                session_id = %self.id,
                width_mm = candidate.width_mm,
                length_m = candidate.length_m,
                material_id = %candidate.material_id,
                "Configuration updated"
            );
            state.config = candidate;
            needs_refresh
        };

        if needs_refresh {
            Ok(Some(self.refresh_artwork().await?))
        } else {
            Ok(None)
        }
    }

    /// Select a tape width and run the coordinated texture/scale refresh
    pub async fn select_width(&self, width_mm: u32) -> Result<RefreshOutcome, SessionError> {
        {
            let mut state = self.state.lock();
            let mut candidate = state.config.clone();
            candidate.width_mm = width_mm;
            candidate.validate(&self.context.catalog)?;
            state.config = candidate;
        }
        self.refresh_artwork().await
    }

    /// Select a roll length; only the price changes
    pub fn select_length(&self, length_m: u32) -> Result<PriceQuote, SessionError> {
        let mut state = self.state.lock();
        let mut candidate = state.config.clone();
        candidate.length_m = length_m;
        let quote = candidate.quote(&self.context.catalog)?;
        state.config = candidate;
        Ok(quote)
    }

    pub async fn select_material(&self, material_id: &str) -> Result<RefreshOutcome, SessionError> {
        {
            let mut state = self.state.lock();
            let mut candidate = state.config.clone();
            candidate.material_id = material_id.to_string();
            candidate.validate(&self.context.catalog)?;
            state.config = candidate;
        }
        self.refresh_artwork().await
    }

    /// Replace the patch list; the preview follows while designing
    pub async fn set_patches(&self, patches: Vec<Patch>) -> Result<Option<RefreshOutcome>, SessionError> {
        let designing = {
            let mut state = self.state.lock();
            state.patches = patches;
            state.step == Step::Design
        };

        if designing {
            Ok(Some(self.refresh_artwork().await?))
        } else {
            Ok(None)
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move between wizard steps
    ///
    /// Entering the design step opens the editor on first use and refreshes
    /// the preview; the editor and its artwork survive going back.
    pub async fn go_to_step(self: &Arc<Self>, step: Step) -> Result<Option<RefreshOutcome>, SessionError> {
        let changes = {
            let mut state = self.state.lock();
            state.step = step;
            if step == Step::Design && state.editor.is_none() {
                let editor = ArtworkEditor::new(
                    self.context.editor_options.clone(),
                    self.context.fonts.clone(),
                );
                let changes = editor.subscribe();
                state.editor = Some(editor);
                Some(changes)
            } else {
                None
            }
        };

        if let Some(changes) = changes {
            info!(session_id = %self.id, "Artwork editor opened");
            spawn_change_listener(Arc::downgrade(self), changes);
        }

        match step {
            Step::Design => Ok(Some(self.refresh_artwork().await?)),
            Step::Configure => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Editor
    // ------------------------------------------------------------------

    fn with_editor<T>(
        &self,
        f: impl FnOnce(&mut ArtworkEditor) -> Result<T, EditorError>,
    ) -> Result<T, SessionError> {
        let mut state = self.state.lock();
        let editor = state.editor.as_mut().ok_or(SessionError::EditorClosed)?;
        Ok(f(editor)?)
    }

    pub fn add_text(&self, text: &str, font: Option<&str>, color: Option<&str>) -> Result<Uuid, SessionError> {
        self.with_editor(|editor| editor.add_text(text, font, color))
    }

    pub fn set_font(&self, font: &str) -> Result<bool, SessionError> {
        self.with_editor(|editor| editor.set_font(font))
    }

    /// Decode and resize off the session lock, then insert the result
    pub async fn add_image(&self, bytes: Vec<u8>) -> Result<Uuid, SessionError> {
        if self.state.lock().editor.is_none() {
            return Err(SessionError::EditorClosed);
        }

        let max_dimension = self.context.editor_options.max_image_dimension;
        let image = run_blocking(move || Ok(decode_upload(&bytes, max_dimension)?)).await?;
        self.with_editor(|editor| Ok(editor.add_image(image)))
    }

    pub fn select_object(&self, id: Uuid) -> Result<(), SessionError> {
        self.with_editor(|editor| editor.select(id))
    }

    pub fn remove_selected(&self) -> Result<Uuid, SessionError> {
        self.with_editor(|editor| editor.remove_selected())
    }

    /// PNG of the current artwork canvas
    pub async fn snapshot_png(&self) -> Result<Vec<u8>, SessionError> {
        let scene = self.with_editor(|editor| Ok(editor.scene()))?;
        run_blocking(move || Ok(scene.render()?.encode_png()?)).await
    }

    // ------------------------------------------------------------------
    // Refresh pipeline
    // ------------------------------------------------------------------

    /// Cancel whatever refresh is running and hand out a token for a new one
    fn begin_refresh(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.in_flight.lock(), token.clone());
        previous.cancel();
        token
    }

    /// Regenerate the texture, install it, then rescale the mesh
    pub async fn refresh_artwork(&self) -> Result<RefreshOutcome, SessionError> {
        let token = self.begin_refresh();

        let (config, patches, scene) = {
            let state = self.state.lock();
            let scene = state.editor.as_ref().map(ArtworkEditor::scene);
            (state.config.clone(), state.patches.clone(), scene)
        };

        let texture = match scene {
            Some(scene) => {
                let base = self
                    .context
                    .textures
                    .base_color(config.model_key, &config.material_id)?;
                let snapshot = run_blocking(move || Ok(scene.render()?)).await?;
                self.context
                    .compositor
                    .compose_async(base, config.width_mm, patches, Some(snapshot))
                    .await?
            }
            None => None,
        };
        let compensation_factor = texture.as_ref().map(|t| t.compensation_factor);
        let model_scale = self.context.compositor.compensation().model_scale(config.width_mm);

        let _apply = self.apply_lock.lock().await;
        if token.is_cancelled() {
            debug!(session_id = %self.id, width_mm = config.width_mm, "Refresh superseded before texture swap");
            return Ok(RefreshOutcome::Superseded);
        }
        self.preview.apply_texture(texture).await?;

        if token.is_cancelled() {
            debug!(session_id = %self.id, width_mm = config.width_mm, "Refresh superseded before rescale");
            return Ok(RefreshOutcome::Superseded);
        }
        self.preview.set_model_scale(model_scale).await?;

        info!(
            session_id = %self.id,
            width_mm = config.width_mm,
            compensation_factor = ?compensation_factor,
            scale_y = model_scale.y,
            "Preview refreshed"
        );

        Ok(RefreshOutcome::Applied {
            width_mm: config.width_mm,
            compensation_factor,
            model_scale,
        })
    }
}

/// Refresh the preview whenever the editor reports a change
fn spawn_change_listener<P: PreviewSink + 'static>(
    session: Weak<ConfiguratorSession<P>>,
    mut changes: watch::Receiver<u64>,
) {
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let Some(session) = session.upgrade() else {
                break;
            };
            if let Err(e) = session.refresh_artwork().await {
                warn!(session_id = %session.id, error = %e, "Artwork refresh after editor change failed");
            }
        }
    });
}
