//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::handlers::{
    composites::{ComposeRequest, ComposeResponse, TextureData},
    editor::{AddImageRequest, AddTextRequest, FontResponse, ObjectResponse, SelectRequest, SetFontRequest},
    health::HealthResponse,
    models::{ModelResponse, ModelsListResponse, QuoteResponse},
    preview::PreviewResponse,
    sessions::{PatchesRequest, SessionResponse, SessionUpdateResponse, StepRequest},
};
use crate::domain::{Material, Patch, PriceQuote, ProductConfig, TapeModel, TapeModelKey};
use crate::engine::{ConfigChange, ModelScale, ObjectKind, ObjectSummary, RefreshOutcome, SessionView, Step};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tape Configurator API",
        version = "1.0.0",
        description = "Custom printed tape configurator: pricing, artwork compositing and 3D preview coordination",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "catalog", description = "Tape models and pricing"),
        (name = "compositing", description = "Stateless artwork compositing"),
        (name = "sessions", description = "Configurator sessions and live preview"),
        (name = "editor", description = "Artwork editor of a session")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::models::list_models,
        crate::api::handlers::models::get_model,
        crate::api::handlers::models::get_quote,
        crate::api::handlers::composites::create_composite,
        crate::api::handlers::sessions::create_session,
        crate::api::handlers::sessions::get_session,
        crate::api::handlers::sessions::delete_session,
        crate::api::handlers::sessions::update_config,
        crate::api::handlers::sessions::update_patches,
        crate::api::handlers::sessions::go_to_step,
        crate::api::handlers::preview::get_preview,
        crate::api::handlers::editor::add_text,
        crate::api::handlers::editor::set_font,
        crate::api::handlers::editor::add_image,
        crate::api::handlers::editor::select_object,
        crate::api::handlers::editor::remove_selected,
        crate::api::handlers::editor::get_snapshot,
    ),
    components(
        schemas(
            // Shared
            ErrorResponse,
            ApiError,
            HealthResponse,
            // Catalog
            ModelsListResponse,
            ModelResponse,
            QuoteResponse,
            TapeModel,
            TapeModelKey,
            Material,
            ProductConfig,
            PriceQuote,
            // Compositing
            ComposeRequest,
            ComposeResponse,
            TextureData,
            Patch,
            ModelScale,
            // Sessions
            SessionResponse,
            SessionUpdateResponse,
            SessionView,
            ConfigChange,
            PatchesRequest,
            StepRequest,
            Step,
            RefreshOutcome,
            PreviewResponse,
            // Editor
            AddTextRequest,
            SetFontRequest,
            AddImageRequest,
            SelectRequest,
            ObjectResponse,
            FontResponse,
            ObjectSummary,
            ObjectKind,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_session_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/sessions/{id}/preview"));
        assert!(doc.paths.paths.contains_key("/api/v1/composites"));
    }
}
