//! Stateless artwork compositing endpoint

use std::time::Instant;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::api::error::{error_response, ErrorResponse};
use crate::domain::{Patch, TapeModelKey};
use crate::engine::{CompositeTexture, ModelScale, Snapshot};
use crate::AppState;

/// Request body for a one-off composite
#[derive(Debug, Deserialize, ToSchema)]
pub struct ComposeRequest {
    /// Tape width in millimeters
    pub width_mm: u32,
    /// Defaults to the catalog's default model
    pub model_key: Option<TapeModelKey>,
    /// Defaults to the model's first material
    pub material_id: Option<String>,
    /// Patch positions; the two default patches when omitted
    #[serde(default = "Patch::defaults")]
    pub patches: Vec<Patch>,
    /// Artwork as a PNG data URL or bare base64; no artwork means no texture
    pub snapshot: Option<String>,
}

/// Encoded composite texture
#[derive(Serialize, ToSchema)]
pub struct TextureData {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub compensation_factor: f64,
}

impl From<&CompositeTexture> for TextureData {
    fn from(texture: &CompositeTexture) -> Self {
        TextureData {
            data_url: texture.data_url(),
            width: texture.width,
            height: texture.height,
            compensation_factor: texture.compensation_factor,
        }
    }
}

/// Response for a composite
#[derive(Serialize, ToSchema)]
pub struct ComposeResponse {
    pub success: bool,
    /// `null` when no artwork was supplied
    pub texture: Option<TextureData>,
    pub model_scale: ModelScale,
    pub generation_time_ms: u64,
}

/// POST /api/v1/composites - Composite artwork onto a material texture
#[utoipa::path(
    post,
    path = "/api/v1/composites",
    tag = "compositing",
    request_body = ComposeRequest,
    responses(
        (status = 200, description = "Composite generated", body = ComposeResponse),
        (status = 400, description = "Invalid width or artwork", body = ErrorResponse),
        (status = 404, description = "Model or material not found", body = ErrorResponse),
        (status = 500, description = "Compositing failed", body = ErrorResponse)
    )
)]
pub async fn create_composite(
    state: web::Data<AppState>,
    body: web::Json<ComposeRequest>,
) -> HttpResponse {
    let start = Instant::now();
    let request = body.into_inner();

    if request.width_mm == 0 {
        error!("Composite requested for zero width");
        return error_response(StatusCode::BAD_REQUEST, "INVALID_WIDTH", "Tape width must be positive");
    }

    let engine = &state.engine;
    let model = match request.model_key {
        Some(key) => engine.catalog.model(key),
        None => Some(engine.catalog.default_model()),
    };
    let Some(model) = model else {
        error!(model_key = ?request.model_key, "Tape model not found");
        return error_response(StatusCode::NOT_FOUND, "MODEL_NOT_FOUND", "Tape model does not exist");
    };
    let material_id = request
        .material_id
        .clone()
        .unwrap_or_else(|| model.materials[0].id.clone());
    if model.material(&material_id).is_none() {
        error!(material_id = %material_id, "Material not found");
        return error_response(
            StatusCode::NOT_FOUND,
            "MATERIAL_NOT_FOUND",
            format!("Material '{}' is not available for {}", material_id, model.key),
        );
    }

    let snapshot = match request.snapshot.as_deref().map(Snapshot::from_data_url).transpose() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "Invalid artwork snapshot");
            return error_response(StatusCode::BAD_REQUEST, "INVALID_IMAGE", e.to_string());
        }
    };

    info!(
        model_key = %model.key,
        material_id = %material_id,
        width_mm = request.width_mm,
        patches = request.patches.len(),
        has_artwork = snapshot.is_some(),
        "Processing composite request"
    );

    let texture = match snapshot {
        Some(snapshot) => {
            let base = match engine.textures.base_color(model.key, &material_id) {
                Ok(base) => base,
                Err(e) => {
                    error!(error = %e, "Base texture unavailable");
                    return error_response(StatusCode::SERVICE_UNAVAILABLE, "TEXTURE_UNAVAILABLE", e.to_string());
                }
            };
            match engine
                .compositor
                .compose_async(base, request.width_mm, request.patches, Some(snapshot))
                .await
            {
                Ok(texture) => texture,
                Err(e) => {
                    error!(error = %e, "Composite failed");
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, "COMPOSITE_FAILED", e.to_string());
                }
            }
        }
        None => None,
    };

    HttpResponse::Ok().json(ComposeResponse {
        success: true,
        texture: texture.as_ref().map(TextureData::from),
        model_scale: engine.compositor.compensation().model_scale(request.width_mm),
        generation_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use base64::Engine;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    use super::super::test_support;
    use crate::api::configure_routes;
    use crate::engine::encode_png;

    fn artwork_data_url() -> String {
        let png = encode_png(&RgbaImage::from_pixel(16, 8, Rgba([255, 0, 0, 255]))).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        )
    }

    #[actix_web::test]
    async fn test_composite_with_artwork() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/composites")
            .set_json(json!({ "width_mm": 75, "snapshot": artwork_data_url() }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["texture"]["compensation_factor"], 1.25);
        assert_eq!(body["texture"]["width"], 40);
        assert_eq!(body["model_scale"]["y"], 1.5);
        assert!(body["texture"]["data_url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[actix_web::test]
    async fn test_composite_without_artwork_is_null() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/composites")
            .set_json(json!({ "width_mm": 50 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert!(body["texture"].is_null());
        assert_eq!(body["model_scale"]["y"], 1.0);
    }

    #[actix_web::test]
    async fn test_composite_rejects_zero_width() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/composites")
            .set_json(json!({ "width_mm": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
