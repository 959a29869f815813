//! Tape model catalog and pricing endpoints

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{config_error, error_response, ErrorResponse};
use crate::domain::{PriceQuote, ProductConfig, TapeModel, TapeModelKey};
use crate::AppState;

/// Response for listing models
#[derive(Serialize, ToSchema)]
pub struct ModelsListResponse {
    pub success: bool,
    pub default_model: TapeModelKey,
    pub data: Vec<TapeModel>,
    pub count: usize,
}

/// Response for a single model
#[derive(Serialize, ToSchema)]
pub struct ModelResponse {
    pub success: bool,
    pub data: TapeModel,
}

/// Configuration to price; omitted values fall back to the model defaults
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuoteQuery {
    /// Tape width in millimeters
    pub width: Option<u32>,
    /// Roll length in meters
    pub length: Option<u32>,
    pub material: Option<String>,
}

/// Price quote response
#[derive(Serialize, ToSchema)]
pub struct QuoteResponse {
    pub success: bool,
    pub config: ProductConfig,
    pub quote: PriceQuote,
}

fn model_not_found(model_key: &str) -> HttpResponse {
    error!(model_key = %model_key, "Tape model not found");
    error_response(
        actix_web::http::StatusCode::NOT_FOUND,
        "MODEL_NOT_FOUND",
        format!("Tape model '{}' does not exist", model_key),
    )
}

/// GET /api/v1/models - List all tape models
#[utoipa::path(
    get,
    path = "/api/v1/models",
    tag = "catalog",
    responses(
        (status = 200, description = "List of tape models", body = ModelsListResponse)
    )
)]
pub async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    let catalog = &state.engine.catalog;
    let data: Vec<TapeModel> = catalog.models().cloned().collect();
    debug!(count = data.len(), "Listing tape models");

    HttpResponse::Ok().json(ModelsListResponse {
        success: true,
        default_model: catalog.default_model().key,
        count: data.len(),
        data,
    })
}

/// GET /api/v1/models/{model_key} - Get a single tape model
#[utoipa::path(
    get,
    path = "/api/v1/models/{model_key}",
    tag = "catalog",
    params(
        ("model_key" = String, Path, description = "Tape model key (e.g., 'kraft')")
    ),
    responses(
        (status = 200, description = "Tape model details", body = ModelResponse),
        (status = 404, description = "Model not found", body = ErrorResponse)
    )
)]
pub async fn get_model(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let model_key = path.into_inner();
    let model = TapeModelKey::parse(&model_key).and_then(|key| state.engine.catalog.model(key));

    match model {
        Some(model) => HttpResponse::Ok().json(ModelResponse {
            success: true,
            data: model.clone(),
        }),
        None => model_not_found(&model_key),
    }
}

/// GET /api/v1/models/{model_key}/quote - Price a configuration
#[utoipa::path(
    get,
    path = "/api/v1/models/{model_key}/quote",
    tag = "catalog",
    params(
        ("model_key" = String, Path, description = "Tape model key (e.g., 'kraft')"),
        QuoteQuery
    ),
    responses(
        (status = 200, description = "Price per roll", body = QuoteResponse),
        (status = 400, description = "Width, length or material not offered", body = ErrorResponse),
        (status = 404, description = "Model not found", body = ErrorResponse)
    )
)]
pub async fn get_quote(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<QuoteQuery>,
) -> HttpResponse {
    let model_key = path.into_inner();
    let catalog = &state.engine.catalog;
    let Some(model) = TapeModelKey::parse(&model_key).and_then(|key| catalog.model(key)) else {
        return model_not_found(&model_key);
    };

    let query = query.into_inner();
    let mut config = ProductConfig::default_for(model);
    if let Some(width) = query.width {
        config.width_mm = width;
    }
    if let Some(length) = query.length {
        config.length_m = length;
    }
    if let Some(material) = query.material {
        config.material_id = material;
    }

    match config.quote(catalog) {
        Ok(quote) => HttpResponse::Ok().json(QuoteResponse {
            success: true,
            config,
            quote,
        }),
        Err(e) => config_error(e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};

    use super::super::test_support;
    use crate::api::configure_routes;

    #[actix_web::test]
    async fn test_list_and_get_models() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/models").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["default_model"], "kraft");
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["widths"], serde_json::json!([38, 50, 75]));

        let req = test::TestRequest::get().uri("/api/v1/models/kraft").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["base_price"], 1.5);

        let req = test::TestRequest::get().uri("/api/v1/models/vinyl").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_quote() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/models/kraft/quote?width=50&length=100")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["quote"]["formatted"], "2.25 €/roll");

        let req = test::TestRequest::get()
            .uri("/api/v1/models/kraft/quote?width=60")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_CONFIG");
    }
}
