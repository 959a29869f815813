//! API module - HTTP routes and handlers

pub mod error;
pub mod handlers;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/models")
                    .route("", web::get().to(handlers::models::list_models))
                    // More specific routes first
                    .route("/{model_key}/quote", web::get().to(handlers::models::get_quote))
                    .route("/{model_key}", web::get().to(handlers::models::get_model))
            )
            .route("/composites", web::post().to(handlers::composites::create_composite))
            .service(
                web::scope("/sessions")
                    .route("", web::post().to(handlers::sessions::create_session))
                    .route("/{id}", web::get().to(handlers::sessions::get_session))
                    .route("/{id}", web::delete().to(handlers::sessions::delete_session))
                    .route("/{id}/config", web::put().to(handlers::sessions::update_config))
                    .route("/{id}/patches", web::put().to(handlers::sessions::update_patches))
                    .route("/{id}/step", web::put().to(handlers::sessions::go_to_step))
                    .route("/{id}/preview", web::get().to(handlers::preview::get_preview))
                    // Artwork editor
                    .route("/{id}/editor/texts", web::post().to(handlers::editor::add_text))
                    .route("/{id}/editor/font", web::put().to(handlers::editor::set_font))
                    .route("/{id}/editor/images", web::post().to(handlers::editor::add_image))
                    .route("/{id}/editor/selection", web::put().to(handlers::editor::select_object))
                    .route("/{id}/editor/selection", web::delete().to(handlers::editor::remove_selected))
                    .route("/{id}/editor/snapshot", web::get().to(handlers::editor::get_snapshot))
            )
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}
