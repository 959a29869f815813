//! Artwork editor endpoints
//!
//! Mutations answer immediately; the session regenerates the preview in the
//! background once the editor reports the change.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{error_response, session_error, ErrorResponse};
use crate::engine::decode_data_url;
use crate::AppState;

/// New text object
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddTextRequest {
    pub text: String,
    /// Font family; the configured default when omitted
    pub font: Option<String>,
    /// `#rrggbb`; the configured default when omitted
    pub color: Option<String>,
}

/// Font change for the selected text
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetFontRequest {
    pub font: String,
}

/// New image object
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddImageRequest {
    /// Image as a data URL or bare base64
    pub image: String,
}

/// Object selection
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectRequest {
    pub object_id: Uuid,
}

/// Response naming the object an operation touched
#[derive(Serialize, ToSchema)]
pub struct ObjectResponse {
    pub success: bool,
    pub object_id: Uuid,
}

/// Font change response
#[derive(Serialize, ToSchema)]
pub struct FontResponse {
    pub success: bool,
    /// `false` when no text object was selected
    pub applied: bool,
}

/// POST /api/v1/sessions/{id}/editor/texts - Add a text object
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/editor/texts",
    tag = "editor",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = AddTextRequest,
    responses(
        (status = 201, description = "Text added and selected", body = ObjectResponse),
        (status = 400, description = "Empty text, unknown font or bad color", body = ErrorResponse),
        (status = 409, description = "Editor not open", body = ErrorResponse)
    )
)]
pub async fn add_text(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<AddTextRequest>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.add_text(&body.text, body.font.as_deref(), body.color.as_deref()) {
        Ok(object_id) => {
            info!(session_id = %session.id(), object_id = %object_id, "Text added");
            HttpResponse::Created().json(ObjectResponse { success: true, object_id })
        }
        Err(e) => session_error(e),
    }
}

/// PUT /api/v1/sessions/{id}/editor/font - Change the selected text's font
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/editor/font",
    tag = "editor",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SetFontRequest,
    responses(
        (status = 200, description = "Font change result", body = FontResponse),
        (status = 400, description = "Font not installed", body = ErrorResponse),
        (status = 409, description = "Editor not open", body = ErrorResponse)
    )
)]
pub async fn set_font(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SetFontRequest>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.set_font(&body.font) {
        Ok(applied) => HttpResponse::Ok().json(FontResponse { success: true, applied }),
        Err(e) => session_error(e),
    }
}

/// POST /api/v1/sessions/{id}/editor/images - Add an image object
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/editor/images",
    tag = "editor",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = AddImageRequest,
    responses(
        (status = 201, description = "Image added and selected", body = ObjectResponse),
        (status = 400, description = "Image could not be decoded", body = ErrorResponse),
        (status = 409, description = "Editor not open", body = ErrorResponse)
    )
)]
pub async fn add_image(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<AddImageRequest>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    let bytes = match decode_data_url(&body.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Invalid image payload");
            return error_response(actix_web::http::StatusCode::BAD_REQUEST, "INVALID_IMAGE", e.to_string());
        }
    };

    let size = bytes.len();
    match session.add_image(bytes).await {
        Ok(object_id) => {
            info!(session_id = %session.id(), object_id = %object_id, bytes = size, "Image added");
            HttpResponse::Created().json(ObjectResponse { success: true, object_id })
        }
        Err(e) => session_error(e),
    }
}

/// PUT /api/v1/sessions/{id}/editor/selection - Select an object
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/editor/selection",
    tag = "editor",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SelectRequest,
    responses(
        (status = 200, description = "Object selected", body = ObjectResponse),
        (status = 404, description = "Object not found", body = ErrorResponse)
    )
)]
pub async fn select_object(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SelectRequest>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.select_object(body.object_id) {
        Ok(()) => HttpResponse::Ok().json(ObjectResponse {
            success: true,
            object_id: body.object_id,
        }),
        Err(e) => session_error(e),
    }
}

/// DELETE /api/v1/sessions/{id}/editor/selection - Remove the selected object
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}/editor/selection",
    tag = "editor",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Object removed", body = ObjectResponse),
        (status = 409, description = "Nothing selected", body = ErrorResponse)
    )
)]
pub async fn remove_selected(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.remove_selected() {
        Ok(object_id) => {
            info!(session_id = %session.id(), object_id = %object_id, "Object removed");
            HttpResponse::Ok().json(ObjectResponse { success: true, object_id })
        }
        Err(e) => session_error(e),
    }
}

/// GET /api/v1/sessions/{id}/editor/snapshot - Artwork canvas as PNG
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/editor/snapshot",
    tag = "editor",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "PNG of the artwork canvas", content_type = "image/png"),
        (status = 409, description = "Editor not open", body = ErrorResponse)
    )
)]
pub async fn get_snapshot(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.snapshot_png().await {
        Ok(png) => HttpResponse::Ok().content_type("image/png").body(png),
        Err(e) => session_error(e),
    }
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

    fn image_payload() -> String {
        let png = encode_png(&RgbaImage::from_pixel(20, 10, Rgba([0, 0, 255, 255]))).unwrap();
        base64::engine::general_purpose::STANDARD.encode(png)
    }

    #[actix_web::test]
    async fn test_editor_flow() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let images = format!("/api/v1/sessions/{}/editor/images", id);

        // Editor opens with the design step
        let req = test::TestRequest::post()
            .uri(&images)
            .set_json(json!({ "image": image_payload() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/step", id))
            .set_json(json!({ "step": "design" }))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::post()
            .uri(&images)
            .set_json(json!({ "image": image_payload() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/editor/snapshot", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
        let png = test::read_body(resp).await;
        let snapshot = image::load_from_memory(&png).unwrap();
        assert_eq!((snapshot.width(), snapshot.height()), (800, 260));

        let selection = format!("/api/v1/sessions/{}/editor/selection", id);
        let req = test::TestRequest::delete().uri(&selection).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::delete().uri(&selection).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOTHING_SELECTED");
    }

    #[actix_web::test]
    async fn test_empty_text_is_rejected() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/step", id))
            .set_json(json!({ "step": "design" }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/editor/texts", id))
            .set_json(json!({ "text": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "EMPTY_TEXT");
    }
}
