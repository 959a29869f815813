//! Preview polling endpoint

use std::time::Duration;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::composites::TextureData;
use crate::api::error::{session_error, ErrorResponse};
use crate::engine::ModelScale;
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    /// Last revision the client has seen; waits for a newer one when given
    pub after: Option<u64>,
}

/// Texture and mesh scale the viewer should display
#[derive(Serialize, ToSchema)]
pub struct PreviewResponse {
    pub success: bool,
    pub revision: u64,
    /// `null` means the material's own base texture
    pub texture: Option<TextureData>,
    pub model_scale: ModelScale,
}

/// GET /api/v1/sessions/{id}/preview - Latest preview frame
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/preview",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        PreviewQuery
    ),
    responses(
        (status = 200, description = "Current preview frame", body = PreviewResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_preview(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PreviewQuery>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    let frame = match query.after {
        Some(after) => {
            let timeout = Duration::from_secs(state.settings.sessions.preview_poll_timeout_secs);
            session.preview().wait_newer(after, timeout).await
        }
        None => session.preview().current(),
    };

    HttpResponse::Ok().json(PreviewResponse {
        success: true,
        revision: frame.revision,
        texture: frame.texture.as_ref().map(TextureData::from),
        model_scale: frame.model_scale,
    })
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use serde_json::json;

    use super::super::test_support;
    use crate::api::configure_routes;

    #[actix_web::test]
    async fn test_preview_follows_width_changes() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let preview = format!("/api/v1/sessions/{}/preview", id);

        let req = test::TestRequest::get().uri(&preview).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["revision"], 0);
        assert!(body["texture"].is_null());

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/step", id))
            .set_json(json!({ "step": "design" }))
            .to_request();
        test::call_service(&app, req).await;
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/config", id))
            .set_json(json!({ "width_mm": 38 }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri(&format!("{}?after=2", preview)).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["revision"], 4);
        assert_eq!(body["texture"]["compensation_factor"], 0.8);
        assert_eq!(body["model_scale"]["y"], 0.76);
    }
}
