//! Configurator session endpoints

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{session_error, ErrorResponse};
use crate::domain::Patch;
use crate::engine::{ConfigChange, ConfiguratorSession, RefreshOutcome, SessionError, SessionView, Step};
use crate::AppState;

/// Session state response
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub data: SessionView,
}

/// Response for operations that may refresh the preview
#[derive(Serialize, ToSchema)]
pub struct SessionUpdateResponse {
    pub success: bool,
    /// `null` when the change did not touch the preview
    pub refresh: Option<RefreshOutcome>,
    pub data: SessionView,
}

/// Replacement patch list
#[derive(Debug, Deserialize, ToSchema)]
pub struct PatchesRequest {
    pub patches: Vec<Patch>,
}

/// Wizard navigation request
#[derive(Debug, Deserialize, ToSchema)]
pub struct StepRequest {
    pub step: Step,
}

pub(crate) fn session_response(session: &ConfiguratorSession) -> HttpResponse {
    match session.state() {
        Ok(data) => HttpResponse::Ok().json(SessionResponse { success: true, data }),
        Err(e) => session_error(e),
    }
}

fn update_response(session: &ConfiguratorSession, refresh: Option<RefreshOutcome>) -> HttpResponse {
    match session.state() {
        Ok(data) => HttpResponse::Ok().json(SessionUpdateResponse {
            success: true,
            refresh,
            data,
        }),
        Err(e) => session_error(e),
    }
}

/// POST /api/v1/sessions - Start a configurator session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 503, description = "Session limit reached", body = ErrorResponse)
    )
)]
pub async fn create_session(state: web::Data<AppState>) -> HttpResponse {
    let session = match state.sessions.create() {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.state() {
        Ok(data) => HttpResponse::Created().json(SessionResponse { success: true, data }),
        Err(e) => session_error(e),
    }
}

/// GET /api/v1/sessions/{id} - Current session state
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    match state.sessions.get(path.into_inner()) {
        Ok(session) => session_response(&session),
        Err(e) => session_error(e),
    }
}

/// DELETE /api/v1/sessions/{id} - End a session
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn delete_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    if state.sessions.remove(id) {
        HttpResponse::NoContent().finish()
    } else {
        session_error(SessionError::NotFound(id))
    }
}

/// PUT /api/v1/sessions/{id}/config - Change width, length or material
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/config",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ConfigChange,
    responses(
        (status = 200, description = "Configuration updated", body = SessionUpdateResponse),
        (status = 400, description = "Value not offered for this model", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn update_config(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ConfigChange>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.update_config(body.into_inner()).await {
        Ok(refresh) => update_response(&session, refresh),
        Err(e) => session_error(e),
    }
}

/// PUT /api/v1/sessions/{id}/patches - Replace the patch list
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/patches",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = PatchesRequest,
    responses(
        (status = 200, description = "Patches replaced", body = SessionUpdateResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn update_patches(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<PatchesRequest>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    let patches = body.into_inner().patches;
    info!(session_id = %session.id(), patches = patches.len(), "Replacing patches");
    match session.set_patches(patches).await {
        Ok(refresh) => update_response(&session, refresh),
        Err(e) => session_error(e),
    }
}

/// PUT /api/v1/sessions/{id}/step - Navigate the wizard
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/step",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = StepRequest,
    responses(
        (status = 200, description = "Step changed", body = SessionUpdateResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn go_to_step(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<StepRequest>,
) -> HttpResponse {
    let session = match state.sessions.get(path.into_inner()) {
        Ok(session) => session,
        Err(e) => return session_error(e),
    };

    match session.go_to_step(body.step).await {
        Ok(refresh) => update_response(&session, refresh),
        Err(e) => session_error(e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use serde_json::json;

    use super::super::test_support;
    use crate::api::configure_routes;

    #[actix_web::test]
    async fn test_session_lifecycle() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["step"], "configure");
        assert_eq!(body["data"]["config"]["width_mm"], 50);

        let req = test::TestRequest::get().uri(&format!("/api/v1/sessions/{}", id)).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["patches"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::delete().uri(&format!("/api/v1/sessions/{}", id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 204);

        let req = test::TestRequest::get().uri(&format!("/api/v1/sessions/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");
    }

    #[actix_web::test]
    async fn test_width_change_reports_refresh() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/config", id))
            .set_json(json!({ "width_mm": 75 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["refresh"]["status"], "applied");
        assert_eq!(body["refresh"]["model_scale"]["y"], 1.5);
        assert_eq!(body["data"]["config"]["width_mm"], 75);

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/config", id))
            .set_json(json!({ "length_m": 100 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["refresh"].is_null());

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/config", id))
            .set_json(json!({ "width_mm": 60 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn test_design_step_composites() {
        let app = test::init_service(App::new().app_data(test_support::state()).configure(configure_routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/step", id))
            .set_json(json!({ "step": "design" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["editor_open"], true);
        assert_eq!(body["refresh"]["compensation_factor"], 1.0);

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/patches", id))
            .set_json(json!({ "patches": [{ "x": 0.5, "y": 0.5, "rot": 0.0, "scale": 0.5 }] }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["patches"].as_array().unwrap().len(), 1);
        assert_eq!(body["refresh"]["status"], "applied");
    }
}
