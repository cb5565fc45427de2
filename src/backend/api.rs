use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::error;

use mini_notion_common::note::NoteStatus;
use mini_notion_common::{DomainError, ErrorKind};

use super::db::DbHandle;
use super::models::*;
use super::service;
use crate::errors::NotionError;

/// Header carrying the id of the account a request acts for.
pub const ACCOUNT_HEADER: &str = "x-account-id";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<NotionError> for ApiError {
    fn from(err: NotionError) -> Self {
        match err {
            NotionError::Domain(e) => ApiError::Domain(e),
            other => ApiError::Internal(format!("{:#}", other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Domain(err) => {
                let status = match err.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                };
                let body = ErrorBody {
                    code: err.code().to_string(),
                    message: err.user_message(),
                };
                (status, body)
            }
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                let body = ErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An unexpected error occurred.".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

// ── Actor extraction ──────────────────────────────────────────────────

/// Account id taken from the `X-Account-ID` header. Requests without one
/// are rejected with `UNAUTHORIZED`.
pub struct Actor(pub String);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Actor(v.to_string()))
            .ok_or(ApiError::Domain(DomainError::Unauthorized))
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/accounts/auth", post(auth_account))
        .route("/api/accounts/me", get(get_me))
        .route("/api/accounts/by-email", get(get_account_by_email))
        .route("/api/accounts/{id}", get(get_account))
        .route("/api/templates", get(list_templates).post(create_template))
        .route(
            "/api/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
        .route("/api/notes/{id}/publish", post(publish_note))
        .route("/api/notes/{id}/unpublish", post(unpublish_note))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn auth_account(
    State(state): State<SharedState>,
    Json(req): Json<AuthAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = req.into_input();
    let account = state
        .db
        .call(move |db| service::create_or_get_account(db, input))
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

async fn get_me(
    State(state): State<SharedState>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .call(move |db| service::get_account(db, &actor))
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

async fn get_account_by_email(
    State(state): State<SharedState>,
    Query(query): Query<EmailQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .call(move |db| service::get_account_by_email(db, &query.email))
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

async fn get_account(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .call(move |db| service::get_account(db, &id))
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

async fn list_templates(
    State(state): State<SharedState>,
    Query(query): Query<TemplateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = query.into();
    let templates = state
        .db
        .call(move |db| service::list_templates(db, &filters))
        .await?;
    Ok(Json(templates))
}

async fn create_template(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = field_drafts(req.fields);
    let name = req.name;
    let template = state
        .db
        .call(move |db| service::create_template(db, &actor, &name, fields))
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let template = state
        .db
        .call(move |db| service::get_template(db, &id))
        .await?;
    Ok(Json(template))
}

async fn update_template(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = req.fields.map(field_drafts);
    let name = req.name;
    let template = state
        .db
        .call(move |db| service::update_template(db, &actor, &id, &name, fields))
        .await?;
    Ok(Json(template))
}

async fn delete_template(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| service::delete_template(db, &actor, &id))
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn list_notes(
    State(state): State<SharedState>,
    Query(query): Query<NoteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = query.into_filters()?;
    let notes = state
        .db
        .call(move |db| service::list_notes(db, &filters))
        .await?;
    Ok(Json(notes))
}

async fn create_note(
    State(state): State<SharedState>,
    Actor(actor): Actor,
    Json(req): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sections = req.sections();
    let title = req.title;
    let template_id = req.template_id;
    let note = state
        .db
        .call(move |db| service::create_note(db, &actor, &title, &template_id, sections))
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.db.call(move |db| service::get_note(db, &id)).await?;
    Ok(Json(note))
}

async fn update_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sections = req.section_updates();
    let title = req.title;
    let note = state
        .db
        .call(move |db| service::update_note(db, &actor, &id, &title, sections))
        .await?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .call(move |db| service::delete_note(db, &actor, &id))
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn publish_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, ApiError> {
    let note = state
        .db
        .call(move |db| service::change_status(db, &actor, &id, NoteStatus::Publish))
        .await?;
    Ok(Json(note))
}

async fn unpublish_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Actor(actor): Actor,
) -> Result<impl IntoResponse, ApiError> {
    let note = state
        .db
        .call(move |db| service::change_status(db, &actor, &id, NoteStatus::Draft))
        .await?;
    Ok(Json(note))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::db::NotionDb;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let db = NotionDb::new_in_memory().unwrap();
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
        });
        api_router().with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        actor: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(ACCOUNT_HEADER, actor);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let value = body_json(response.into_body()).await;
        (status, value)
    }

    async fn sign_in(app: &Router, email: &str, name: &str) -> String {
        let (status, account) = send(
            app,
            "POST",
            "/api/accounts/auth",
            None,
            Some(json!({
                "email": email,
                "name": name,
                "provider": "google",
                "providerAccountId": format!("g-{}", name),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        account["id"].as_str().unwrap().to_string()
    }

    async fn create_daily_template(app: &Router, actor: &str) -> Value {
        let (status, template) = send(
            app,
            "POST",
            "/api/templates",
            Some(actor),
            Some(json!({
                "name": "Daily",
                "fields": [
                    {"label": "Summary", "order": 1, "isRequired": true},
                    {"label": "Details", "order": 2, "isRequired": false}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        template
    }

    async fn create_note_for(app: &Router, actor: &str, template: &Value) -> Value {
        let sections: Vec<Value> = template["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| json!({"fieldId": f["id"], "content": "filled"}))
            .collect();
        let (status, note) = send(
            app,
            "POST",
            "/api/notes",
            Some(actor),
            Some(json!({
                "title": "Monday",
                "templateId": template["id"],
                "sections": sections,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        note
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_auth_and_me() {
        let app = test_app();
        let id = sign_in(&app, "ada@example.com", "Ada").await;

        let (status, me) = send(&app, "GET", "/api/accounts/me", Some(&id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ada@example.com");
        assert_eq!(me["fullName"], "Ada");
        assert!(me["lastLoginAt"].is_string());

        let (status, err) = send(&app, "GET", "/api/accounts/me", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["code"], "UNAUTHORIZED");

        let (status, by_id) = send(&app, "GET", &format!("/api/accounts/{}", id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_id["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_account_by_email() {
        let app = test_app();
        let id = sign_in(&app, "ada@example.com", "Ada").await;

        let (status, found) = send(
            &app,
            "GET",
            "/api/accounts/by-email?email=ada@example.com",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["id"], id.as_str());

        let (status, err) = send(&app, "GET", "/api/accounts/by-email?email=nope", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_EMAIL");

        let (status, err) = send(
            &app,
            "GET",
            "/api/accounts/by-email?email=bob@example.com",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_auth_rejects_invalid_identity() {
        let app = test_app();
        let (status, err) = send(
            &app,
            "POST",
            "/api/accounts/auth",
            None,
            Some(json!({"email": "ada@example.com", "name": "Ada", "provider": "google"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "PROVIDER_ACCOUNT_REQUIRED");
    }

    #[tokio::test]
    async fn test_create_and_list_templates() {
        let app = test_app();
        let ada = sign_in(&app, "ada@example.com", "Ada").await;
        let template = create_daily_template(&app, &ada).await;
        assert_eq!(template["name"], "Daily");
        assert_eq!(template["ownerId"], ada.as_str());
        assert_eq!(template["owner"]["firstName"], "Ada");
        assert_eq!(template["isUsed"], false);
        assert_eq!(template["fields"][0]["isRequired"], true);

        let (status, list) = send(&app, "GET", "/api/templates?q=dai", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (_, list) = send(&app, "GET", "/api/templates?q=weekly", None, None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_template_validation_and_auth() {
        let app = test_app();
        let ada = sign_in(&app, "ada@example.com", "Ada").await;

        let (status, err) = send(
            &app,
            "POST",
            "/api/templates",
            Some(&ada),
            Some(json!({"name": "  ", "fields": [{"label": "A"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "TEMPLATE_NAME_REQUIRED");

        let (status, err) = send(
            &app,
            "POST",
            "/api/templates",
            None,
            Some(json!({"name": "Daily", "fields": [{"label": "A"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_structural_lock_over_http() {
        let app = test_app();
        let ada = sign_in(&app, "ada@example.com", "Ada").await;
        let template = create_daily_template(&app, &ada).await;
        create_note_for(&app, &ada, &template).await;
        let uri = format!("/api/templates/{}", template["id"].as_str().unwrap());

        let (_, fetched) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(fetched["isUsed"], true);

        let summary = &template["fields"][0];
        let details = &template["fields"][1];

        let (status, err) = send(
            &app,
            "PUT",
            &uri,
            Some(&ada),
            Some(json!({"name": "Daily", "fields": [summary]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "TEMPLATE_FIELD_IN_USE");
        assert_eq!(
            err["message"],
            "Template fields cannot be changed or removed because notes use this template."
        );

        let (status, err) = send(
            &app,
            "PUT",
            &uri,
            Some(&ada),
            Some(json!({"name": "Daily", "fields": [
                summary,
                details,
                {"label": "Extra", "order": 3, "isRequired": false}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "TEMPLATE_STRUCTURE_LOCKED");

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(&ada),
            Some(json!({"name": "Daily log", "fields": [
                {"id": summary["id"], "label": "Headline", "order": 1, "isRequired": true},
                details
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Daily log");
        assert_eq!(updated["fields"][0]["label"], "Headline");

        let (status, err) = send(&app, "DELETE", &uri, Some(&ada), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "TEMPLATE_IN_USE");
    }

    #[tokio::test]
    async fn test_template_update_and_delete_require_owner() {
        let app = test_app();
        let ada = sign_in(&app, "ada@example.com", "Ada").await;
        let bob = sign_in(&app, "bob@example.com", "Bob").await;
        let template = create_daily_template(&app, &ada).await;
        let uri = format!("/api/templates/{}", template["id"].as_str().unwrap());

        let (status, _) = send(&app, "PUT", &uri, Some(&bob), Some(json!({"name": "Mine"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "DELETE", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "DELETE", &uri, Some(&ada), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, err) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let app = test_app();
        let ada = sign_in(&app, "ada@example.com", "Ada").await;
        let template = create_daily_template(&app, &ada).await;
        let note = create_note_for(&app, &ada, &template).await;
        assert_eq!(note["status"], "Draft");
        assert_eq!(note["templateName"], "Daily");
        assert_eq!(note["owner"]["id"], ada.as_str());
        assert_eq!(note["sections"][0]["fieldLabel"], "Summary");
        assert_eq!(note["sections"][0]["isRequired"], true);

        let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());
        let sections: Vec<Value> = note["sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| json!({"id": s["id"], "content": "rewritten"}))
            .collect();
        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(&ada),
            Some(json!({"title": "Tuesday", "sections": sections})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Tuesday");
        assert_eq!(updated["sections"][1]["content"], "rewritten");

        let (status, published) =
            send(&app, "POST", &format!("{}/publish", uri), Some(&ada), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(published["status"], "Publish");

        let (_, list) = send(&app, "GET", "/api/notes?status=Publish", None, None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, drafted) =
            send(&app, "POST", &format!("{}/unpublish", uri), Some(&ada), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(drafted["status"], "Draft");

        let (status, body) = send(&app, "DELETE", &uri, Some(&ada), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_note_errors() {
        let app = test_app();
        let ada = sign_in(&app, "ada@example.com", "Ada").await;
        let bob = sign_in(&app, "bob@example.com", "Bob").await;
        let template = create_daily_template(&app, &ada).await;

        let (status, err) = send(
            &app,
            "POST",
            "/api/notes",
            Some(&ada),
            Some(json!({
                "title": "Monday",
                "templateId": template["id"],
                "sections": [
                    {"fieldId": template["fields"][0]["id"], "content": ""},
                    {"fieldId": template["fields"][1]["id"], "content": "x"}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "REQUIRED_FIELD_EMPTY");

        let note = create_note_for(&app, &ada, &template).await;
        let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());
        let (status, err) =
            send(&app, "POST", &format!("{}/publish", uri), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["code"], "UNAUTHORIZED");

        let (status, err) = send(&app, "GET", "/api/notes?status=Archived", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "INVALID_STATUS");
    }

    #[test]
    fn test_internal_error_maps_to_500() {
        let err = ApiError::from(NotionError::from(anyhow::anyhow!("disk I/O error")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
