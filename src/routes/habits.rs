//! HTTP routes for habits
//!
//! REST API endpoints over the habit engine:
//! - GET    /api/v1/habits/featured       - 6 newest public habits
//! - GET    /api/v1/habits/public         - all public habits (?search=&category=)
//! - GET    /api/v1/habits/my-habits      - caller's habits
//! - GET    /api/v1/habits/:id            - detail (visibility-gated)
//! - POST   /api/v1/habits                - create
//! - PATCH  /api/v1/habits/:id            - partial update (owner only)
//! - DELETE /api/v1/habits/:id            - delete (owner only)
//! - POST   /api/v1/habits/:id/complete   - mark done for today (owner only)
//!
//! Responses use the `{success, message|data|count}` envelope; engine
//! errors map to 400/401/403/404, store faults to a generic 500.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use crate::auth::{extract_token_from_header, Identity};
use crate::db::schemas::{Category, CreateHabitInput, HabitDoc, HabitPatch};
use crate::engine::{CompletionOutcome, HabitEngine};
use crate::server::AppState;
use crate::types::HabitError;

pub(super) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const MAX_BODY_BYTES: usize = 10 * 1024;

// =============================================================================
// Response Types
// =============================================================================

/// Habit as presented on the wire: ids as hex, instants as RFC 3339
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub reminder_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub owner_email: String,
    pub owner_name: String,
    pub is_public: bool,
    pub completion_history: Vec<String>,
    pub created_at: String,
}

impl From<HabitDoc> for HabitResponse {
    fn from(doc: HabitDoc) -> Self {
        Self {
            id: doc.id.map(|o| o.to_hex()).unwrap_or_default(),
            title: doc.title,
            description: doc.description,
            category: doc.category,
            reminder_time: doc.reminder_time,
            image: doc.image,
            owner_email: doc.owner_email,
            owner_name: doc.owner_name,
            is_public: doc.is_public,
            completion_history: doc
                .completion_history
                .iter()
                .map(|t| t.to_chrono().to_rfc3339())
                .collect(),
            created_at: doc.created_at.to_chrono().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<HabitResponse>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub success: bool,
    pub data: HabitResponse,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
    /// Hex id of the inserted habit
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub success: bool,
    pub message: String,
    pub already_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

pub(super) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(super) fn error_body(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            success: false,
            message: message.into(),
        },
    )
}

/// Map an engine error to its HTTP status and envelope
pub(super) fn engine_error_response(err: HabitError) -> Response<BoxBody> {
    match err {
        HabitError::Unauthenticated => error_body(
            StatusCode::UNAUTHORIZED,
            "Access denied. No token provided or invalid format.",
        ),
        HabitError::Auth(_) => {
            warn!("Token verification failed: {}", err);
            error_body(StatusCode::UNAUTHORIZED, "Invalid or expired token.")
        }
        HabitError::InvalidId(_) => error_body(StatusCode::BAD_REQUEST, "Invalid habit ID."),
        HabitError::InvalidInput(ref msg) => error_body(StatusCode::BAD_REQUEST, msg.clone()),
        HabitError::Http(ref msg) => error_body(StatusCode::BAD_REQUEST, msg.clone()),
        HabitError::NotFound => error_body(StatusCode::NOT_FOUND, "Habit not found."),
        HabitError::Forbidden => error_body(
            StatusCode::FORBIDDEN,
            "Access denied. You do not own this habit.",
        ),
        HabitError::Database(_) | HabitError::Io(_) => {
            // Internal detail stays in the log, never in the response
            error!("Store failure: {}", err);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "Server Error.")
        }
    }
}

pub(super) async fn parse_json_body<T, B>(req: Request<B>) -> Result<T, HabitError>
where
    T: for<'de> Deserialize<'de>,
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    // Reject a declared-oversized body before buffering any of it
    let declared_len = req
        .headers()
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if matches!(declared_len, Some(len) if len > MAX_BODY_BYTES) {
        return Err(HabitError::Http("Request body too large".into()));
    }

    let body = req
        .collect()
        .await
        .map_err(|e| HabitError::Http(format!("Failed to read body: {}", e)))?;

    // Chunked bodies carry no length header, so re-check what arrived
    let bytes = body.to_bytes();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(HabitError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes).map_err(|e| HabitError::Http(format!("Invalid JSON: {}", e)))
}

fn get_auth_header(req: &Request<hyper::body::Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Resolve the caller's identity from the Authorization header.
///
/// No header means an anonymous caller (`Ok(None)`); a header that fails
/// verification is an error, never a silent downgrade to anonymous.
pub(super) fn resolve_identity(
    req: &Request<hyper::body::Incoming>,
    state: &AppState,
) -> Result<Option<Identity>, HabitError> {
    match extract_token_from_header(get_auth_header(req)) {
        None => Ok(None),
        Some(token) => state.jwt.verify(token).map(Some),
    }
}

fn get_engine(state: &AppState) -> Result<Arc<HabitEngine>, Response<BoxBody>> {
    match &state.engine {
        Some(e) => Ok(Arc::clone(e)),
        None => Err(error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database not available.",
        )),
    }
}

/// Parse a query string into decoded key/value pairs
fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(query) = query else {
        return params;
    };

    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        // Form encoding uses '+' for spaces
        let value = value.replace('+', " ");
        if let Ok(decoded) = urlencoding::decode(&value) {
            params.insert(key.to_string(), decoded.into_owned());
        }
    }

    params
}

fn list_response(habits: Vec<HabitDoc>) -> Response<BoxBody> {
    let data: Vec<HabitResponse> = habits.into_iter().map(HabitResponse::from).collect();
    json_response(
        StatusCode::OK,
        &ListResponse {
            success: true,
            count: data.len(),
            data,
        },
    )
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /api/v1/habits/featured
pub async fn handle_featured(state: Arc<AppState>) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    match engine.list_featured().await {
        Ok(habits) => list_response(habits),
        Err(e) => engine_error_response(e),
    }
}

/// GET /api/v1/habits/public?search=&category=
pub async fn handle_public(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let params = parse_query(req.uri().query());
    let search = params.get("search").cloned();
    let category = match params.get("category") {
        Some(raw) => match raw.parse::<Category>() {
            Ok(c) => Some(c),
            Err(e) => return error_body(StatusCode::BAD_REQUEST, e),
        },
        None => None,
    };

    match engine.list_public(search, category).await {
        Ok(habits) => list_response(habits),
        Err(e) => engine_error_response(e),
    }
}

/// GET /api/v1/habits/my-habits
pub async fn handle_my_habits(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    match engine.list_owned(identity.as_ref()).await {
        Ok(habits) => list_response(habits),
        Err(e) => engine_error_response(e),
    }
}

/// GET /api/v1/habits/:id
pub async fn handle_detail(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    match engine.get_detail(id, identity.as_ref()).await {
        Ok(habit) => json_response(
            StatusCode::OK,
            &DetailResponse {
                success: true,
                data: habit.into(),
            },
        ),
        Err(e) => engine_error_response(e),
    }
}

/// POST /api/v1/habits
pub async fn handle_create(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    let input: CreateHabitInput = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return engine_error_response(e),
    };

    match engine.create(input, identity.as_ref()).await {
        Ok(id) => json_response(
            StatusCode::CREATED,
            &CreatedResponse {
                success: true,
                message: "Habit created successfully.".into(),
                data: id.to_hex(),
            },
        ),
        Err(e) => engine_error_response(e),
    }
}

/// PATCH/PUT /api/v1/habits/:id
pub async fn handle_update(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    let patch: HabitPatch = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return engine_error_response(e),
    };

    match engine.update(id, patch, identity.as_ref()).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &MessageResponse {
                success: true,
                message: "Habit updated successfully.".into(),
            },
        ),
        Err(e) => engine_error_response(e),
    }
}

/// DELETE /api/v1/habits/:id
pub async fn handle_delete(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    match engine.delete(id, identity.as_ref()).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &MessageResponse {
                success: true,
                message: "Habit deleted successfully.".into(),
            },
        ),
        Err(e) => engine_error_response(e),
    }
}

/// POST /api/v1/habits/:id/complete
pub async fn handle_complete(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let engine = match get_engine(&state) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    match engine.complete(id, identity.as_ref()).await {
        Ok(CompletionOutcome::Recorded(at)) => json_response(
            StatusCode::OK,
            &CompletionResponse {
                success: true,
                message: "Habit marked as completed for today.".into(),
                already_completed: false,
                completed_at: Some(at.to_chrono().to_rfc3339()),
            },
        ),
        Ok(CompletionOutcome::AlreadyCompleted) => json_response(
            StatusCode::OK,
            &CompletionResponse {
                success: true,
                message: "Habit already completed today.".into(),
                already_completed: true,
                completed_at: None,
            },
        ),
        Err(e) => engine_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_decodes() {
        let params = parse_query(Some("search=Morning%20Run&category=Fitness"));
        assert_eq!(params.get("search").map(String::as_str), Some("Morning Run"));
        assert_eq!(params.get("category").map(String::as_str), Some("Fitness"));
    }

    #[test]
    fn test_parse_query_plus_as_space() {
        let params = parse_query(Some("search=evening+walk"));
        assert_eq!(params.get("search").map(String::as_str), Some("evening walk"));
    }

    #[test]
    fn test_parse_query_empty() {
        assert!(parse_query(None).is_empty());
        assert!(parse_query(Some("")).is_empty());
        assert!(parse_query(Some("flag")).is_empty());
    }

    #[tokio::test]
    async fn test_parse_json_body_ok() {
        let req = Request::builder()
            .body(Full::new(Bytes::from(r#"{"title": "Read"}"#)))
            .unwrap();

        let patch: HabitPatch = parse_json_body(req).await.unwrap();
        assert_eq!(patch.title.as_deref(), Some("Read"));
    }

    #[tokio::test]
    async fn test_parse_json_body_rejects_declared_oversize() {
        // The cap applies to the Content-Length header before any body
        // bytes are buffered
        let req = Request::builder()
            .header(hyper::header::CONTENT_LENGTH, (MAX_BODY_BYTES + 1).to_string())
            .body(Full::new(Bytes::from("{}")))
            .unwrap();

        let err = parse_json_body::<HabitPatch, _>(req).await.unwrap_err();
        assert!(matches!(err, HabitError::Http(_)));
    }

    #[tokio::test]
    async fn test_parse_json_body_rejects_oversize_without_length_header() {
        let body = format!(r#"{{"title": "{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        let req = Request::builder()
            .body(Full::new(Bytes::from(body)))
            .unwrap();

        let err = parse_json_body::<HabitPatch, _>(req).await.unwrap_err();
        assert!(matches!(err, HabitError::Http(_)));
    }
}
