//! HTTP route for account registration
//!
//! - POST /api/v1/users/register-success - record the caller's account
//!   after the identity provider reports a successful sign-up
//!
//! The record is stamped from the verified bearer token; the body carries
//! at most an avatar URL.

use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::habits::{
    engine_error_response, error_body, json_response, parse_json_body, resolve_identity, BoxBody,
};
use crate::db::schemas::{RegisterInput, UserDoc};
use crate::engine::{RegistrationOutcome, UserRegistry};
use crate::server::AppState;

/// Registered user as presented on the wire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub subject_id: String,
    pub created_at: String,
}

impl From<UserDoc> for UserResponse {
    fn from(doc: UserDoc) -> Self {
        Self {
            id: doc.id.map(|o| o.to_hex()).unwrap_or_default(),
            email: doc.email,
            full_name: doc.full_name,
            photo_url: doc.photo_url,
            subject_id: doc.subject_id,
            created_at: doc.created_at.to_chrono().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

/// POST /api/v1/users/register-success
pub async fn handle_register(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let registry: Arc<UserRegistry> = match &state.users {
        Some(r) => Arc::clone(r),
        None => {
            return error_body(StatusCode::SERVICE_UNAVAILABLE, "Database not available.");
        }
    };

    let identity = match resolve_identity(&req, &state) {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    let input: RegisterInput = match parse_json_body(req).await {
        Ok(i) => i,
        Err(e) => return engine_error_response(e),
    };

    match registry.register(input, identity.as_ref()).await {
        Ok(RegistrationOutcome::Created(user)) => json_response(
            StatusCode::CREATED,
            &RegisteredResponse {
                success: true,
                message: "User registered successfully.".into(),
                user: user.into(),
            },
        ),
        Ok(RegistrationOutcome::AlreadyRegistered(user)) => json_response(
            StatusCode::OK,
            &RegisteredResponse {
                success: true,
                message: "User already registered.".into(),
                user: user.into(),
            },
        ),
        Err(e) => engine_error_response(e),
    }
}
