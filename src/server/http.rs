//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Requests are matched
//! on (method, path) and dispatched to the route handlers.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::TokenVerifier;
use crate::config::Args;
use crate::db::MongoClient;
use crate::engine::{HabitEngine, UserRegistry};
use crate::routes;
use crate::types::HabitError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const HABITS_PREFIX: &str = "/api/v1/habits";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// Habit engine; None when MongoDB is unavailable (dev mode)
    pub engine: Option<Arc<HabitEngine>>,
    /// Account registry; None when MongoDB is unavailable (dev mode)
    pub users: Option<Arc<UserRegistry>>,
    /// Verifier for bearer tokens on authenticated routes
    pub jwt: TokenVerifier,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        mongo: Option<MongoClient>,
        engine: Option<Arc<HabitEngine>>,
        users: Option<Arc<UserRegistry>>,
    ) -> Self {
        let jwt = TokenVerifier::new(&args.jwt_secret(), args.jwt_issuer.as_deref());

        Self {
            args,
            mongo,
            engine,
            users,
            jwt,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), HabitError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "habitd listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure JWT fallback secret in use");
    }
    if state.engine.is_none() {
        warn!("No database connection - habit routes will return 503");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Root banner for load balancer checks
        (Method::GET, "/") => to_boxed(text_response("Habit Tracker Server is running")),

        // Liveness probe - returns 200 if habitd is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // ====================================================================
        // Habit API
        // ====================================================================
        (Method::GET, "/api/v1/habits/featured") => {
            routes::handle_featured(Arc::clone(&state)).await
        }

        (Method::GET, "/api/v1/habits/public") => {
            routes::handle_public(req, Arc::clone(&state)).await
        }

        (Method::GET, "/api/v1/habits/my-habits") => {
            routes::handle_my_habits(req, Arc::clone(&state)).await
        }

        (Method::POST, p) if p == HABITS_PREFIX => {
            routes::handle_create(req, Arc::clone(&state)).await
        }

        (Method::POST, "/api/v1/users/register-success") => {
            routes::handle_register(req, Arc::clone(&state)).await
        }

        (Method::POST, p) if p.starts_with(HABITS_PREFIX) && p.ends_with("/complete") => {
            match habit_id_from(p, Some("/complete")) {
                Some(id) => {
                    let id = id.to_string();
                    routes::handle_complete(req, Arc::clone(&state), &id).await
                }
                None => to_boxed(not_found_response(&path)),
            }
        }

        (Method::GET, p) if p.starts_with(HABITS_PREFIX) => match habit_id_from(p, None) {
            Some(id) => {
                let id = id.to_string();
                routes::handle_detail(req, Arc::clone(&state), &id).await
            }
            None => to_boxed(not_found_response(&path)),
        },

        // PUT is accepted as an alias for PATCH
        (Method::PATCH, p) | (Method::PUT, p) if p.starts_with(HABITS_PREFIX) => {
            match habit_id_from(p, None) {
                Some(id) => {
                    let id = id.to_string();
                    routes::handle_update(req, Arc::clone(&state), &id).await
                }
                None => to_boxed(not_found_response(&path)),
            }
        }

        (Method::DELETE, p) if p.starts_with(HABITS_PREFIX) => match habit_id_from(p, None) {
            Some(id) => {
                let id = id.to_string();
                routes::handle_delete(req, Arc::clone(&state), &id).await
            }
            None => to_boxed(not_found_response(&path)),
        },

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Extract the `:id` segment from `/api/v1/habits/:id[suffix]`.
///
/// Returns None for an empty id or one containing further slashes.
fn habit_id_from<'a>(path: &'a str, suffix: Option<&str>) -> Option<&'a str> {
    let rest = path.strip_prefix(HABITS_PREFIX)?.strip_prefix('/')?;
    let id = match suffix {
        Some(s) => rest.strip_suffix(s)?,
        None => rest,
    };
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn text_response(message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap()
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "success": false,
        "message": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_habit_id_extraction() {
        assert_eq!(
            habit_id_from("/api/v1/habits/65f1a2b3c4d5e6f7a8b9c0d1", None),
            Some("65f1a2b3c4d5e6f7a8b9c0d1")
        );
        assert_eq!(
            habit_id_from("/api/v1/habits/abc/complete", Some("/complete")),
            Some("abc")
        );
        assert_eq!(habit_id_from("/api/v1/habits/", None), None);
        assert_eq!(habit_id_from("/api/v1/habits/a/b", None), None);
        assert_eq!(habit_id_from("/api/v1/habits//complete", Some("/complete")), None);
    }
}
