//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection, match-based routing.
//! Everything except the health probe lives under `/api/v1`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::auth::{GoogleVerifier, JwtValidator};
use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::routes::BoxBody;
use crate::sheets::SyncQueue;
use crate::storage::StorageClient;
use crate::types::Error;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    pub storage: Arc<StorageClient>,
    pub jwt: JwtValidator,
    pub google: GoogleVerifier,
    /// Bounded queue feeding the spreadsheet sync workers
    pub sync_queue: SyncQueue,
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), Error> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("ricewatch listening on {}", state.args.listen);

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

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
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

    debug!("[{}] {} {}", addr, method, path);

    // CORS preflight
    if method == Method::OPTIONS {
        return Ok(to_boxed(preflight_response()));
    }

    // Health check outside the API prefix
    if method == Method::GET && path == "/health" {
        return Ok(to_boxed(routes::health_check()));
    }

    let api_path = match path.strip_prefix("/api/v1") {
        Some(p) => p.to_string(),
        None => return Ok(to_boxed(not_found_response(&path))),
    };

    // Auth routes consume the request themselves
    if api_path.starts_with("/auth") {
        return Ok(routes::handle_auth_request(req, Arc::clone(&state), &api_path).await);
    }

    let response = match (method, api_path.as_str()) {
        // ====================================================================
        // Submissions
        // ====================================================================
        (Method::GET, "/submissions") | (Method::GET, "/submissions/") => {
            routes::submissions::handle_list(req, state).await
        }
        (Method::POST, "/submissions") | (Method::POST, "/submissions/") => {
            routes::submissions::handle_create(req, state).await
        }
        (Method::GET, "/submissions/export") => {
            routes::submissions::handle_export(req, state).await
        }
        (Method::GET, p) if p.starts_with("/submissions/") => {
            let id = p.trim_start_matches("/submissions/").to_string();
            routes::submissions::handle_get(req, state, &id).await
        }
        (Method::PUT, p) if p.starts_with("/submissions/") => {
            let id = p.trim_start_matches("/submissions/").to_string();
            routes::submissions::handle_update(req, state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/submissions/") => {
            let id = p.trim_start_matches("/submissions/").to_string();
            routes::submissions::handle_delete(req, state, &id).await
        }

        // ====================================================================
        // Media
        // ====================================================================
        (Method::POST, "/media/upload") => routes::media::handle_upload(req, state).await,
        (Method::GET, p) if p.starts_with("/media/") => {
            let filename = p.trim_start_matches("/media/").to_string();
            to_boxed(routes::media::handle_get(&state, &filename))
        }
        (Method::DELETE, p) if p.starts_with("/media/") => {
            let filename = p.trim_start_matches("/media/").to_string();
            routes::media::handle_delete(req, state, &filename).await
        }

        // ====================================================================
        // Fields
        // ====================================================================
        (Method::GET, "/fields") | (Method::GET, "/fields/") => {
            routes::fields::handle_list(req, state).await
        }
        (Method::POST, "/fields") | (Method::POST, "/fields/") => {
            routes::fields::handle_create(req, state).await
        }
        (Method::GET, p) if p.starts_with("/fields/") => {
            let id = p.trim_start_matches("/fields/").to_string();
            routes::fields::handle_get(req, state, &id).await
        }
        (Method::PUT, p) if p.starts_with("/fields/") => {
            let id = p.trim_start_matches("/fields/").to_string();
            routes::fields::handle_update(req, state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/fields/") => {
            let id = p.trim_start_matches("/fields/").to_string();
            routes::fields::handle_delete(req, state, &id).await
        }

        // ====================================================================
        // Users
        // ====================================================================
        (Method::GET, p) if p.starts_with("/users/") => {
            let id = p.trim_start_matches("/users/").to_string();
            routes::users::handle_get(req, state, &id).await
        }
        (Method::PUT, p) if p.starts_with("/users/") => {
            let id = p.trim_start_matches("/users/").to_string();
            routes::users::handle_update(req, state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/users/") => {
            let id = p.trim_start_matches("/users/").to_string();
            routes::users::handle_delete(req, state, &id).await
        }

        // ====================================================================
        // Analytics
        // ====================================================================
        (Method::GET, "/analytics/dashboard") => {
            routes::analytics::handle_dashboard(req, state).await
        }
        (Method::GET, "/analytics/trends") => routes::analytics::handle_trends(req, state).await,
        (Method::GET, "/analytics/reports") => routes::analytics::handle_reports(req, state).await,

        // Not found
        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
pub fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "not_found",
        "message": format!("No route for {}", path),
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
