use log::{error, info, warn};
use std::io::{Cursor, Read};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::error::ApiError;
use crate::handlers;
use crate::state::{AppState, SharedState};
use crate::util::request::{bearer_token, path_segments};

// ---------------------------------------------------------------------------
// Handler results
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Body {
    Json(serde_json::Value),
    /// Pre-serialized JSON served as a file attachment.
    Download { filename: String, json: String },
    Empty,
}

#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Body,
}

impl ApiResponse {
    pub fn ok(value: serde_json::Value) -> Self {
        ApiResponse { status: 200, body: Body::Json(value) }
    }

    pub fn created(value: serde_json::Value) -> Self {
        ApiResponse { status: 201, body: Body::Json(value) }
    }

    pub fn no_content() -> Self {
        ApiResponse { status: 204, body: Body::Empty }
    }

    pub fn download(filename: String, json: String) -> Self {
        ApiResponse { status: 200, body: Body::Download { filename, json } }
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("header names and values are ASCII")
}

pub fn json_response(status: u16, body: &serde_json::Value) -> Response<Cursor<Vec<u8>>> {
    let bytes = body.to_string().into_bytes();
    let len = bytes.len();
    Response::new(
        StatusCode(status),
        vec![header("Content-Type", "application/json")],
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

pub fn json_download_response(body: String, filename: &str) -> Response<Cursor<Vec<u8>>> {
    let bytes = body.into_bytes();
    let len = bytes.len();
    let disposition = format!("attachment; filename=\"{}\"", filename);
    Response::new(
        StatusCode(200),
        vec![
            header("Content-Type", "application/json"),
            header("Content-Disposition", &disposition),
        ],
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

pub fn empty_response(status: u16) -> Response<Cursor<Vec<u8>>> {
    Response::new(StatusCode(status), vec![], Cursor::new(Vec::new()), Some(0), None)
}

fn into_http(result: ApiResult) -> (u16, Response<Cursor<Vec<u8>>>) {
    match result {
        Ok(ApiResponse { status, body }) => {
            let response = match body {
                Body::Json(value) => json_response(status, &value),
                Body::Download { filename, json } => json_download_response(json, &filename),
                Body::Empty => empty_response(status),
            };
            (status, response)
        }
        Err(e) => {
            let status = e.status();
            if status >= 500 {
                error!("request failed: {e}");
            } else {
                warn!("request rejected ({status}): {e}");
            }
            (status, json_response(status, &e.body()))
        }
    }
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Reads the request, routes it and writes the response. Runs on the
/// request's own thread; training requests block it until they finish.
pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let auth = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str().to_owned());

    let result = read_body(&mut request, state.config.max_body_bytes)
        .and_then(|body| route(&state, &method, &url, auth.as_deref(), &body));

    let (status, response) = into_http(result);
    info!("{method} {url} -> {status}");
    if let Err(e) = request.respond(response) {
        warn!("failed to send response for {method} {url}: {e}");
    }
}

fn read_body(request: &mut Request, limit: usize) -> Result<String, ApiError> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge { limit });
    }
    let mut body = String::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_string(&mut body)
        .map_err(|e| ApiError::BadRequest(format!("unreadable request body: {e}")))?;
    if body.len() > limit {
        return Err(ApiError::PayloadTooLarge { limit });
    }
    Ok(body)
}

/// Maps a method and URL onto a handler. Everything except sign-up and
/// login needs a valid bearer token.
pub fn route(state: &AppState, method: &Method, url: &str, auth: Option<&str>, body: &str) -> ApiResult {
    let segments = path_segments(url);

    match (method, segments.as_slice()) {
        // ── Accounts ─────────────────────────────────────────────────────
        (Method::Post, ["api", "auth", "signup"]) => handlers::auth::signup(state, body),
        (Method::Post, ["api", "auth", "login"]) => handlers::auth::login(state, body),
        (Method::Get, ["api", "profile"]) => handlers::profile::get(state, authenticate(state, auth)?),

        // ── Models ───────────────────────────────────────────────────────
        (Method::Get, ["api", "models"]) => handlers::models::list(state, authenticate(state, auth)?),
        (Method::Post, ["api", "models", "train"]) => {
            handlers::models::train(state, authenticate(state, auth)?, body)
        }
        (Method::Post, ["api", "models", "predict"]) => {
            handlers::models::predict(state, authenticate(state, auth)?, body)
        }
        (Method::Get, ["api", "models", id]) => {
            handlers::models::get(state, authenticate(state, auth)?, parse_id(id)?)
        }
        (Method::Patch, ["api", "models", id]) => {
            handlers::models::rename(state, authenticate(state, auth)?, parse_id(id)?, body)
        }
        (Method::Delete, ["api", "models", id]) => {
            handlers::models::delete(state, authenticate(state, auth)?, parse_id(id)?)
        }
        (Method::Get, ["api", "models", id, "download"]) => {
            handlers::models::download(state, authenticate(state, auth)?, parse_id(id)?)
        }

        // ── 404 ──────────────────────────────────────────────────────────
        _ => Err(ApiError::NotFound(format!("no route for {method} {url}"))),
    }
}

fn authenticate(state: &AppState, auth: Option<&str>) -> Result<u64, ApiError> {
    bearer_token(auth)
        .and_then(|token| state.users.authenticate(token))
        .ok_or(ApiError::Unauthorized)
}

fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("no model with id '{raw}'")))
}
