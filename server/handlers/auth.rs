use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::util::request::parse_json;

const MAX_USERNAME_CHARS: usize = 150;
const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Deserialize)]
struct SignupRequest {
    username: String,
    password: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// `POST /api/auth/signup`
pub fn signup(state: &AppState, body: &str) -> ApiResult {
    let req: SignupRequest = parse_json(body)?;
    let username = req.username.trim();
    let len = username.chars().count();
    if len == 0 || len > MAX_USERNAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "username must be 1 to {MAX_USERNAME_CHARS} characters"
        )));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    let email = req.email.filter(|e| !e.trim().is_empty());

    let user = state.users.register(username, &req.password, email)?;
    info!("registered user {} ({})", user.id, user.username);
    Ok(ApiResponse::created(json!({ "id": user.id, "username": user.username })))
}

/// `POST /api/auth/login`
pub fn login(state: &AppState, body: &str) -> ApiResult {
    let req: LoginRequest = parse_json(body)?;
    let token = state.users.login(req.username.trim(), &req.password)?;
    Ok(ApiResponse::ok(json!({ "token": token })))
}
