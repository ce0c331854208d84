use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Parses a JSON request body, reporting malformed input as a 400.
pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::BadRequest("request body must be a JSON object".into()));
    }
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Splits a URL into its path segments, ignoring the query string and
/// empty segments.
pub fn path_segments(url: &str) -> Vec<&str> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    path.split('/').filter(|s| !s.is_empty()).collect()
}
