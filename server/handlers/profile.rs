use serde_json::json;

use crate::error::ApiError;
use crate::routes::{ApiResponse, ApiResult};
use crate::state::AppState;

/// `GET /api/profile`
pub fn get(state: &AppState, user_id: u64) -> ApiResult {
    let user = state.users.get(user_id).ok_or(ApiError::Unauthorized)?;
    Ok(ApiResponse::ok(json!({
        "username": user.username,
        "email": user.email,
        "subscription_tier": user.profile.subscription_tier,
        "models_trained": user.profile.models_trained,
        "storage_used_mb": user.profile.storage_used_mb,
        "created_at": user.profile.created_at,
    })))
}
