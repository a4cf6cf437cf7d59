use axum::{Json, response::IntoResponse};
use axum_extra::extract::PrivateCookieJar;
use serde_json::json;

use crate::auth::invalidate_auth_cookie;

/// Invalidate the auth cookie, logging the user out.
pub async fn post_log_out(jar: PrivateCookieJar) -> impl IntoResponse {
    (
        invalidate_auth_cookie(jar),
        Json(json!({ "message": "Logged out successfully" })),
    )
}
