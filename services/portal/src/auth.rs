use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::SharedState;

/// Gate for admin routes: `Authorization: Bearer <PORTAL_ADMIN_TOKEN>`.
pub async fn require_admin(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token_matches(token.trim(), &state.cfg.admin_token));

    if !authorized {
        warn!(path = %req.uri().path(), "rejected admin request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

fn token_matches(presented: &str, expected: &str) -> bool {
    // no early exit on the first differing byte
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
