use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::error::AppError;
use super::state::AppState;
use crate::access::Identity;
use crate::auth::decode_jwt;
use crate::db::DbError;

/// Require `Authorization: Bearer <jwt>` and attach the caller's [`Identity`].
///
/// The role comes from the stored user, not the token, so a role change or deletion applies
/// to tokens already issued.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        tracing::warn!(
            "Missing bearer token for {} {}",
            request.method(),
            request.uri().path()
        );
        return Err(AppError::unauthorized("Authentication required"));
    };

    let claims = decode_jwt(token, &state.auth.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected token: {:#}", e);
        AppError::unauthorized("Invalid or expired token")
    })?;
    let claimed = claims
        .identity()
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    let user = state.db.get_user(claimed.user_id).map_err(|e| match e {
        DbError::NotFound(_) => {
            tracing::warn!("Token for unknown user {}", claimed.user_id);
            AppError::unauthorized("Invalid or expired token")
        }
        other => AppError::from(other),
    })?;

    request.extensions_mut().insert(Identity::new(user.id, user.role));
    Ok(next.run(request).await)
}
