use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::{verify_token, Claims};
use crate::AppState;

/// Extract and validate JWT token from Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn claims(request: &Request) -> AppResult<&Claims> {
    request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("Please login to access this route".to_string()))
}

/// Require admin role
pub async fn require_admin(
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if claims(&request)?.role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "Access denied. Admin privileges required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// Require manager or admin role
pub async fn require_staff(
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if !claims(&request)?.role.is_staff() {
        return Err(AppError::Forbidden(
            "Access denied. Manager or Admin privileges required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
