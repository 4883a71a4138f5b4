use crate::{config::Config, error::AppError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authentication information attached to each authenticated request
#[derive(Debug, Clone)]
pub struct AuthInfo {
    /// Name of the API key used for authentication
    pub api_key_name: String,
}

/// Authentication middleware
/// Extracts and validates the Bearer token from the Authorization header
pub async fn auth_middleware(
    State(config): State<Arc<Config>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = extract_bearer_token(auth_header)?;

    let api_key_config = config
        .api_keys
        .iter()
        .find(|k| k.key == token && k.enabled)
        .ok_or_else(|| AppError::Unauthorized("Invalid or disabled API key".to_string()))?;

    req.extensions_mut().insert(AuthInfo {
        api_key_name: api_key_config.name.clone(),
    });

    Ok(next.run(req).await)
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(auth_header: &str) -> Result<&str, AppError> {
    const BEARER_PREFIX: &str = "Bearer ";

    let token = auth_header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Bearer scheme".to_string())
    })?;

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("Bearer token is empty".to_string()));
    }

    Ok(token)
}
