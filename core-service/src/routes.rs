//! HTTP surface of the login service.
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `GET /login/{provider}/` | 302 to the provider's authorization URL |
//! | `GET /logincallback/{provider}/` | `?token=` or `?code=`, answers `{"token": ...}` |
//! | `GET /token/{provider}/` | `?token=<raw>`, answers `{"token": ...}` |
//! | `GET /token/` | session token of the `Authorization: Token <key>` caller |

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use core_auth::{AuthenticatedUser, CallbackParams, LoginManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

/// Scheme of the `Authorization` header carrying a session token.
pub const TOKEN_SCHEME: &str = "Token";

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LoginManager>,
}

/// Successful token response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Build the login router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login/{provider}/", get(login_redirect))
        .route("/logincallback/{provider}/", get(login_callback))
        .route("/token/", get(current_token))
        .route("/token/{provider}/", get(provider_token))
        .with_state(state)
}

/// GET /login/{provider}/
async fn login_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse> {
    let url = state.manager.authorization_url(&provider).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]))
}

/// GET /logincallback/{provider}/
async fn login_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<TokenResponse>> {
    let outcome = state.manager.handle_callback(&provider, &params).await?;
    Ok(Json(TokenResponse {
        token: outcome.token,
    }))
}

/// GET /token/{provider}/?token=<raw>
async fn provider_token(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<TokenResponse>> {
    let outcome = state
        .manager
        .login_with_token(&provider, params.token.as_deref())
        .await?;
    Ok(Json(TokenResponse {
        token: outcome.token,
    }))
}

/// GET /token/
async fn current_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>> {
    let user = session_user(&state, &headers).await?;
    let token = state.manager.session_token(user.as_ref()).await?;
    Ok(Json(TokenResponse { token }))
}

/// Resolve the caller from `Authorization: Token <key>`.
///
/// A missing, malformed or unknown key yields `None`.
pub async fn session_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<AuthenticatedUser>> {
    let Some(key) = token_from_headers(headers) else {
        return Ok(None);
    };

    let user = state.manager.authenticate(key).await?;
    if user.is_none() {
        debug!("Presented session token is unknown");
    }
    Ok(user)
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.split_once(' ')?;
    let key = key.trim();
    (scheme.eq_ignore_ascii_case(TOKEN_SCHEME) && !key.is_empty()).then_some(key)
}
