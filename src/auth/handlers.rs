use axum::{extract::State, http::StatusCode, Json};
use tracing::instrument;

use crate::auth::dto::{
    AssertionRequest, LoginRequest, RefreshRequest, RegisterRequest, TokenPair, UserView,
};
use crate::auth::extractors::BearerToken;
use crate::error::AuthError;
use crate::state::AppState;

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), AuthError> {
    let user = state.credentials.register(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let user = state
        .credentials
        .authenticate(&payload.email, &payload.password)
        .await?;
    let tokens = state.sessions.issue_session(&user)?;
    Ok(Json(tokens.into()))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let (_user, tokens) = state.sessions.refresh(&payload.refresh_token).await?;
    Ok(Json(tokens.into()))
}

#[instrument(skip(state, bearer))]
pub async fn me(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<Json<UserView>, AuthError> {
    let user = state.sessions.authorize(&bearer.0).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn assertion_login(
    State(state): State<AppState>,
    Json(payload): Json<AssertionRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let user = state.bridge.login_with_assertion(&payload.assertion).await?;
    let tokens = state.sessions.issue_session(&user)?;
    Ok(Json(tokens.into()))
}
