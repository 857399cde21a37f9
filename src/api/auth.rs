use crate::api::AppState;
use crate::api::schemas::auth::{Login, Logout, Refresh, TokenPairResponse};
use crate::domain::auth::AuthenticatedUser;
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn login(State(state): State<AppState>, Json(payload): Json<Login>) -> Result<impl IntoResponse> {
    let pair = state.account_service.login(&payload.email, &payload.password).await?;
    Ok(Json(TokenPairResponse::from(pair)))
}

pub async fn refresh(State(state): State<AppState>, Json(payload): Json<Refresh>) -> Result<impl IntoResponse> {
    let pair = state.session_service.refresh(&payload.refresh_token).await?;
    Ok(Json(TokenPairResponse::from(pair)))
}

pub async fn logout(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    payload: Option<Json<Logout>>,
) -> Result<impl IntoResponse> {
    let refresh_token = payload.and_then(|Json(body)| body.refresh_token);
    state.session_service.logout(&user, refresh_token.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}
