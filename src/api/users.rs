use crate::api::AppState;
use crate::api::schemas::users::{Profile, Registered, Registration, UserSummary};
use crate::domain::auth::AuthenticatedUser;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse> {
    let user = state.account_service.register(&payload.username, &payload.email, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(Registered { id: user.id })))
}

pub async fn me(user: AuthenticatedUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let profile = state.account_service.profile(user.user_id).await?;
    Ok(Json(Profile::from(profile)))
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.account_service.list_users().await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect::<Vec<_>>()))
}

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    let user = state.account_service.profile(id).await?;
    Ok(Json(UserSummary::from(user)))
}

pub async fn delete(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.account_service.delete_account(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
