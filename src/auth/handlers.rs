use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, RegisterRequest, RegisterResponse, TokenResponse},
        password::hash_password,
        repo::CreateUserError,
        repo_types::User,
        services::authenticate,
    },
    error::ApiError,
    extract::{ApiForm, ApiJson},
    state::AppState,
};

const USERNAME_TAKEN: &str = "Username already exists";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

impl From<CreateUserError> for ApiError {
    fn from(e: CreateUserError) -> Self {
        match e {
            CreateUserError::UsernameTaken => ApiError::Conflict(USERNAME_TAKEN.into()),
            CreateUserError::Database(e) => ApiError::Database(e),
            CreateUserError::Other(e) => ApiError::Internal(e),
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if let Err(e) = payload.validate() {
        warn!(error = %e, "registration rejected");
        return Err(e.into());
    }

    let mut session = state.db.session().await?;

    if User::find_by_username(&mut *session, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already registered");
        return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&mut *session, &payload.username, &hash).await?;
    session.commit().await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: user.username,
            id: user.id,
        }),
    ))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut session = state.db.session().await?;
    let user = authenticate(&mut *session, &form.username, &form.password)
        .await?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;
    session.commit().await?;

    let access_token = state.jwt.sign_access(&user.username)?;

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
