use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreatePatientRequest, ListParams, PatientPage, UpdatePatientRequest},
    repo_types::Patient,
};
use crate::{
    auth::extractors::CurrentUser,
    error::ApiError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

const NOT_FOUND: &str = "Patient not found";

pub fn patient_routes() -> Router<AppState> {
    Router::new()
        .route("/patients", post(create_patient).get(list_patients))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}

#[instrument(skip(state, user, req))]
pub async fn create_patient(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let new = req.validate().map_err(|e| {
        warn!(error = %e, "patient rejected");
        e
    })?;

    let mut session = state.db.session().await?;
    let patient = Patient::create(&mut *session, &new).await?;
    session.commit().await?;

    info!(patient_id = patient.id, by = %user.username, "patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

#[instrument(skip(state, _user, params))]
pub async fn list_patients(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<PatientPage>, ApiError> {
    let (filter, offset, limit) = params.validate()?;

    let mut session = state.db.session().await?;
    let (patients, total) = Patient::list(&mut *session, &filter, offset, limit).await?;
    session.commit().await?;

    Ok(Json(PatientPage::new(patients, total, offset, limit)))
}

#[instrument(skip(state, _user))]
pub async fn get_patient(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Patient>, ApiError> {
    let mut session = state.db.session().await?;
    let patient = Patient::find(&mut *session, id).await?;
    session.commit().await?;

    patient.map(Json).ok_or(ApiError::NotFound(NOT_FOUND))
}

#[instrument(skip(state, user, req))]
pub async fn update_patient(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let changes = req.validate()?;

    let mut session = state.db.session().await?;
    let Some(patient) = Patient::update(&mut *session, id, &changes).await? else {
        return Err(ApiError::NotFound(NOT_FOUND));
    };
    session.commit().await?;

    info!(patient_id = id, by = %user.username, "patient updated");
    Ok(Json(patient))
}

#[instrument(skip(state, user))]
pub async fn delete_patient(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let mut session = state.db.session().await?;
    let deleted = Patient::delete(&mut *session, id).await?;
    session.commit().await?;

    if !deleted {
        return Err(ApiError::NotFound(NOT_FOUND));
    }
    info!(patient_id = id, by = %user.username, "patient deleted");
    Ok(StatusCode::NO_CONTENT)
}
