mod dto;
pub mod filters;
pub mod handlers;
mod repo;
pub mod repo_types;
pub mod validate;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::patient_routes()
}
