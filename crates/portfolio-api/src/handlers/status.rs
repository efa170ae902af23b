use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::models::status::{StatusCheck, StatusCheckCreate};
use crate::storage::StatusStore;
use crate::utils::error::ApiError;

pub async fn create_status_check(
    State(store): State<Arc<dyn StatusStore>>,
    payload: Result<Json<StatusCheckCreate>, JsonRejection>,
) -> Result<Json<StatusCheck>, ApiError> {
    let Json(input) = payload?;
    input.validate()?;

    let check = StatusCheck::new(input.client_name);
    store
        .insert(check.clone())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(check))
}

pub async fn list_status_checks(
    State(store): State<Arc<dyn StatusStore>>,
) -> Result<Json<Vec<StatusCheck>>, ApiError> {
    let checks = store
        .list()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(checks))
}
