use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::models::contact::{ContactForm, ContactResponse};
use crate::services::ContactService;
use crate::utils::error::ApiError;

/// POST {prefix}/contact
///
/// Malformed input is a 422. Once the form is valid the answer is always 200,
/// with `success=false` only when the submission could not be stored.
pub async fn contact_handler(
    State(service): State<Arc<ContactService>>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let Json(form) = payload?;
    form.validate()?;

    Ok(Json(service.submit(form).await))
}
