//! Request-body extraction with `validator` checks.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};

/// JSON body that is deserialized and then validated.
///
/// Malformed JSON is rejected with 400 `BAD_REQUEST`; a body that parses but
/// fails validation is rejected with 400 `VALIDATION_ERROR`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Parse and validate an optional JSON body. An empty body yields `None`.
pub fn optional_json<T>(body: &Bytes) -> AppResult<Option<T>>
where
    T: DeserializeOwned + Validate,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: T = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;
    value.validate()?;
    Ok(Some(value))
}

/// One-time codes are exactly six ASCII digits.
pub fn validate_otp(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("otp").with_message("must be exactly 6 digits".into()))
    }
}
