//! Validated JSON extractor - Combines deserialization with validation.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::errors::AppError;

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON and failed rules both become `400 VALIDATION_ERROR`.
///
/// ```rust,ignore
/// use storefront_api::api::extractors::ValidatedJson;
/// use storefront_api::domain::AddressInput;
///
/// async fn add_address(ValidatedJson(input): ValidatedJson<AddressInput>) {
///     // input.country is exactly two letters here
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;

        value
            .validate()
            .map_err(|e| AppError::validation(format_validation_errors(&e)))?;

        Ok(ValidatedJson(value))
    }
}

/// Join the field messages, nested structs included, sorted for stable output.
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = BTreeSet::new();
    collect_messages(errors, &mut messages);
    messages.into_iter().collect::<Vec<_>>().join(", ")
}

fn collect_messages(errors: &ValidationErrors, out: &mut BTreeSet<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, out),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_messages(nested, out);
                }
            }
        }
    }
}
