use crate::utils::try_respond;
use diesel::result::Error as DieselError;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, status, Responder};
use rocket::serde::json::{json, Json};
use serde::Serialize;
use std::collections::HashMap;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    Internal,
    Unauthorized,
    NotFound,
    InvalidTitle,
    DuplicateSlug,
    SelfFollow,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        match err {
            DieselError::NotFound => ApiError::NotFound,
            other => ApiError::Diesel(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Same as `ApiResult` but answered with `201 Created`.
pub type CreatedResult<T> = Result<status::Custom<Json<T>>, ApiError>;

pub fn created<T>(body: T) -> status::Custom<Json<T>> {
    status::Custom(Status::Created, Json(body))
}

#[derive(Debug, Serialize, Default)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Ok(value)` when nothing was recorded, the collected errors otherwise.
    pub fn or_ok<T>(self, value: T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::NotFound => Status::NotFound,
            ApiError::DuplicateSlug => Status::Conflict,
            ApiError::InvalidTitle | ApiError::SelfFollow | ApiError::Validation(_) => {
                Status::UnprocessableEntity
            }
            ApiError::Diesel(_) | ApiError::Internal => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = match self {
            ApiError::Validation(error) => json!({ "errors": error }),
            ApiError::Unauthorized => json!({ "errors": { "token": ["is missing or invalid"] } }),
            ApiError::NotFound => json!({ "errors": { "entity": ["not found"] } }),
            ApiError::InvalidTitle => json!({
                "errors": { "title": ["cannot be turned into a slug"] }
            }),
            ApiError::DuplicateSlug => json!({ "errors": { "slug": ["has already been taken"] } }),
            ApiError::SelfFollow => json!({ "errors": { "username": ["cannot follow yourself"] } }),
            ApiError::Diesel(error) => {
                tracing::error!(%error, "storage failure");
                json!({ "errors": { "server": ["internal error"] } })
            }
            ApiError::Internal => {
                tracing::error!("internal failure");
                json!({ "errors": { "server": ["internal error"] } })
            }
        };
        try_respond(req, &body, status)
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self) -> Result<Self, Self::Error> {
        let inner = self.into_inner();
        let validated = inner.validate()?;
        Ok(Json(validated))
    }
}
