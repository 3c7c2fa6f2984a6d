use crate::config::Settings;
use crate::db::DbConnection;
use crate::types::{created, ApiError, ApiResult, CreatedResult, Validate, ValidationError};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use serde::Deserialize;

pub mod models;
mod utils;

use self::models::{NewUser, User, UserChanges};
use self::utils::*;

pub type CurrentUser = Result<User, ApiError>;

#[derive(Debug, Deserialize)]
struct RegistrationDetails {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Validate for Registration {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        if let Err(e) = validate_email_re(&self.user.email) {
            errors.merge(e);
        }
        if let Err(e) = validate_username_re(&self.user.username) {
            errors.merge(e);
        }
        if let Err(e) = validate_password(&self.user.password) {
            errors.merge(e);
        }

        errors.or_ok(self)
    }
}

#[post("/", format = "json", data = "<registration>")]
pub fn register(
    mut connection: DbConnection,
    settings: &State<Settings>,
    registration: Json<Registration>,
) -> CreatedResult<Value> {
    let registration = registration.validate()?.into_inner();
    let password = User::make_password(&registration.user.password, settings.bcrypt_cost)?;
    let new_user = NewUser {
        username: &registration.user.username,
        email: &registration.user.email,
        password: &password,
    };

    let user = User::register(&new_user, &mut connection)?;
    tracing::info!(username = %user.username, "registered user");
    Ok(created(json!({ "user": user.view() })))
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.headers().get_one("Authorization").and_then(bearer_token) {
            Some(token) => token,
            None => return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        };

        let mut connection = match DbConnection::from_request(request).await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };

        match User::load_from_token(token, &mut connection) {
            Ok(Some(user)) => {
                tracing::debug!(user_id = user.id, "resolved bearer token");
                Outcome::Success(user)
            }
            Ok(None) => {
                tracing::debug!("bearer token matches no user");
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

#[post("/login", format = "json", data = "<credentials>")]
pub fn login(
    mut connection: DbConnection,
    settings: &State<Settings>,
    credentials: Json<Login>,
) -> CreatedResult<Value> {
    let credentials = credentials.into_inner();
    let mut user = match User::load_by_email(&credentials.user.email, &mut connection)? {
        Some(user) => user,
        None => {
            tracing::warn!("login attempt for unknown email");
            return Err(ApiError::Unauthorized);
        }
    };

    if !user.verify_password(&credentials.user.password)? {
        tracing::warn!(username = %user.username, "login attempt with a bad password");
        return Err(ApiError::Unauthorized);
    }

    user.rotate_token(&settings.jwt_secret, &mut connection)?;
    tracing::info!(username = %user.username, "user logged in");
    Ok(created(json!({ "user": user.view() })))
}

#[get("/user")]
pub fn current(user: CurrentUser) -> ApiResult<Value> {
    let user = user?;
    Ok(Json(json!({ "user": user.view() })))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub user: UpdateUser,
}

#[put("/user", format = "json", data = "<changes>")]
pub fn update(
    current_user: CurrentUser,
    mut connection: DbConnection,
    settings: &State<Settings>,
    changes: Json<Update>,
) -> ApiResult<Value> {
    let user = current_user?;
    let update = changes.into_inner().user;
    let mut error = ValidationError::default();

    if let Some(new_email) = &update.email {
        if let Err(e) = validate_email_re(new_email) {
            error.merge(e);
        }
    }
    if let Some(new_username) = &update.username {
        if let Err(e) = validate_username_re(new_username) {
            error.merge(e);
        }
    }
    if let Some(new_password) = &update.password {
        if let Err(e) = validate_password(new_password) {
            error.merge(e);
        }
    }

    let mut changes = error.or_ok(UserChanges {
        username: update.username,
        email: update.email,
        password: None,
        bio: update.bio,
        image: update.image,
    })?;

    if let Some(new_password) = update.password {
        changes.password = Some(User::make_password(&new_password, settings.bcrypt_cost)?);
    }

    let user = user.apply(&changes, &mut connection)?;
    Ok(Json(json!({ "user": user.view() })))
}
