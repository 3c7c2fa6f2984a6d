use crate::db::schema::users;
use crate::profile::Profile;
use crate::types::ApiError;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub token: Option<String>,
}

/// The `{user}` body: everything but the id and the password hash.
#[derive(Debug, Serialize)]
pub struct UserView<'a> {
    pub bio: Option<&'a str>,
    pub email: &'a str,
    pub image: Option<&'a str>,
    pub token: Option<&'a str>,
    pub username: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    jti: String,
}

impl User {
    pub fn make_password(password: &str, cost: u32) -> Result<String, ApiError> {
        bcrypt::hash(password, cost).map_err(|_| ApiError::Internal)
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        bcrypt::verify(password_to_verify, &self.password).map_err(|_| ApiError::Internal)
    }

    fn issue_token(&self, secret: &str) -> Result<String, ApiError> {
        let claims = Claims {
            sub: self.id.to_string(),
            iat: chrono::Utc::now().timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|_| ApiError::Internal)
    }

    /// Mints a fresh token and stores it, replacing whatever session came before.
    pub fn rotate_token(
        &mut self,
        secret: &str,
        connection: &mut SqliteConnection,
    ) -> Result<(), ApiError> {
        let token = self.issue_token(secret)?;
        diesel::update(&*self)
            .set(users::token.eq(&token))
            .execute(connection)?;
        self.token = Some(token);
        Ok(())
    }

    pub fn view(&self) -> UserView<'_> {
        UserView {
            bio: self.bio.as_deref(),
            email: &self.email,
            image: self.image.as_deref(),
            token: self.token.as_deref(),
            username: &self.username,
        }
    }

    pub fn into_profile(self, following: bool) -> Profile<'static> {
        Profile {
            username: Cow::Owned(self.username),
            bio: self.bio.map(Cow::Owned),
            image: self.image.map(Cow::Owned),
            following,
        }
    }

    /// Resolves a bearer token by literal equality with the stored one.
    /// Empty tokens never reach the store.
    pub fn load_from_token(
        bearer: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Option<User>, ApiError> {
        use crate::db::schema::users::dsl::*;

        if bearer.is_empty() {
            return Ok(None);
        }

        users
            .filter(token.eq(bearer))
            .select(User::as_select())
            .first::<User>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn load_by_id(user_id: i32, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name: &str, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;
        users
            .filter(username.eq(name))
            .select(User::as_select())
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_email(
        address: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Option<User>, ApiError> {
        use crate::db::schema::users::dsl::*;
        users
            .filter(email.eq(address))
            .select(User::as_select())
            .first::<User>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    /// Writes `changes` and returns the stored row. The token is left alone.
    pub fn apply(
        self,
        changes: &UserChanges,
        connection: &mut SqliteConnection,
    ) -> Result<User, ApiError> {
        if changes.is_empty() {
            return Ok(self);
        }
        diesel::update(&self).set(changes).execute(connection)?;
        User::load_by_id(self.id, connection)
    }

    pub fn register(
        new_user: &NewUser<'_>,
        connection: &mut SqliteConnection,
    ) -> Result<User, ApiError> {
        diesel::insert_into(users::table)
            .values(new_user)
            .returning(User::as_returning())
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.bio.is_none()
            && self.image.is_none()
    }
}

#[cfg(test)]
pub(crate) fn insert_test_user(connection: &mut SqliteConnection, name: &str) -> User {
    let mut user = User::register(
        &NewUser {
            username: name,
            email: &format!("{}@test.com", name),
            password: "not-a-real-hash",
        },
        connection,
    )
    .expect("insert user");
    user.rotate_token("test-secret", connection).expect("token");
    user
}
