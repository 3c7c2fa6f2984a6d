use crate::db::schema::followers;
use crate::db::DbConnection;
use crate::types::*;
use crate::users::models::User;
use crate::users::CurrentUser;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use diesel::sqlite::SqliteConnection;
use rocket::serde::json::Json;
use serde::Serialize;
use std::borrow::Cow;

#[derive(Debug, Serialize)]
pub struct ProfileResponse<'a> {
    profile: Profile<'a>,
}

#[derive(Debug, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Option<Cow<'a, str>>,
    pub following: bool,
}

pub fn is_following(
    connection: &mut SqliteConnection,
    follower: i32,
    followed: i32,
) -> QueryResult<bool> {
    select(exists(
        followers::table
            .filter(followers::follower_id.eq(follower))
            .filter(followers::followed_id.eq(followed)),
    ))
    .get_result::<bool>(connection)
}

/// `following` is false without a viewer, and a user never follows themself.
pub fn load(
    connection: &mut SqliteConnection,
    name: &str,
    viewer: Option<i32>,
) -> Result<Profile<'static>, ApiError> {
    let user = User::load_by_name(name, connection)?;
    let following = match viewer {
        Some(viewer) if viewer != user.id => is_following(connection, viewer, user.id)?,
        _ => false,
    };
    Ok(user.into_profile(following))
}

pub fn follow(
    connection: &mut SqliteConnection,
    follower: i32,
    name: &str,
) -> Result<Profile<'static>, ApiError> {
    let target = User::load_by_name(name, connection)?;
    if target.id == follower {
        return Err(ApiError::SelfFollow);
    }

    diesel::insert_or_ignore_into(followers::table)
        .values((
            followers::follower_id.eq(follower),
            followers::followed_id.eq(target.id),
        ))
        .execute(connection)?;
    Ok(target.into_profile(true))
}

pub fn unfollow(
    connection: &mut SqliteConnection,
    follower: i32,
    name: &str,
) -> Result<Profile<'static>, ApiError> {
    let target = User::load_by_name(name, connection)?;
    diesel::delete(
        followers::table
            .filter(followers::follower_id.eq(follower))
            .filter(followers::followed_id.eq(target.id)),
    )
    .execute(connection)?;
    Ok(target.into_profile(false))
}

#[get("/<name>")]
pub fn profile(
    current_user: Option<User>,
    mut connection: DbConnection,
    name: &str,
) -> ApiResult<ProfileResponse<'static>> {
    let viewer = current_user.map(|user| user.id);
    let profile = load(&mut connection, name, viewer)?;
    Ok(Json(ProfileResponse { profile }))
}

#[post("/<name>/follow")]
pub fn follow_user(
    current_user: CurrentUser,
    mut connection: DbConnection,
    name: &str,
) -> ApiResult<ProfileResponse<'static>> {
    let current = current_user?;
    let profile = follow(&mut connection, current.id, name)?;
    Ok(Json(ProfileResponse { profile }))
}

#[delete("/<name>/follow")]
pub fn unfollow_user(
    current_user: CurrentUser,
    mut connection: DbConnection,
    name: &str,
) -> ApiResult<ProfileResponse<'static>> {
    let current = current_user?;
    let profile = unfollow(&mut connection, current.id, name)?;
    Ok(Json(ProfileResponse { profile }))
}
