#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate rocket;

pub mod article;
pub mod comment;
pub mod config;
pub mod db;
pub mod errors;
pub mod profile;
pub mod tags;
pub mod types;
pub mod users;
pub mod utils;

use crate::config::Settings;
use crate::db::Pool;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Rocket};

#[catch(400)]
fn bad_request(_req: &Request) -> Value {
    json!({ "errors": { "body": ["could not be parsed"] } })
}

#[catch(401)]
fn unauthorized(_req: &Request) -> Value {
    json!({ "errors": { "token": ["is missing or invalid"] } })
}

#[catch(404)]
fn not_found(_req: &Request) -> Value {
    json!({ "errors": { "entity": ["not found"] } })
}

#[catch(422)]
fn unprocessable_entity(_req: &Request) -> Value {
    json!({ "errors": { "body": ["is malformed"] } })
}

#[catch(500)]
fn internal_error(_req: &Request) -> Value {
    json!({ "errors": { "server": ["internal error"] } })
}

/// Builds the application around an already migrated pool.
pub fn rocket(settings: Settings, pool: Pool) -> Rocket<Build> {
    rocket::build()
        .manage(settings)
        .manage(pool)
        .mount("/users", routes![users::register, users::login])
        .mount("/", routes![users::current, users::update])
        .mount(
            "/profiles",
            routes![profile::profile, profile::follow_user, profile::unfollow_user],
        )
        .mount(
            "/articles",
            routes![
                article::list,
                article::feed,
                article::get,
                article::create,
                article::update,
                article::delete,
                article::favorite,
                article::unfavorite,
                comment::add_comment,
                comment::list_comments,
                comment::delete_comment,
            ],
        )
        .mount("/tags", routes![tags::get_tags])
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                unprocessable_entity,
                internal_error
            ],
        )
}
