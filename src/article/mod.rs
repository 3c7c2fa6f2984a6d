use crate::db::DbConnection;
use crate::types::*;
use crate::users::models::User;
use crate::users::CurrentUser;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

pub mod models;
pub mod slug;

use self::models::{ArticleDraft, ArticleFilter, ArticleList, ArticleView, Page};

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    article: ArticleView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetails {
    title: String,
    description: Option<String>,
    body: Option<String>,
    #[serde(default)]
    tag_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    article: ArticleDetails,
}

impl Validate for CreateArticle {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.article.title.trim().is_empty() {
            error.add_error("title", "can't be blank");
        }
        error.or_ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetails {
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticle {
    article: UpdateDetails,
}

#[get("/?<author>&<tag>&<favorited>&<limit>&<offset>")]
pub fn list(
    current_user: Option<User>,
    mut connection: DbConnection,
    author: Option<String>,
    tag: Option<String>,
    favorited: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<ArticleList> {
    let filter = ArticleFilter {
        author,
        tag,
        favorited_by: favorited,
    };
    let viewer = current_user.map(|user| user.id);
    let articles = models::list(&mut connection, &filter, Page::new(limit, offset), viewer)?;
    Ok(Json(articles))
}

#[get("/feed")]
pub fn feed(current_user: CurrentUser, mut connection: DbConnection) -> ApiResult<ArticleList> {
    let user = current_user?;
    Ok(Json(models::feed(&mut connection, user.id)?))
}

#[get("/<slug>")]
pub fn get(
    current_user: Option<User>,
    mut connection: DbConnection,
    slug: &str,
) -> ApiResult<ArticleResponse> {
    let viewer = current_user.map(|user| user.id);
    let article = models::load(&mut connection, slug, viewer)?;
    Ok(Json(ArticleResponse { article }))
}

#[post("/", format = "json", data = "<new_article>")]
pub fn create(
    current_user: CurrentUser,
    mut connection: DbConnection,
    new_article: Json<CreateArticle>,
) -> CreatedResult<ArticleResponse> {
    let user = current_user?;
    let details = new_article.validate()?.into_inner().article;
    let draft = ArticleDraft {
        title: details.title,
        body: details.body,
        description: details.description,
        tag_list: details.tag_list,
    };

    let article = models::create(&mut connection, user.id, draft)?;
    Ok(created(ArticleResponse { article }))
}

#[put("/<slug>", format = "json", data = "<changes>")]
pub fn update(
    current_user: CurrentUser,
    mut connection: DbConnection,
    slug: &str,
    changes: Json<UpdateArticle>,
) -> ApiResult<ArticleResponse> {
    let user = current_user?;
    let body = changes.into_inner().article.body;
    let article = models::update(&mut connection, user.id, slug, body)?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/<slug>")]
pub fn delete(
    current_user: CurrentUser,
    mut connection: DbConnection,
    slug: &str,
) -> Result<Status, ApiError> {
    let user = current_user?;
    models::delete(&mut connection, user.id, slug)?;
    Ok(Status::NoContent)
}

#[post("/<slug>/favorite")]
pub fn favorite(
    current_user: CurrentUser,
    mut connection: DbConnection,
    slug: &str,
) -> ApiResult<ArticleResponse> {
    let user = current_user?;
    let article = models::favorite(&mut connection, user.id, slug)?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/<slug>/favorite")]
pub fn unfavorite(
    current_user: CurrentUser,
    mut connection: DbConnection,
    slug: &str,
) -> ApiResult<ArticleResponse> {
    let user = current_user?;
    let article = models::unfavorite(&mut connection, user.id, slug)?;
    Ok(Json(ArticleResponse { article }))
}
