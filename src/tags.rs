use crate::db::schema::articles_tags;
use crate::db::DbConnection;
use crate::types::ApiResult;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::serde::json::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TagList {
    tags: Vec<String>,
}

/// Every tag attached to at least one article, once each, in lexical order.
pub fn list(connection: &mut SqliteConnection) -> QueryResult<Vec<String>> {
    articles_tags::table
        .select(articles_tags::tag)
        .distinct()
        .order(articles_tags::tag.asc())
        .load::<String>(connection)
}

#[get("/")]
pub fn get_tags(mut connection: DbConnection) -> ApiResult<TagList> {
    let tags = list(&mut connection)?;
    Ok(Json(TagList { tags }))
}
