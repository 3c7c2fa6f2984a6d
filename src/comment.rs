use crate::article::models::Article;
use crate::db::schema::{comments, followers, users};
use crate::db::DbConnection;
use crate::profile::Profile;
use crate::types::{created, ApiError, ApiResult, CreatedResult, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{now, serialize_date};
use chrono::NaiveDateTime;
use diesel::insert_into;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Comment {
    pub id: i32,
    pub article_slug: String,
    pub author_id: i32,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView<'r> {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub body: String,
    pub author: Profile<'r>,
}

impl<'r> From<(Comment, Profile<'r>)> for CommentView<'r> {
    fn from(comment_and_profile: (Comment, Profile<'r>)) -> Self {
        let comment = comment_and_profile.0;
        let profile = comment_and_profile.1;
        CommentView {
            id: comment.id,
            author: profile,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
struct NewComment<'a> {
    article_slug: &'a str,
    author_id: i32,
    body: &'a str,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentBody {
    body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    comments: T,
}

impl Validate for CommentContainer<CommentBody> {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        if self.comment.body.trim().is_empty() {
            Err(ValidationError::from("body", "can't be blank"))
        } else {
            Ok(self)
        }
    }
}

/// The author is the requester, so the embedded profile never reports `following`.
pub fn add(
    connection: &mut SqliteConnection,
    author: &User,
    slug: &str,
    body: &str,
) -> Result<CommentView<'static>, ApiError> {
    if !Article::exists(slug, connection)? {
        return Err(ApiError::NotFound);
    }

    let created = now();
    let new_comment = NewComment {
        article_slug: slug,
        author_id: author.id,
        body,
        created_at: created,
        updated_at: created,
    };
    let comment = insert_into(comments::table)
        .values(&new_comment)
        .returning(Comment::as_returning())
        .get_result::<Comment>(connection)?;

    let profile = author.clone().into_profile(false);
    Ok(CommentView::from((comment, profile)))
}

/// Oldest first. `following` on each author is relative to `viewer`.
pub fn list(
    connection: &mut SqliteConnection,
    slug: &str,
    viewer: Option<i32>,
) -> Result<Vec<CommentView<'static>>, ApiError> {
    if !Article::exists(slug, connection)? {
        return Err(ApiError::NotFound);
    }

    let data = comments::table
        .inner_join(users::table)
        .filter(comments::article_slug.eq(slug))
        .order(comments::id.asc())
        .select((Comment::as_select(), User::as_select()))
        .load::<(Comment, User)>(connection)?;

    let followed = match viewer {
        Some(viewer) => {
            let authors = data.iter().map(|(_, author)| author.id).collect::<Vec<i32>>();
            followers::table
                .filter(followers::follower_id.eq(viewer))
                .filter(followers::followed_id.eq_any(authors))
                .select(followers::followed_id)
                .load::<i32>(connection)?
                .into_iter()
                .collect::<HashSet<_>>()
        }
        None => HashSet::new(),
    };

    let comments = data
        .into_iter()
        .map(|(comment, author)| {
            let following = viewer != Some(author.id) && followed.contains(&author.id);
            CommentView::from((comment, author.into_profile(following)))
        })
        .collect();
    Ok(comments)
}

/// Deletes only the requester's own comment on `slug`; anything else is a silent no-op.
pub fn delete(
    connection: &mut SqliteConnection,
    user_id: i32,
    slug: &str,
    comment_id: i32,
) -> Result<(), ApiError> {
    let removed = diesel::delete(
        comments::table
            .filter(comments::id.eq(comment_id))
            .filter(comments::article_slug.eq(slug))
            .filter(comments::author_id.eq(user_id)),
    )
    .execute(connection)?;
    tracing::debug!(comment_id, removed, "comment delete");
    Ok(())
}

#[post("/<slug>/comments", data = "<details>", format = "json")]
pub fn add_comment(
    user: CurrentUser,
    mut conn: DbConnection,
    slug: &str,
    details: Json<CommentContainer<CommentBody>>,
) -> CreatedResult<CommentContainer<CommentView<'static>>> {
    let user = user?;
    let details = details.validate()?.into_inner();
    let comment = add(&mut conn, &user, slug, &details.comment.body)?;
    Ok(created(CommentContainer { comment }))
}

#[get("/<slug>/comments")]
pub fn list_comments(
    user: Option<User>,
    mut conn: DbConnection,
    slug: &str,
) -> ApiResult<CommentsContainer<Vec<CommentView<'static>>>> {
    let viewer = user.map(|user| user.id);
    let comments = list(&mut conn, slug, viewer)?;
    Ok(Json(CommentsContainer { comments }))
}

#[delete("/<slug>/comments/<id>")]
pub fn delete_comment(
    user: CurrentUser,
    mut conn: DbConnection,
    slug: &str,
    id: i32,
) -> Result<Status, ApiError> {
    let user = user?;
    delete(&mut conn, user.id, slug, id)?;
    Ok(Status::NoContent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::models::{create, ArticleDraft};
    use crate::db::test_connection;
    use crate::profile::follow;
    use crate::users::models::insert_test_user;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn article(connection: &mut SqliteConnection, author: &User, title: &str) -> String {
        create(
            connection,
            author.id,
            ArticleDraft {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .slug
    }

    #[test]
    fn added_comments_embed_the_author() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let slug = article(&mut conn, &alice, "Talk");

        let comment = add(&mut conn, &alice, &slug, "hello").unwrap();
        assert_eq!(comment.body, "hello");
        assert_eq!(comment.author.username, "alice");
        assert!(!comment.author.following);
        assert_eq!(comment.created_at, comment.updated_at);
    }

    #[test]
    fn commenting_on_a_missing_article_is_not_found() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");

        assert_matches!(add(&mut conn, &alice, "missing", "hello"), Err(ApiError::NotFound));
        assert_matches!(list(&mut conn, "missing", None), Err(ApiError::NotFound));
    }

    #[test]
    fn listed_comments_keep_insertion_order_and_follow_state() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        let carol = insert_test_user(&mut conn, "carol");
        let slug = article(&mut conn, &alice, "Thread");
        add(&mut conn, &bob, &slug, "one").unwrap();
        add(&mut conn, &carol, &slug, "two").unwrap();
        add(&mut conn, &alice, &slug, "three").unwrap();
        follow(&mut conn, alice.id, "bob").unwrap();

        let as_alice = list(&mut conn, &slug, Some(alice.id)).unwrap();
        let seen = as_alice
            .iter()
            .map(|c| (c.body.as_str(), &*c.author.username, c.author.following))
            .collect::<Vec<_>>();
        assert_eq!(
            seen,
            vec![("one", "bob", true), ("two", "carol", false), ("three", "alice", false)]
        );

        let anonymous = list(&mut conn, &slug, None).unwrap();
        assert!(anonymous.iter().all(|c| !c.author.following));
    }

    #[test]
    fn only_the_author_can_delete_and_misses_are_silent() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        let slug = article(&mut conn, &alice, "Moderation");
        let other = article(&mut conn, &alice, "Elsewhere");
        let comment = add(&mut conn, &bob, &slug, "mine").unwrap();

        delete(&mut conn, alice.id, &slug, comment.id).unwrap();
        delete(&mut conn, bob.id, &other, comment.id).unwrap();
        assert_eq!(list(&mut conn, &slug, None).unwrap().len(), 1);

        delete(&mut conn, bob.id, &slug, comment.id).unwrap();
        assert!(list(&mut conn, &slug, None).unwrap().is_empty());

        // Deleting again is still fine.
        delete(&mut conn, bob.id, &slug, comment.id).unwrap();
    }
}
