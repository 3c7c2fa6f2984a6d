use super::slug::slugify_title;
use crate::db::schema::{articles, articles_tags, comments, favorites, users};
use crate::types::ApiError;
use crate::utils::{now, serialize_date};
use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::select;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = articles, primary_key(slug))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Article {
    pub slug: String,
    pub title: String,
    pub body: Option<String>,
    pub description: Option<String>,
    pub created_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = articles_tags)]
struct NewTag<'a> {
    article_slug: &'a str,
    tag: &'a str,
}

/// The public article. `author` is the creator's username only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub body: Option<String>,
    pub description: Option<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub author: String,
    pub favorited: bool,
    pub favorites_count: i64,
    pub tag_list: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList {
    pub articles: Vec<ArticleView>,
    pub articles_count: i64,
}

#[derive(Debug, Default)]
pub struct ArticleFilter {
    pub author: Option<String>,
    pub tag: Option<String>,
    pub favorited_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Page {
        Page {
            limit: limit.unwrap_or(DEFAULT_LIMIT).max(0),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Page {
        Page::new(None, None)
    }
}

/// What a caller supplies to create an article.
#[derive(Debug, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub body: Option<String>,
    pub description: Option<String>,
    pub tag_list: Vec<String>,
}

impl Article {
    pub fn exists(slug: &str, connection: &mut SqliteConnection) -> QueryResult<bool> {
        select(exists(articles::table.find(slug))).get_result::<bool>(connection)
    }

    pub fn load_by_slug(slug: &str, connection: &mut SqliteConnection) -> Result<Article, ApiError> {
        articles::table
            .find(slug)
            .select(Article::as_select())
            .get_result::<Article>(connection)
            .map_err(|e| e.into())
    }
}

/// Joins article rows (with their author's username) to their tags and
/// favorites. `favorited` is only ever true for `viewer`.
fn assemble(
    connection: &mut SqliteConnection,
    rows: Vec<(Article, String)>,
    viewer: Option<i32>,
) -> QueryResult<Vec<ArticleView>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let slugs = rows
        .iter()
        .map(|(article, _)| article.slug.as_str())
        .collect::<Vec<_>>();

    let tags = articles_tags::table
        .filter(articles_tags::article_slug.eq_any(&slugs))
        .order(articles_tags::id.asc())
        .select((articles_tags::article_slug, articles_tags::tag))
        .load::<(String, String)>(connection)?;
    let mut tags_by_slug: HashMap<String, Vec<String>> = HashMap::new();
    for (slug, tag) in tags {
        tags_by_slug.entry(slug).or_default().push(tag);
    }

    let favorite_rows = favorites::table
        .filter(favorites::article_slug.eq_any(&slugs))
        .select((favorites::article_slug, favorites::user_id))
        .load::<(String, i32)>(connection)?;
    let mut counts: HashMap<String, i64> = HashMap::new();
    let mut favorited_by_viewer = HashSet::new();
    for (slug, user_id) in favorite_rows {
        if viewer == Some(user_id) {
            favorited_by_viewer.insert(slug.clone());
        }
        *counts.entry(slug).or_insert(0) += 1;
    }

    let views = rows
        .into_iter()
        .map(|(article, author)| ArticleView {
            favorited: favorited_by_viewer.contains(&article.slug),
            favorites_count: counts.get(&article.slug).cloned().unwrap_or(0),
            tag_list: tags_by_slug.remove(&article.slug).unwrap_or_default(),
            slug: article.slug,
            title: article.title,
            body: article.body,
            description: article.description,
            created_at: article.created_at,
            updated_at: article.updated_at,
            author,
        })
        .collect();
    Ok(views)
}

pub fn load(
    connection: &mut SqliteConnection,
    slug: &str,
    viewer: Option<i32>,
) -> Result<ArticleView, ApiError> {
    let row = articles::table
        .inner_join(users::table)
        .filter(articles::slug.eq(slug))
        .select((Article::as_select(), users::username))
        .first::<(Article, String)>(connection)?;
    assemble(connection, vec![row], viewer)?
        .pop()
        .ok_or(ApiError::NotFound)
}

/// Filters are ANDed; `articles_count` is taken before paging. Newest first.
pub fn list(
    connection: &mut SqliteConnection,
    filter: &ArticleFilter,
    page: Page,
    viewer: Option<i32>,
) -> Result<ArticleList, ApiError> {
    let tagged = match &filter.tag {
        Some(tag) => {
            let slugs = articles_tags::table
                .filter(articles_tags::tag.eq(tag))
                .select(articles_tags::article_slug)
                .load::<String>(connection)?;
            if slugs.is_empty() {
                return Ok(ArticleList::default());
            }
            Some(slugs)
        }
        None => None,
    };

    let favorited = match &filter.favorited_by {
        Some(name) => {
            let fan = users::table
                .filter(users::username.eq(name))
                .select(users::id)
                .first::<i32>(connection)
                .optional()?;
            let slugs = match fan {
                Some(fan) => favorites::table
                    .filter(favorites::user_id.eq(fan))
                    .select(favorites::article_slug)
                    .load::<String>(connection)?,
                None => Vec::new(),
            };
            if slugs.is_empty() {
                return Ok(ArticleList::default());
            }
            Some(slugs)
        }
        None => None,
    };

    let matching = || {
        let mut query = articles::table
            .inner_join(users::table)
            .into_boxed::<Sqlite>();
        if let Some(author) = &filter.author {
            query = query.filter(users::username.eq(author));
        }
        if let Some(slugs) = &tagged {
            query = query.filter(articles::slug.eq_any(slugs));
        }
        if let Some(slugs) = &favorited {
            query = query.filter(articles::slug.eq_any(slugs));
        }
        query
    };

    let articles_count = matching().count().get_result::<i64>(connection)?;
    let rows = matching()
        .select((Article::as_select(), users::username))
        .order(articles::created_at.desc())
        .limit(page.limit)
        .offset(page.offset)
        .load::<(Article, String)>(connection)?;
    let articles = assemble(connection, rows, viewer)?;

    Ok(ArticleList {
        articles,
        articles_count,
    })
}

/// Every article created by `owner`, newest first.
pub fn feed(connection: &mut SqliteConnection, owner: i32) -> Result<ArticleList, ApiError> {
    let rows = articles::table
        .inner_join(users::table)
        .filter(articles::created_by.eq(owner))
        .order(articles::created_at.desc())
        .select((Article::as_select(), users::username))
        .load::<(Article, String)>(connection)?;
    let articles = assemble(connection, rows, Some(owner))?;

    Ok(ArticleList {
        articles_count: articles.len() as i64,
        articles,
    })
}

/// Inserts the article and its tags as one unit. A taken slug is
/// `DuplicateSlug` and leaves nothing behind.
pub fn create(
    connection: &mut SqliteConnection,
    author_id: i32,
    draft: ArticleDraft,
) -> Result<ArticleView, ApiError> {
    let slug = slugify_title(&draft.title)?;
    let created = now();
    let article = Article {
        slug,
        title: draft.title,
        body: draft.body,
        description: draft.description,
        created_by: author_id,
        created_at: created,
        updated_at: created,
    };

    let mut tags: Vec<&str> = Vec::new();
    for tag in draft.tag_list.iter().map(|tag| tag.trim()) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    connection.transaction::<_, ApiError, _>(|connection| {
        diesel::insert_into(articles::table)
            .values(&article)
            .execute(connection)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    ApiError::DuplicateSlug
                }
                other => other.into(),
            })?;

        if !tags.is_empty() {
            let rows = tags
                .iter()
                .map(|&tag| NewTag {
                    article_slug: &article.slug,
                    tag,
                })
                .collect::<Vec<_>>();
            diesel::insert_into(articles_tags::table)
                .values(&rows)
                .execute(connection)?;
        }
        Ok(())
    })?;

    tracing::info!(slug = %article.slug, author_id, "created article");
    load(connection, &article.slug, Some(author_id))
}

/// Only the body is mutable. `updated_at` moves only when it changes.
pub fn update(
    connection: &mut SqliteConnection,
    user_id: i32,
    slug: &str,
    body: Option<String>,
) -> Result<ArticleView, ApiError> {
    let article = Article::load_by_slug(slug, connection)?;
    if article.created_by != user_id {
        return Err(ApiError::Unauthorized);
    }

    if let Some(body) = body {
        diesel::update(
            articles::table
                .filter(articles::slug.eq(slug))
                .filter(articles::created_by.eq(user_id)),
        )
        .set((articles::body.eq(body), articles::updated_at.eq(now())))
        .execute(connection)?;
    }
    load(connection, slug, Some(user_id))
}

/// Removes the article with its tags, favorites and comments, all or nothing.
pub fn delete(connection: &mut SqliteConnection, user_id: i32, slug: &str) -> Result<(), ApiError> {
    connection.transaction::<_, ApiError, _>(|connection| {
        let article = Article::load_by_slug(slug, connection)?;
        if article.created_by != user_id {
            return Err(ApiError::Unauthorized);
        }

        diesel::delete(articles_tags::table.filter(articles_tags::article_slug.eq(slug)))
            .execute(connection)?;
        diesel::delete(favorites::table.filter(favorites::article_slug.eq(slug)))
            .execute(connection)?;
        diesel::delete(comments::table.filter(comments::article_slug.eq(slug)))
            .execute(connection)?;
        diesel::delete(&article).execute(connection)?;
        Ok(())
    })?;

    tracing::info!(slug, user_id, "deleted article");
    Ok(())
}

pub fn favorite(
    connection: &mut SqliteConnection,
    user_id: i32,
    slug: &str,
) -> Result<ArticleView, ApiError> {
    if !Article::exists(slug, connection)? {
        return Err(ApiError::NotFound);
    }
    diesel::insert_or_ignore_into(favorites::table)
        .values((
            favorites::user_id.eq(user_id),
            favorites::article_slug.eq(slug),
        ))
        .execute(connection)?;
    load(connection, slug, Some(user_id))
}

pub fn unfavorite(
    connection: &mut SqliteConnection,
    user_id: i32,
    slug: &str,
) -> Result<ArticleView, ApiError> {
    if !Article::exists(slug, connection)? {
        return Err(ApiError::NotFound);
    }
    diesel::delete(
        favorites::table
            .filter(favorites::user_id.eq(user_id))
            .filter(favorites::article_slug.eq(slug)),
    )
    .execute(connection)?;
    load(connection, slug, Some(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::users::models::insert_test_user;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn draft(title: &str, tags: &[&str]) -> ArticleDraft {
        ArticleDraft {
            title: title.to_string(),
            body: Some("body".to_string()),
            description: Some("description".to_string()),
            tag_list: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    fn count_favorites(connection: &mut SqliteConnection, slug: &str) -> i64 {
        favorites::table
            .filter(favorites::article_slug.eq(slug))
            .count()
            .get_result(connection)
            .unwrap()
    }

    #[test]
    fn created_articles_start_unfavorited() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");

        let article = create(&mut conn, alice.id, draft("Star Wars: A New Hope", &["films", "space"]))
            .unwrap();

        assert_eq!(article.slug, "star-wars-a-new-hope");
        assert_eq!(article.author, "alice");
        assert_eq!(article.favorited, false);
        assert_eq!(article.favorites_count, 0);
        assert_eq!(article.tag_list, vec!["films", "space"]);
        assert_eq!(article.created_at, article.updated_at);
    }

    #[test]
    fn duplicate_tags_collapse_in_first_seen_order() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");

        let article = create(&mut conn, alice.id, draft("Tags", &["b", "a", "b", " ", "c"])).unwrap();
        assert_eq!(article.tag_list, vec!["b", "a", "c"]);
    }

    #[test]
    fn a_colliding_slug_is_rejected_without_partial_rows() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        create(&mut conn, alice.id, draft("Same title", &["first"])).unwrap();

        let second = create(&mut conn, alice.id, draft("Same  Title!", &["second"]));
        assert_matches!(second, Err(ApiError::DuplicateSlug));

        let tags = articles_tags::table
            .filter(articles_tags::article_slug.eq("same-title"))
            .select(articles_tags::tag)
            .load::<String>(&mut conn)
            .unwrap();
        assert_eq!(tags, vec!["first"]);
        let count = articles::table.count().get_result::<i64>(&mut conn).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn favoriting_is_idempotent() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        let slug = create(&mut conn, alice.id, draft("Favorites", &[])).unwrap().slug;

        let first = favorite(&mut conn, bob.id, &slug).unwrap();
        let second = favorite(&mut conn, bob.id, &slug).unwrap();
        assert_eq!(first.favorites_count, 1);
        assert_eq!(second.favorites_count, 1);
        assert!(second.favorited);
        assert_eq!(count_favorites(&mut conn, &slug), 1);

        // The count is global, `favorited` belongs to the viewer.
        let as_alice = load(&mut conn, &slug, Some(alice.id)).unwrap();
        assert_eq!(as_alice.favorites_count, 1);
        assert!(!as_alice.favorited);
        let anonymous = load(&mut conn, &slug, None).unwrap();
        assert!(!anonymous.favorited);
    }

    #[test]
    fn unfavoriting_something_never_favorited_is_a_no_op() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let slug = create(&mut conn, alice.id, draft("Never liked", &[])).unwrap().slug;

        let article = unfavorite(&mut conn, alice.id, &slug).unwrap();
        assert!(!article.favorited);
        assert_eq!(article.favorites_count, 0);
    }

    #[test]
    fn favoriting_a_missing_article_is_not_found() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");

        assert_matches!(favorite(&mut conn, alice.id, "missing"), Err(ApiError::NotFound));
        assert_matches!(unfavorite(&mut conn, alice.id, "missing"), Err(ApiError::NotFound));
        assert_matches!(load(&mut conn, "missing", None), Err(ApiError::NotFound));
    }

    #[test]
    fn only_the_creator_may_update_or_delete() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        let slug = create(&mut conn, alice.id, draft("Owned", &[])).unwrap().slug;

        assert_matches!(
            update(&mut conn, bob.id, &slug, Some("hijacked".into())),
            Err(ApiError::Unauthorized)
        );
        assert_matches!(delete(&mut conn, bob.id, &slug), Err(ApiError::Unauthorized));
        assert_matches!(
            update(&mut conn, alice.id, "missing", Some("x".into())),
            Err(ApiError::NotFound)
        );

        let article = load(&mut conn, &slug, None).unwrap();
        assert_eq!(article.body.as_deref(), Some("body"));
    }

    #[test]
    fn updating_the_body_refreshes_updated_at() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let created = create(&mut conn, alice.id, draft("Edits", &[])).unwrap();
        let earlier = created.created_at - Duration::seconds(10);
        diesel::update(articles::table.find(&created.slug))
            .set((articles::created_at.eq(earlier), articles::updated_at.eq(earlier)))
            .execute(&mut conn)
            .unwrap();

        let updated = update(&mut conn, alice.id, &created.slug, Some("new body".into())).unwrap();
        assert_eq!(updated.body.as_deref(), Some("new body"));
        assert!(updated.updated_at > updated.created_at);

        // Favoriting is not a content update.
        let favorited = favorite(&mut conn, alice.id, &created.slug).unwrap();
        assert_eq!(favorited.updated_at, updated.updated_at);
    }

    #[test]
    fn deleting_removes_tags_favorites_and_comments() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        let slug = create(&mut conn, alice.id, draft("Doomed", &["x", "y"])).unwrap().slug;
        favorite(&mut conn, bob.id, &slug).unwrap();
        crate::comment::add(&mut conn, &bob, &slug, "first!").unwrap();

        delete(&mut conn, alice.id, &slug).unwrap();

        assert!(!Article::exists(&slug, &mut conn).unwrap());
        let tags = articles_tags::table
            .filter(articles_tags::article_slug.eq(&slug))
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap();
        assert_eq!(tags, 0);
        assert_eq!(count_favorites(&mut conn, &slug), 0);
        let comment_rows = comments::table
            .filter(comments::article_slug.eq(&slug))
            .count()
            .get_result::<i64>(&mut conn)
            .unwrap();
        assert_eq!(comment_rows, 0);
    }

    #[test]
    fn lists_filter_count_and_page() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        create(&mut conn, alice.id, draft("Alpha", &["rust"])).unwrap();
        create(&mut conn, alice.id, draft("Beta", &["go"])).unwrap();
        create(&mut conn, bob.id, draft("Gamma", &["rust"])).unwrap();
        favorite(&mut conn, bob.id, "alpha").unwrap();

        let all = list(&mut conn, &ArticleFilter::default(), Page::default(), None).unwrap();
        assert_eq!(all.articles_count, 3);
        assert_eq!(all.articles.len(), 3);

        let by_alice = ArticleFilter {
            author: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(list(&mut conn, &by_alice, Page::default(), None).unwrap().articles_count, 2);

        let rust_by_alice = ArticleFilter {
            author: Some("alice".into()),
            tag: Some("rust".into()),
            ..Default::default()
        };
        let found = list(&mut conn, &rust_by_alice, Page::default(), None).unwrap();
        assert_eq!(found.articles_count, 1);
        assert_eq!(found.articles[0].slug, "alpha");

        let liked_by_bob = ArticleFilter {
            favorited_by: Some("bob".into()),
            ..Default::default()
        };
        let liked = list(&mut conn, &liked_by_bob, Page::default(), Some(bob.id)).unwrap();
        assert_eq!(liked.articles_count, 1);
        assert!(liked.articles[0].favorited);

        let paged = list(&mut conn, &ArticleFilter::default(), Page::new(Some(1), Some(1)), None)
            .unwrap();
        assert_eq!(paged.articles_count, 3);
        assert_eq!(paged.articles.len(), 1);
    }

    #[test]
    fn unknown_filter_values_give_empty_lists() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        create(&mut conn, alice.id, draft("Alpha", &["rust"])).unwrap();

        for filter in vec![
            ArticleFilter {
                author: Some("nobody".into()),
                ..Default::default()
            },
            ArticleFilter {
                tag: Some("cobol".into()),
                ..Default::default()
            },
            ArticleFilter {
                favorited_by: Some("nobody".into()),
                ..Default::default()
            },
            ArticleFilter {
                favorited_by: Some("alice".into()),
                ..Default::default()
            },
        ] {
            let result = list(&mut conn, &filter, Page::default(), None).unwrap();
            assert_eq!(result.articles_count, 0, "{:?}", filter);
            assert!(result.articles.is_empty());
        }
    }

    #[test]
    fn the_feed_is_newest_first() {
        let mut conn = test_connection();
        let alice = insert_test_user(&mut conn, "alice");
        let bob = insert_test_user(&mut conn, "bob");
        let first = create(&mut conn, alice.id, draft("First post", &[])).unwrap();
        create(&mut conn, alice.id, draft("Second post", &[])).unwrap();
        create(&mut conn, bob.id, draft("Not mine", &[])).unwrap();
        let earlier = first.created_at - Duration::minutes(5);
        diesel::update(articles::table.find(&first.slug))
            .set(articles::created_at.eq(earlier))
            .execute(&mut conn)
            .unwrap();

        let feed = feed(&mut conn, alice.id).unwrap();
        let slugs = feed
            .articles
            .iter()
            .map(|article| article.slug.as_str())
            .collect::<Vec<_>>();
        assert_eq!(slugs, vec!["second-post", "first-post"]);
        assert_eq!(feed.articles_count, 2);
    }

    #[test]
    fn negative_paging_is_clamped() {
        assert_eq!(Page::new(Some(-5), Some(-1)), Page { limit: 0, offset: 0 });
        assert_eq!(Page::default(), Page { limit: DEFAULT_LIMIT, offset: 0 });
    }
}
