diesel::table! {
    articles (slug) {
        slug -> Text,
        title -> Text,
        body -> Nullable<Text>,
        description -> Nullable<Text>,
        created_by -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    articles_tags (id) {
        id -> Integer,
        article_slug -> Text,
        tag -> Text,
    }
}

diesel::table! {
    comments (id) {
        id -> Integer,
        article_slug -> Text,
        author_id -> Integer,
        body -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    favorites (user_id, article_slug) {
        user_id -> Integer,
        article_slug -> Text,
    }
}

diesel::table! {
    followers (follower_id, followed_id) {
        follower_id -> Integer,
        followed_id -> Integer,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password -> Text,
        bio -> Nullable<Text>,
        image -> Nullable<Text>,
        token -> Nullable<Text>,
    }
}

diesel::joinable!(articles -> users (created_by));
diesel::joinable!(articles_tags -> articles (article_slug));
diesel::joinable!(comments -> articles (article_slug));
diesel::joinable!(comments -> users (author_id));
diesel::joinable!(favorites -> articles (article_slug));
diesel::joinable!(favorites -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    articles,
    articles_tags,
    comments,
    favorites,
    followers,
    users,
);
