use axum::{
    Router,
    routing::{get, post},
};

use crate::App;

use super::handlers::{
    counts::{get_comment_counts, get_poem_counts},
    create::{create_comment, create_reply},
    delete::delete_comment,
    get::{
        get_comment, get_comments_by_author, get_descendants, get_poem_comments, get_replies,
        get_thread,
    },
    like::{like_comment, like_poem, toggle_like},
    patch::patch_comment,
};

pub fn route() -> Router<App> {
    // TODO rate limit the write endpoints once the gateway forwards client ips
    Router::<App>::new()
        .route(
            "/poems/{poem_id}/comments",
            get(get_poem_comments).post(create_comment),
        )
        .route("/poems/{poem_id}/counts", get(get_poem_counts))
        .route("/poems/{poem_id}/like", post(like_poem))
        .route("/comments", get(get_comments_by_author))
        .route(
            "/comments/{id}",
            get(get_comment).patch(patch_comment).delete(delete_comment),
        )
        .route("/comments/{id}/replies", get(get_replies).post(create_reply))
        .route("/comments/{id}/descendants", get(get_descendants))
        .route("/comments/{id}/thread", get(get_thread))
        .route("/comments/{id}/counts", get(get_comment_counts))
        .route("/comments/{id}/like", post(like_comment))
        .route("/likes/toggle", post(toggle_like))
}
