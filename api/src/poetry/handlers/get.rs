use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    App,
    error::AppError,
    poetry::{
        comment::thread::{CommentNode, Page, SortType},
        models::Comment,
        within,
    },
};

#[derive(Deserialize)]
pub struct ThreadQueries {
    #[serde(default)]
    sort: SortType,
    page_offset: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Deserialize)]
pub struct AuthorQuery {
    user: Uuid,
}

pub async fn get_comments_by_author(
    State(ctx): State<App>,
    Query(q): Query<AuthorQuery>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = within(
        ctx.config.request_deadline,
        ctx.poetry.comments.list_by_author(q.user),
    )
    .await?;

    Ok(Json(comments))
}

pub async fn get_poem_comments(
    State(ctx): State<App>,
    Path(poem_id): Path<Uuid>,
    Query(q): Query<ThreadQueries>,
) -> Result<Json<Vec<CommentNode>>, AppError> {
    let threads = within(
        ctx.config.request_deadline,
        ctx.poetry.comments.poem_threads(
            poem_id,
            q.sort,
            Page::new(q.page_offset, q.page_size),
        ),
    )
    .await?;

    Ok(Json(threads))
}

pub async fn get_comment(
    State(ctx): State<App>,
    Path(id): Path<Uuid>,
) -> Result<Json<Comment>, AppError> {
    let comment = within(ctx.config.request_deadline, ctx.poetry.comments.get(id)).await?;

    Ok(Json(comment))
}

pub async fn get_replies(
    State(ctx): State<App>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let replies = within(
        ctx.config.request_deadline,
        ctx.poetry.comments.list_children(id),
    )
    .await?;

    Ok(Json(replies))
}

pub async fn get_descendants(
    State(ctx): State<App>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let descendants = within(
        ctx.config.request_deadline,
        ctx.poetry.comments.list_descendants(id),
    )
    .await?;

    Ok(Json(descendants))
}

pub async fn get_thread(
    State(ctx): State<App>,
    Path(id): Path<Uuid>,
    Query(q): Query<ThreadQueries>,
) -> Result<Json<CommentNode>, AppError> {
    let thread = within(
        ctx.config.request_deadline,
        ctx.poetry.comments.thread(id, q.sort),
    )
    .await?;

    Ok(Json(thread))
}
