use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    poetry::{models::Comment, within},
};

#[derive(Deserialize)]
pub struct CommentSubmission {
    text: String,
}

#[derive(Deserialize)]
pub struct ReplySubmission {
    text: String,
    /// The poem the client believes it is replying on. Only checked, the
    /// reply always lands on its parent's poem.
    #[serde(default)]
    poem_id: Option<Uuid>,
}

#[debug_handler]
pub async fn create_comment(
    State(ctx): State<App>,
    Path(poem_id): Path<Uuid>,
    AuthUser(user): AuthUser,
    crate::json::Json(submission): crate::json::Json<CommentSubmission>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = within(
        ctx.config.request_deadline,
        ctx.poetry
            .comments
            .create_root(Some(poem_id), user.user_id, &submission.text),
    )
    .await?;

    tracing::info!(
        comment_id = %comment.id,
        %poem_id,
        user_id = %user.user_id,
        "Comment created"
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

#[debug_handler]
pub async fn create_reply(
    State(ctx): State<App>,
    Path(parent_id): Path<Uuid>,
    AuthUser(user): AuthUser,
    crate::json::Json(submission): crate::json::Json<ReplySubmission>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = within(
        ctx.config.request_deadline,
        ctx.poetry.comments.create_reply(
            parent_id,
            user.user_id,
            &submission.text,
            submission.poem_id,
        ),
    )
    .await?;

    tracing::info!(
        comment_id = %comment.id,
        %parent_id,
        user_id = %user.user_id,
        depth = comment.depth,
        "Reply created"
    );

    Ok((StatusCode::CREATED, Json(comment)))
}
