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
pub struct CommentPatch {
    text: String,
}

#[debug_handler]
pub async fn patch_comment(
    State(ctx): State<App>,
    Path(id): Path<Uuid>,
    AuthUser(user): AuthUser,
    crate::json::Json(patch): crate::json::Json<CommentPatch>,
) -> Result<Json<Comment>, AppError> {
    let comments = &ctx.poetry.comments;

    let comment = within(ctx.config.request_deadline, comments.get(id)).await?;
    if !user.can_modify(comment.author_id) {
        return Err((
            "You are not the owner of this comment",
            StatusCode::FORBIDDEN,
        ))?;
    }

    let comment = within(
        ctx.config.request_deadline,
        comments.edit_text(id, &patch.text),
    )
    .await?;

    tracing::info!(comment_id = %id, user_id = %user.user_id, "Comment updated");

    Ok(Json(comment))
}
