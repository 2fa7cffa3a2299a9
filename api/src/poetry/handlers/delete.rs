use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{App, error::AppError, identity::AuthUser, poetry::within};

#[derive(Serialize)]
pub struct Deleted {
    removed: u64,
}

/// Deletes the comment together with every reply below it.
#[debug_handler]
pub async fn delete_comment(
    State(ctx): State<App>,
    Path(id): Path<Uuid>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<Deleted>, AppError> {
    let comments = &ctx.poetry.comments;

    let comment = within(ctx.config.request_deadline, comments.get(id)).await?;
    if !auth_user.can_modify(comment.author_id) {
        return Err((
            "You are not the owner of this comment",
            StatusCode::FORBIDDEN,
        ))?;
    }

    let removed = within(ctx.config.request_deadline, comments.delete_subtree(id)).await?;

    tracing::info!(
        comment_id = %id,
        user_id = %auth_user.user_id,
        privileged = auth_user.privileged,
        removed,
        "Comment deleted"
    );

    Ok(Json(Deleted { removed }))
}
