use std::{collections::HashMap, sync::Arc};

use uuid::Uuid;

use super::{
    error::PoetryError,
    models::{Comment, LikeTarget, TargetKind},
    repository::{CommentStore, LikeStore},
};

/// Like and comment counts. Everything is counted live from the records, so
/// there is no cached counter that could drift from the truth.
#[derive(Clone)]
pub struct CountAggregator {
    comments: Arc<dyn CommentStore>,
    likes: Arc<dyn LikeStore>,
}

impl CountAggregator {
    pub fn new(comments: Arc<dyn CommentStore>, likes: Arc<dyn LikeStore>) -> Self {
        CountAggregator { comments, likes }
    }

    pub async fn like_count(&self, target: &LikeTarget) -> Result<u64, PoetryError> {
        self.likes.count_likes(target).await
    }

    /// All comments on the poem, replies at any depth included.
    pub async fn comment_count(&self, content_id: Uuid) -> Result<u64, PoetryError> {
        self.comments.count_comments_on(content_id).await
    }

    pub async fn direct_reply_count(&self, comment_id: Uuid) -> Result<u64, PoetryError> {
        self.comments.count_children(comment_id).await
    }

    pub async fn subtree_reply_count(&self, comment_id: Uuid) -> Result<u64, PoetryError> {
        let comment = self
            .comments
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| PoetryError::comment_not_found(comment_id))?;

        self.comments.count_subtree(&comment.path).await
    }

    pub async fn comment_like_counts(
        &self,
        comments: &[Comment],
    ) -> Result<HashMap<Uuid, u64>, PoetryError> {
        let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
        self.likes.count_likes_for(TargetKind::Comment, &ids).await
    }
}
