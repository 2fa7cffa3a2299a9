pub mod thread;

use std::sync::Arc;

use uuid::Uuid;

use super::{
    counts::CountAggregator,
    error::PoetryError,
    models::{Comment, comment::validate_text},
    repository::{CommentStore, ContentStore},
};

use self::thread::{CommentNode, Page, SortType};

/// Threaded comments stored with materialized paths.
///
/// Every write is a single insert of a complete record: ids are generated
/// before the record is built, so path and depth are never patched in later.
#[derive(Clone)]
pub struct CommentTree {
    comments: Arc<dyn CommentStore>,
    content: Arc<dyn ContentStore>,
    counts: CountAggregator,
}

impl CommentTree {
    pub fn new(
        comments: Arc<dyn CommentStore>,
        content: Arc<dyn ContentStore>,
        counts: CountAggregator,
    ) -> Self {
        CommentTree {
            comments,
            content,
            counts,
        }
    }

    pub async fn create_root(
        &self,
        content_ref: Option<Uuid>,
        author_id: Uuid,
        text: &str,
    ) -> Result<Comment, PoetryError> {
        let content_id = content_ref
            .ok_or_else(|| PoetryError::validation("Top-level comments must belong to a poem"))?;
        let text = validate_text(text).map_err(PoetryError::validation)?;

        if self.content.find_poem(content_id).await?.is_none() {
            return Err(PoetryError::poem_not_found(content_id));
        }

        let comment = Comment::new_root(content_id, author_id, text);
        self.comments.insert_comment(&comment).await?;

        Ok(comment)
    }

    /// Replies always inherit the poem of their parent. A caller may pass the
    /// poem it thinks it is replying on, but only to have it checked.
    pub async fn create_reply(
        &self,
        parent_id: Uuid,
        author_id: Uuid,
        text: &str,
        content_ref: Option<Uuid>,
    ) -> Result<Comment, PoetryError> {
        let text = validate_text(text).map_err(PoetryError::validation)?;
        let parent = self.get(parent_id).await?;

        if let Some(content_id) = content_ref {
            if content_id != parent.content_id {
                return Err(PoetryError::validation(
                    "You're replying to a comment that does not belong to this poem",
                ));
            }
        }

        let comment = Comment::new_reply(&parent, author_id, text);
        self.comments.insert_comment(&comment).await?;

        Ok(comment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Comment, PoetryError> {
        self.comments
            .find_comment(id)
            .await?
            .ok_or_else(|| PoetryError::comment_not_found(id))
    }

    pub async fn edit_text(&self, id: Uuid, text: &str) -> Result<Comment, PoetryError> {
        let text = validate_text(text).map_err(PoetryError::validation)?;

        self.comments
            .update_comment_text(id, &text, chrono::Utc::now().naive_utc())
            .await?
            .ok_or_else(|| PoetryError::comment_not_found(id))
    }

    pub async fn list_children(&self, id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        self.get(id).await?;
        self.comments.children_of(id).await
    }

    /// Everything below the comment in pre-order, the comment itself excluded.
    pub async fn list_descendants(&self, id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let comment = self.get(id).await?;
        let mut descendants = self.comments.subtree_of(&comment.path).await?;

        // Stores already return path order; this pins the contract regardless
        // of database collation.
        descendants.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(descendants)
    }

    /// Everything one user has written, across poems, newest first.
    pub async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        self.comments.comments_by(author_id).await
    }

    /// Deletes the comment and its whole subtree in one batch. Returns how many
    /// comments were removed.
    pub async fn delete_subtree(&self, id: Uuid) -> Result<u64, PoetryError> {
        let comment = self.get(id).await?;

        match self.comments.delete_subtree(&comment.path).await? {
            // someone else deleted it between the lookup and the delete
            0 => Err(PoetryError::comment_not_found(id)),
            removed => Ok(removed),
        }
    }

    /// The comment with its replies nested under it, fetched with a single
    /// subtree query.
    pub async fn thread(&self, id: Uuid, sort: SortType) -> Result<CommentNode, PoetryError> {
        let root = self.get(id).await?;
        let descendants = self.comments.subtree_of(&root.path).await?;

        let mut flat = Vec::with_capacity(descendants.len() + 1);
        flat.push(root);
        flat.extend(descendants);

        let like_counts = self.counts.comment_like_counts(&flat).await?;
        let mut forest = thread::assemble(flat, &like_counts, sort);

        forest
            .pop()
            .ok_or_else(|| PoetryError::comment_not_found(id))
    }

    /// Every thread on a poem, roots paginated after sorting.
    pub async fn poem_threads(
        &self,
        content_id: Uuid,
        sort: SortType,
        page: Page,
    ) -> Result<Vec<CommentNode>, PoetryError> {
        if self.content.find_poem(content_id).await?.is_none() {
            return Err(PoetryError::poem_not_found(content_id));
        }

        let flat = self.comments.comments_on(content_id).await?;
        let like_counts = self.counts.comment_like_counts(&flat).await?;
        let forest = thread::assemble(flat, &like_counts, sort);

        Ok(page.apply(forest))
    }
}
