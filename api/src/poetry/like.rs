use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::{
    error::PoetryError,
    models::{Like, LikeTarget},
    repository::{CommentStore, ContentStore, LikeStore, ToggleAttempt},
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub action: LikeAction,
    /// Likes on the target right after the toggle.
    pub count: u64,
}

/// Flips a user's like on a poem or a comment.
///
/// Each attempt is one atomic store operation, so concurrent toggles on the
/// same (user, target) pair behave as if they ran one after another. An
/// attempt that lost a race writes nothing and is replayed, up to
/// `max_attempts` times.
#[derive(Clone)]
pub struct LikeToggle {
    likes: Arc<dyn LikeStore>,
    comments: Arc<dyn CommentStore>,
    content: Arc<dyn ContentStore>,
    max_attempts: u32,
}

impl LikeToggle {
    pub fn new(
        likes: Arc<dyn LikeStore>,
        comments: Arc<dyn CommentStore>,
        content: Arc<dyn ContentStore>,
        max_attempts: u32,
    ) -> Self {
        LikeToggle {
            likes,
            comments,
            content,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn toggle(
        &self,
        user_id: Uuid,
        target: LikeTarget,
    ) -> Result<ToggleOutcome, PoetryError> {
        self.resolve(&target).await?;

        let like = Like::new(user_id, target);

        for _ in 0..self.max_attempts {
            let action = match self.likes.toggle_like(&like).await? {
                ToggleAttempt::Liked => LikeAction::Liked,
                ToggleAttempt::Unliked => LikeAction::Unliked,
                ToggleAttempt::Contended => continue,
            };

            let count = self.likes.count_likes(&target).await?;
            return Ok(ToggleOutcome { action, count });
        }

        Err(PoetryError::Conflict {
            attempts: self.max_attempts,
        })
    }

    /// Same as [`LikeToggle::toggle`] for callers holding the two optional
    /// references, exactly one of which must be set.
    pub async fn toggle_refs(
        &self,
        user_id: Uuid,
        content_ref: Option<Uuid>,
        comment_ref: Option<Uuid>,
    ) -> Result<ToggleOutcome, PoetryError> {
        let target = LikeTarget::from_refs(content_ref, comment_ref)?;
        self.toggle(user_id, target).await
    }

    pub async fn is_liked(&self, user_id: Uuid, target: &LikeTarget) -> Result<bool, PoetryError> {
        self.likes.has_liked(user_id, target).await
    }

    async fn resolve(&self, target: &LikeTarget) -> Result<(), PoetryError> {
        match *target {
            LikeTarget::Poem(id) => {
                self.content
                    .find_poem(id)
                    .await?
                    .ok_or_else(|| PoetryError::poem_not_found(id))?;
            }
            LikeTarget::Comment(id) => {
                self.comments
                    .find_comment(id)
                    .await?
                    .ok_or_else(|| PoetryError::comment_not_found(id))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicU32, Ordering},
    };

    use async_trait::async_trait;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::poetry::{
        comment::test::setup,
        models::{Comment, Poem, TargetKind},
        repository::MemoryStore,
    };

    async fn toggler() -> (LikeToggle, Arc<MemoryStore>, Poem) {
        let (_, store, poem) = setup().await;
        let likes = LikeToggle::new(
            store.clone(),
            store.clone(),
            store.clone(),
            DEFAULT_MAX_ATTEMPTS,
        );
        (likes, store, poem)
    }

    #[tokio::test]
    async fn like_then_unlike() {
        let (likes, _, poem) = toggler().await;
        let u1 = Uuid::now_v7();
        let target = LikeTarget::Poem(poem.id);

        assert_eq!(
            likes.toggle(u1, target).await.unwrap(),
            ToggleOutcome {
                action: LikeAction::Liked,
                count: 1
            }
        );
        assert!(likes.is_liked(u1, &target).await.unwrap());

        assert_eq!(
            likes.toggle(u1, target).await.unwrap(),
            ToggleOutcome {
                action: LikeAction::Unliked,
                count: 0
            }
        );
        assert!(!likes.is_liked(u1, &target).await.unwrap());
    }

    #[tokio::test]
    async fn toggle_twice_restores_state_and_count() {
        let (likes, _, poem) = toggler().await;
        let target = LikeTarget::Poem(poem.id);

        // someone else already likes it
        likes.toggle(Uuid::now_v7(), target).await.unwrap();

        let u = Uuid::now_v7();
        let first = likes.toggle(u, target).await.unwrap();
        assert_eq!(first.count, 2);
        let second = likes.toggle(u, target).await.unwrap();
        assert_eq!(second.action, LikeAction::Unliked);
        assert_eq!(second.count, 1);
        assert!(!likes.is_liked(u, &target).await.unwrap());
    }

    #[tokio::test]
    async fn comment_likes_are_separate_from_poem_likes() {
        let (tree, store, poem) = setup().await;
        let likes = LikeToggle::new(store.clone(), store.clone(), store.clone(), 3);
        let u = Uuid::now_v7();

        let c = tree.create_root(Some(poem.id), u, "hello").await.unwrap();

        likes.toggle(u, LikeTarget::Comment(c.id)).await.unwrap();
        assert!(!likes.is_liked(u, &LikeTarget::Poem(poem.id)).await.unwrap());

        let outcome = likes.toggle(u, LikeTarget::Poem(poem.id)).await.unwrap();
        assert_eq!(outcome.count, 1);
    }

    #[tokio::test]
    async fn target_must_be_exactly_one_and_exist() {
        let (likes, _, poem) = toggler().await;
        let u = Uuid::now_v7();

        assert!(matches!(
            likes.toggle_refs(u, None, None).await,
            Err(PoetryError::Validation(_))
        ));
        assert!(matches!(
            likes
                .toggle_refs(u, Some(poem.id), Some(Uuid::now_v7()))
                .await,
            Err(PoetryError::Validation(_))
        ));
        assert!(matches!(
            likes.toggle_refs(u, Some(Uuid::now_v7()), None).await,
            Err(PoetryError::NotFound { kind: "Poem", .. })
        ));
        assert!(matches!(
            likes.toggle_refs(u, None, Some(Uuid::now_v7())).await,
            Err(PoetryError::NotFound { kind: "Comment", .. })
        ));
        assert_eq!(
            likes
                .toggle_refs(u, Some(poem.id), None)
                .await
                .unwrap()
                .action,
            LikeAction::Liked
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_converge_by_parity() {
        for n in [2usize, 5, 8, 13] {
            let (likes, store, poem) = toggler().await;
            let u = Uuid::now_v7();
            let target = LikeTarget::Poem(poem.id);

            let handles: Vec<_> = (0..n)
                .map(|_| {
                    let likes = likes.clone();
                    tokio::spawn(async move { likes.toggle(u, target).await })
                })
                .collect();

            for h in handles {
                let outcome = h.await.unwrap().unwrap();
                assert!(outcome.count <= 1);
            }

            let records = store.like_records_for(u, &target).await;
            assert!(records <= 1);
            assert_eq!(likes.is_liked(u, &target).await.unwrap(), n % 2 == 1);
            assert_eq!(records, n % 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn two_simultaneous_toggles_cancel_out() {
        let (likes, store, poem) = toggler().await;
        let u1 = Uuid::now_v7();
        let target = LikeTarget::Poem(poem.id);

        let (a, b) = tokio::join!(likes.toggle(u1, target), likes.toggle(u1, target));
        let mut actions = vec![a.unwrap().action, b.unwrap().action];
        actions.sort_by_key(|a| *a == LikeAction::Unliked);

        assert_eq!(actions, vec![LikeAction::Liked, LikeAction::Unliked]);
        assert_eq!(store.like_records_for(u1, &target).await, 0);
        assert_eq!(likes.toggle(Uuid::now_v7(), target).await.unwrap().count, 1);
    }

    /// Reports contention for the first `contended` attempts, then defers to
    /// a real store.
    struct ContendedStore {
        inner: Arc<MemoryStore>,
        contended: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl LikeStore for ContendedStore {
        async fn toggle_like(&self, like: &Like) -> Result<ToggleAttempt, PoetryError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.contended {
                return Ok(ToggleAttempt::Contended);
            }
            self.inner.toggle_like(like).await
        }

        async fn has_liked(
            &self,
            user_id: Uuid,
            target: &LikeTarget,
        ) -> Result<bool, PoetryError> {
            self.inner.has_liked(user_id, target).await
        }

        async fn count_likes(&self, target: &LikeTarget) -> Result<u64, PoetryError> {
            self.inner.count_likes(target).await
        }

        async fn count_likes_for(
            &self,
            kind: TargetKind,
            ids: &[Uuid],
        ) -> Result<HashMap<Uuid, u64>, PoetryError> {
            self.inner.count_likes_for(kind, ids).await
        }
    }

    #[tokio::test]
    async fn contention_is_retried_within_budget() {
        let (_, store, poem) = setup().await;
        let contended = Arc::new(ContendedStore {
            inner: store.clone(),
            contended: 2,
            attempts: AtomicU32::new(0),
        });
        let likes = LikeToggle::new(contended.clone(), store.clone(), store.clone(), 3);

        let outcome = likes
            .toggle(Uuid::now_v7(), LikeTarget::Poem(poem.id))
            .await
            .unwrap();
        assert_eq!(outcome.action, LikeAction::Liked);
        assert_eq!(contended.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_is_a_conflict() {
        let (_, store, poem) = setup().await;
        let contended = Arc::new(ContendedStore {
            inner: store.clone(),
            contended: u32::MAX,
            attempts: AtomicU32::new(0),
        });
        let likes = LikeToggle::new(contended.clone(), store.clone(), store.clone(), 3);
        let u = Uuid::now_v7();
        let target = LikeTarget::Poem(poem.id);

        assert!(matches!(
            likes.toggle(u, target).await,
            Err(PoetryError::Conflict { attempts: 3 })
        ));
        assert_eq!(contended.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(store.like_records_for(u, &target).await, 0);
    }

    /// Deletes a comment's subtree right after handing the comment out, the
    /// way a concurrent delete landing between lookup and write would.
    struct VanishingComments {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl CommentStore for VanishingComments {
        async fn insert_comment(&self, comment: &Comment) -> Result<(), PoetryError> {
            self.inner.insert_comment(comment).await
        }

        async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, PoetryError> {
            let found = self.inner.find_comment(id).await?;
            if let Some(c) = &found {
                self.inner.delete_subtree(&c.path).await?;
            }
            Ok(found)
        }

        async fn update_comment_text(
            &self,
            id: Uuid,
            text: &str,
            updated_at: NaiveDateTime,
        ) -> Result<Option<Comment>, PoetryError> {
            self.inner.update_comment_text(id, text, updated_at).await
        }

        async fn children_of(&self, id: Uuid) -> Result<Vec<Comment>, PoetryError> {
            self.inner.children_of(id).await
        }

        async fn subtree_of(&self, path: &str) -> Result<Vec<Comment>, PoetryError> {
            self.inner.subtree_of(path).await
        }

        async fn comments_on(&self, content_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
            self.inner.comments_on(content_id).await
        }

        async fn comments_by(&self, author_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
            self.inner.comments_by(author_id).await
        }

        async fn delete_subtree(&self, path: &str) -> Result<u64, PoetryError> {
            self.inner.delete_subtree(path).await
        }

        async fn count_comments_on(&self, content_id: Uuid) -> Result<u64, PoetryError> {
            self.inner.count_comments_on(content_id).await
        }

        async fn count_children(&self, id: Uuid) -> Result<u64, PoetryError> {
            self.inner.count_children(id).await
        }

        async fn count_subtree(&self, path: &str) -> Result<u64, PoetryError> {
            self.inner.count_subtree(path).await
        }
    }

    #[tokio::test]
    async fn like_on_a_comment_deleted_mid_toggle_is_not_found() {
        let (tree, store, poem) = setup().await;
        let u = Uuid::now_v7();
        let c = tree.create_root(Some(poem.id), u, "hello").await.unwrap();

        let vanishing = Arc::new(VanishingComments {
            inner: store.clone(),
        });
        let likes = LikeToggle::new(store.clone(), vanishing, store.clone(), 3);
        let target = LikeTarget::Comment(c.id);

        assert!(matches!(
            likes.toggle(u, target).await,
            Err(PoetryError::NotFound { kind: "Comment", id }) if id == c.id
        ));
        assert!(store.find_comment(c.id).await.unwrap().is_none());
        assert_eq!(store.like_records_for(u, &target).await, 0);
    }
}
