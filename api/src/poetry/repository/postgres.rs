use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
    scoped_futures::ScopedFutureExt,
};
use uuid::Uuid;

use super::{CommentStore, ContentStore, LikeStore, ToggleAttempt};
use crate::{
    poetry::{
        error::PoetryError,
        models::{
            Comment, Like, LikeRecord, LikeTarget, Poem, TargetKind, comment::UpdateComment,
        },
        path,
    },
    schema::{comments, likes, poems},
};

pub type DieselPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgStore {
    pool: DieselPool,
}

impl PgStore {
    pub fn connect(database_url: &str, max_connections: usize) -> eyre::Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager).max_size(max_connections).build()?;
        Ok(PgStore { pool })
    }
}

// Paths only contain hex digits, `-` and the delimiter, none of which are
// LIKE wildcards, so the prefix needs no escaping.
fn subtree_pattern(path: &str) -> String {
    format!("{}%", path::descendant_prefix(path))
}

#[async_trait]
impl CommentStore for PgStore {
    async fn insert_comment(&self, comment: &Comment) -> Result<(), PoetryError> {
        let mut conn = self.pool.get().await?;

        let inserted = diesel::insert_into(comments::table)
            .values(comment)
            .execute(&mut conn)
            .await;

        match (inserted, comment.parent_id) {
            (Ok(_), _) => Ok(()),
            // the parent vanished (or never existed) by the time the row
            // reached the database
            (
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                    _,
                )),
                Some(parent_id),
            ) => Err(PoetryError::comment_not_found(parent_id)),
            (
                Err(diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                    _,
                )),
                None,
            ) => Err(PoetryError::poem_not_found(comment.content_id)),
            (Err(e), _) => Err(e.into()),
        }
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(comments::table
            .find(id)
            .select(Comment::as_select())
            .first(&mut conn)
            .await
            .optional()?)
    }

    async fn update_comment_text(
        &self,
        id: Uuid,
        text: &str,
        updated_at: NaiveDateTime,
    ) -> Result<Option<Comment>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(diesel::update(comments::table.find(id))
            .set(&UpdateComment { text, updated_at })
            .returning(Comment::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?)
    }

    async fn children_of(&self, id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(comments::table
            .filter(comments::parent_id.eq(id))
            .order((comments::created_at.asc(), comments::id.asc()))
            .select(Comment::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn subtree_of(&self, path: &str) -> Result<Vec<Comment>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(comments::table
            .filter(comments::path.like(subtree_pattern(path)))
            .order((comments::path.asc(), comments::created_at.asc()))
            .select(Comment::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn comments_on(&self, content_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(comments::table
            .filter(comments::content_id.eq(content_id))
            .order((comments::path.asc(), comments::created_at.asc()))
            .select(Comment::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn comments_by(&self, author_id: Uuid) -> Result<Vec<Comment>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(comments::table
            .filter(comments::author_id.eq(author_id))
            .order((comments::created_at.desc(), comments::id.desc()))
            .select(Comment::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn delete_subtree(&self, path: &str) -> Result<u64, PoetryError> {
        let mut conn = self.pool.get().await?;
        let path = path.to_string();
        let pattern = subtree_pattern(&path);

        conn.transaction::<_, PoetryError, _>(|conn| {
            async move {
                // Comments go first: the row locks make a concurrent toggle on
                // any of them either finish before this point or find its
                // target gone.
                let removed: Vec<Uuid> = diesel::delete(
                    comments::table
                        .filter(comments::path.eq(&path).or(comments::path.like(&pattern))),
                )
                .returning(comments::id)
                .get_results(conn)
                .await?;

                diesel::delete(
                    likes::table
                        .filter(likes::target_kind.eq(TargetKind::Comment.as_str()))
                        .filter(likes::target_id.eq_any(&removed)),
                )
                .execute(conn)
                .await?;

                Ok(removed.len() as u64)
            }
            .scope_boxed()
        })
        .await
    }

    async fn count_comments_on(&self, content_id: Uuid) -> Result<u64, PoetryError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = comments::table
            .filter(comments::content_id.eq(content_id))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(count as u64)
    }

    async fn count_children(&self, id: Uuid) -> Result<u64, PoetryError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = comments::table
            .filter(comments::parent_id.eq(id))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(count as u64)
    }

    async fn count_subtree(&self, path: &str) -> Result<u64, PoetryError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = comments::table
            .filter(comments::path.like(subtree_pattern(path)))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(count as u64)
    }
}

#[async_trait]
impl LikeStore for PgStore {
    async fn toggle_like(&self, like: &Like) -> Result<ToggleAttempt, PoetryError> {
        let mut conn = self.pool.get().await?;
        let record = LikeRecord::from(like);
        let target = like.target;

        let attempt = conn
            .transaction::<_, PoetryError, _>(|conn| {
                async move {
                    // Holding a key share lock on the target keeps a subtree
                    // delete from removing it until this attempt commits.
                    let found = match target {
                        LikeTarget::Poem(id) => poems::table
                            .find(id)
                            .select(poems::id)
                            .for_key_share()
                            .first::<Uuid>(conn)
                            .await
                            .optional()?,
                        LikeTarget::Comment(id) => comments::table
                            .find(id)
                            .select(comments::id)
                            .for_key_share()
                            .first::<Uuid>(conn)
                            .await
                            .optional()?,
                    };

                    if found.is_none() {
                        return Err(match target {
                            LikeTarget::Poem(id) => PoetryError::poem_not_found(id),
                            LikeTarget::Comment(id) => PoetryError::comment_not_found(id),
                        });
                    }

                    let inserted = diesel::insert_into(likes::table)
                        .values(&record)
                        .on_conflict((likes::user_id, likes::target_kind, likes::target_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    if inserted == 1 {
                        return Ok(ToggleAttempt::Liked);
                    }

                    let deleted = diesel::delete(
                        likes::table
                            .filter(likes::user_id.eq(record.user_id))
                            .filter(likes::target_kind.eq(&record.target_kind))
                            .filter(likes::target_id.eq(record.target_id)),
                    )
                    .execute(conn)
                    .await?;

                    Ok(if deleted == 1 {
                        ToggleAttempt::Unliked
                    } else {
                        ToggleAttempt::Contended
                    })
                }
                .scope_boxed()
            })
            .await;

        match attempt {
            Err(e) if e.is_serialization_failure() => Ok(ToggleAttempt::Contended),
            attempt => attempt,
        }
    }

    async fn has_liked(&self, user_id: Uuid, target: &LikeTarget) -> Result<bool, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(diesel::select(diesel::dsl::exists(
            likes::table
                .filter(likes::user_id.eq(user_id))
                .filter(likes::target_kind.eq(target.kind().as_str()))
                .filter(likes::target_id.eq(target.id())),
        ))
        .get_result(&mut conn)
        .await?)
    }

    async fn count_likes(&self, target: &LikeTarget) -> Result<u64, PoetryError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = likes::table
            .filter(likes::target_kind.eq(target.kind().as_str()))
            .filter(likes::target_id.eq(target.id()))
            .count()
            .get_result(&mut conn)
            .await?;

        Ok(count as u64)
    }

    async fn count_likes_for(
        &self,
        kind: TargetKind,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, u64>, PoetryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.pool.get().await?;

        let rows: Vec<(Uuid, i64)> = likes::table
            .filter(likes::target_kind.eq(kind.as_str()))
            .filter(likes::target_id.eq_any(ids))
            .group_by(likes::target_id)
            .select((likes::target_id, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, count as u64))
            .collect())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn find_poem(&self, id: Uuid) -> Result<Option<Poem>, PoetryError> {
        let mut conn = self.pool.get().await?;

        Ok(poems::table
            .find(id)
            .select(Poem::as_select())
            .first(&mut conn)
            .await
            .optional()?)
    }
}

#[cfg(test)]
mod test {
    //! The database tests need a migrated PostgreSQL at `DATABASE_URL`:
    //! `cargo test -- --ignored`. Every test works on a fresh poem, so they
    //! can share a database.

    use std::sync::Arc;

    use super::*;
    use crate::poetry::like::{DEFAULT_MAX_ATTEMPTS, LikeAction, LikeToggle};

    #[test]
    fn subtree_pattern_is_anchored() {
        assert_eq!(subtree_pattern("ab.cd"), "ab.cd.%");
    }

    async fn store() -> (Arc<PgStore>, Poem) {
        dotenv::dotenv().ok();
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgStore::connect(&url, 16).unwrap();

        let poem = Poem {
            id: Uuid::now_v7(),
            title: "P1".into(),
        };
        let mut conn = store.pool.get().await.unwrap();
        diesel::insert_into(poems::table)
            .values(&poem)
            .execute(&mut conn)
            .await
            .unwrap();

        (Arc::new(store), poem)
    }

    async fn like_records(store: &PgStore, user_id: Uuid, target: &LikeTarget) -> i64 {
        let mut conn = store.pool.get().await.unwrap();
        likes::table
            .filter(likes::user_id.eq(user_id))
            .filter(likes::target_kind.eq(target.kind().as_str()))
            .filter(likes::target_id.eq(target.id()))
            .count()
            .get_result(&mut conn)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "needs a migrated PostgreSQL at DATABASE_URL"]
    async fn concurrent_toggles_converge_by_parity() {
        for n in [2usize, 5, 8] {
            let (store, poem) = store().await;
            let likes = LikeToggle::new(
                store.clone(),
                store.clone(),
                store.clone(),
                DEFAULT_MAX_ATTEMPTS,
            );
            let u = Uuid::now_v7();
            let target = LikeTarget::Poem(poem.id);

            let handles: Vec<_> = (0..n)
                .map(|_| {
                    let likes = likes.clone();
                    tokio::spawn(async move { likes.toggle(u, target).await })
                })
                .collect();

            // a toggle that ran out of attempts wrote nothing, so only the
            // successful ones decide the final state
            let mut flips = 0;
            for h in handles {
                match h.await.unwrap() {
                    Ok(outcome) => {
                        assert!(outcome.count <= 1);
                        flips += 1;
                    }
                    Err(PoetryError::Conflict { .. }) => {}
                    Err(e) => panic!("unexpected toggle failure: {e}"),
                }
            }

            assert!(flips > 0);
            let records = like_records(&store, u, &target).await;
            assert_eq!(records, (flips % 2) as i64);
            assert_eq!(likes.is_liked(u, &target).await.unwrap(), flips % 2 == 1);
        }
    }

    #[tokio::test]
    #[ignore = "needs a migrated PostgreSQL at DATABASE_URL"]
    async fn toggle_flips_and_checks_its_target() {
        let (store, poem) = store().await;
        let u = Uuid::now_v7();
        let target = LikeTarget::Poem(poem.id);

        assert_eq!(
            store.toggle_like(&Like::new(u, target)).await.unwrap(),
            ToggleAttempt::Liked
        );
        assert!(store.has_liked(u, &target).await.unwrap());
        assert_eq!(
            store.toggle_like(&Like::new(u, target)).await.unwrap(),
            ToggleAttempt::Unliked
        );
        assert_eq!(like_records(&store, u, &target).await, 0);

        let root = Comment::new_root(poem.id, Uuid::now_v7(), "root".into());
        store.insert_comment(&root).await.unwrap();
        store.delete_subtree(&root.path).await.unwrap();

        let gone = LikeTarget::Comment(root.id);
        assert!(matches!(
            store.toggle_like(&Like::new(u, gone)).await,
            Err(PoetryError::NotFound { kind: "Comment", id }) if id == root.id
        ));
        assert_eq!(like_records(&store, u, &gone).await, 0);
    }

    #[tokio::test]
    #[ignore = "needs a migrated PostgreSQL at DATABASE_URL"]
    async fn delete_subtree_removes_comments_and_their_likes() {
        let (store, poem) = store().await;
        let u = Uuid::now_v7();

        let c1 = Comment::new_root(poem.id, u, "c1".into());
        let c2 = Comment::new_reply(&c1, u, "c2".into());
        let c3 = Comment::new_reply(&c2, u, "c3".into());
        let c4 = Comment::new_root(poem.id, u, "c4".into());
        let c5 = Comment::new_reply(&c4, u, "c5".into());
        for c in [&c1, &c2, &c3, &c4, &c5] {
            store.insert_comment(c).await.unwrap();
        }

        let subtree: Vec<Uuid> = store
            .subtree_of(&c1.path)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(subtree, vec![c2.id, c3.id]);
        assert_eq!(store.count_subtree(&c1.path).await.unwrap(), 2);
        assert_eq!(store.count_children(c1.id).await.unwrap(), 1);

        store
            .toggle_like(&Like::new(u, LikeTarget::Comment(c2.id)))
            .await
            .unwrap();
        store
            .toggle_like(&Like::new(u, LikeTarget::Comment(c5.id)))
            .await
            .unwrap();

        assert_eq!(store.delete_subtree(&c1.path).await.unwrap(), 3);
        assert!(store.find_comment(c3.id).await.unwrap().is_none());
        assert_eq!(
            store
                .count_likes(&LikeTarget::Comment(c2.id))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .count_likes(&LikeTarget::Comment(c5.id))
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.count_comments_on(poem.id).await.unwrap(), 2);
        assert_eq!(store.delete_subtree(&c1.path).await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "needs a migrated PostgreSQL at DATABASE_URL"]
    async fn orphans_are_rejected_as_not_found() {
        let (store, poem) = store().await;

        let ghost = Comment::new_root(poem.id, Uuid::now_v7(), "ghost".into());
        let orphan = Comment::new_reply(&ghost, Uuid::now_v7(), "orphan".into());
        assert!(matches!(
            store.insert_comment(&orphan).await,
            Err(PoetryError::NotFound { kind: "Comment", id }) if id == ghost.id
        ));

        let stray = Comment::new_root(Uuid::now_v7(), Uuid::now_v7(), "stray".into());
        assert!(matches!(
            store.insert_comment(&stray).await,
            Err(PoetryError::NotFound { kind: "Poem", .. })
        ));

        let root = Comment::new_root(poem.id, Uuid::now_v7(), "root".into());
        store.insert_comment(&root).await.unwrap();
        assert!(matches!(
            store.insert_comment(&root).await,
            Err(PoetryError::ConstraintViolation(_))
        ));
        assert!(store.find_comment(orphan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "needs a migrated PostgreSQL at DATABASE_URL"]
    async fn toggle_service_reports_counts() {
        let (store, poem) = store().await;
        let likes = LikeToggle::new(store.clone(), store.clone(), store.clone(), 3);
        let target = LikeTarget::Poem(poem.id);

        likes.toggle(Uuid::now_v7(), target).await.unwrap();
        let u = Uuid::now_v7();
        let outcome = likes.toggle(u, target).await.unwrap();
        assert_eq!(outcome.action, LikeAction::Liked);
        assert_eq!(outcome.count, 2);

        let counts = store
            .count_likes_for(TargetKind::Poem, &[poem.id])
            .await
            .unwrap();
        assert_eq!(counts.get(&poem.id), Some(&2));
    }
}
