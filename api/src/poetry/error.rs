use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

/// Everything that can go wrong inside the comment and like core. Every
/// variant is per-request: a failed operation leaves persisted state as it
/// was before the call.
#[derive(thiserror::Error, Debug)]
pub enum PoetryError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Too much contention on this like, gave up after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("Write rejected by a uniqueness constraint: {0}")]
    ConstraintViolation(String),

    #[error("The operation did not finish before its deadline")]
    DeadlineExceeded,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("database query failed: {0}")]
    Query(diesel::result::Error),

    #[error("could not get a database connection: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl PoetryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PoetryError::Validation(msg.into())
    }

    pub fn comment_not_found(id: Uuid) -> Self {
        PoetryError::NotFound { kind: "Comment", id }
    }

    pub fn poem_not_found(id: Uuid) -> Self {
        PoetryError::NotFound { kind: "Poem", id }
    }

    /// True when the database aborted a transaction because of a concurrent
    /// writer and the whole attempt can simply be replayed.
    pub fn is_serialization_failure(&self) -> bool {
        matches!(
            self,
            PoetryError::Storage(StorageError::Query(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::SerializationFailure,
                _,
            )))
        )
    }
}

impl From<diesel::result::Error> for PoetryError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                PoetryError::ConstraintViolation(info.message().to_string())
            }
            e => PoetryError::Storage(StorageError::Query(e)),
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for PoetryError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        PoetryError::Storage(StorageError::Pool(e))
    }
}
