pub mod comment;
pub mod like;
pub mod poem;

pub use comment::Comment;
pub use like::{Like, LikeRecord, LikeTarget, TargetKind};
pub use poem::Poem;
