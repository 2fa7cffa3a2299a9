use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// What the content store tells us about a poem. The poem itself lives
/// elsewhere; comments and likes only need to know it exists.
#[derive(Queryable, Selectable, Insertable, Debug, Serialize, Clone, PartialEq)]
#[diesel(table_name = crate::schema::poems)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Poem {
    pub id: Uuid,
    pub title: String,
}
