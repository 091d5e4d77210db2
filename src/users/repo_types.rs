use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,                     // server generated, immutable
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub password: String,             // opaque, stored as-is
    pub email: String,                // unique across all records
    pub country: String,
    pub created_at: OffsetDateTime,   // immutable
    pub updated_at: OffsetDateTime,   // refreshed on every update
}

impl User {
    /// Composite sort key used for keyset pagination.
    pub fn sort_key(&self) -> (OffsetDateTime, Uuid) {
        (self.created_at, self.id)
    }
}

/// Mutable fields of a user, as accepted by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFields {
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub password: String,
    pub email: String,
    pub country: String,
}

/// Optional substring filters for search. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilters {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
}
