//! In-memory `UserStore` for tests: unique email, keyset ordering and
//! case-insensitive substring matching, same as the Postgres adapter.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::filters::{Column, Predicate};
use super::repo::{StoreError, UserStore};
use super::repo_types::{User, UserFields};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
    unavailable: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record with explicit timestamps.
    pub async fn insert(&self, user: User) {
        self.users.write().await.push(user);
    }

    /// Make every call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!("connection refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, fields: &UserFields) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == fields.email) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            nickname: fields.nickname.clone(),
            password: fields.password.clone(),
            email: fields.email.clone(),
            country: fields.country.clone(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, id: Uuid, fields: &UserFields) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.write().await;
        let idx = users
            .iter()
            .position(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        if users.iter().any(|u| u.id != id && u.email == fields.email) {
            return Err(StoreError::Conflict);
        }
        let user = &mut users[idx];
        user.first_name = fields.first_name.clone();
        user.last_name = fields.last_name.clone();
        user.nickname = fields.nickname.clone();
        user.password = fields.password.clone();
        user.email = fields.email.clone();
        user.country = fields.country.clone();
        user.updated_at = OffsetDateTime::now_utc().max(user.created_at);
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.check()?;
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        predicates: &[Predicate],
        limit: u32,
    ) -> Result<Vec<User>, StoreError> {
        self.check()?;
        let users = self.users.read().await;
        let mut page: Vec<User> = users
            .iter()
            .filter(|u| predicates.iter().all(|p| matches(p, u)))
            .cloned()
            .collect();
        page.sort_by_key(User::sort_key);
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

fn matches(predicate: &Predicate, user: &User) -> bool {
    match predicate {
        Predicate::Contains { column, needle } => {
            let value = match column {
                Column::FirstName => &user.first_name,
                Column::LastName => &user.last_name,
                Column::Nickname => &user.nickname,
                Column::Email => &user.email,
                Column::Country => &user.country,
            };
            value.to_lowercase().contains(&needle.to_lowercase())
        }
        Predicate::After(cursor) => user.sort_key() > (cursor.created_at, cursor.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(email: &str) -> UserFields {
        UserFields {
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            nickname: "alice".into(),
            password: "hunter2".into(),
            email: email.into(),
            country: "UK".into(),
        }
    }

    #[tokio::test]
    async fn update_of_missing_user_is_not_found_even_with_taken_email() {
        let store = InMemoryUserStore::new();
        store.create(&fields("taken@example.com")).await.unwrap();

        let err = store
            .update(Uuid::new_v4(), &fields("taken@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_to_taken_email_is_conflict() {
        let store = InMemoryUserStore::new();
        store.create(&fields("taken@example.com")).await.unwrap();
        let other = store.create(&fields("other@example.com")).await.unwrap();

        let err = store
            .update(other.id, &fields("taken@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }
}
