use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::changelog::{ChangeType, ChangelogEntry};
use crate::config::PagingConfig;
use crate::error::ApiError;
use crate::state::AppState;

use super::dto::UserRequest;
use super::repo_types::{User, UserFields, UserFilters};
use super::search::{self, Page, PageRequest};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Check required fields and normalize the email.
pub fn validate(req: UserRequest) -> Result<UserFields, ApiError> {
    let required = [
        ("first_name", &req.first_name),
        ("last_name", &req.last_name),
        ("nickname", &req.nickname),
        ("password", &req.password),
        ("email", &req.email),
        ("country", &req.country),
    ];
    if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(ApiError::Validation(format!("{name} is required")));
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    Ok(UserFields {
        first_name: req.first_name,
        last_name: req.last_name,
        nickname: req.nickname,
        password: req.password,
        email,
        country: req.country,
    })
}

pub fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation("invalid user id".into()))
}

/// Absent or zero falls back to the default; anything above the maximum is clamped.
pub fn effective_page_size(requested: Option<u32>, paging: &PagingConfig) -> u32 {
    match requested {
        None | Some(0) => paging.default_page_size,
        Some(n) => n.min(paging.max_page_size),
    }
}

pub async fn create_user(state: &AppState, fields: UserFields) -> Result<User, ApiError> {
    let user = state.store.create(&fields).await?;
    info!(user_id = %user.id, "user created");

    state
        .changelog
        .publish_detached(ChangelogEntry::new(user.id, user.created_at, ChangeType::Post))
        .await;
    Ok(user)
}

pub async fn update_user(state: &AppState, id: Uuid, fields: UserFields) -> Result<User, ApiError> {
    let user = state.store.update(id, &fields).await?;
    info!(user_id = %user.id, "user updated");

    state
        .changelog
        .publish_detached(ChangelogEntry::new(user.id, user.updated_at, ChangeType::Put))
        .await;
    Ok(user)
}

pub async fn delete_user(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    state.store.delete(id).await?;
    info!(user_id = %id, "user deleted");

    state
        .changelog
        .publish_detached(ChangelogEntry::new(
            id,
            OffsetDateTime::now_utc(),
            ChangeType::Delete,
        ))
        .await;
    Ok(())
}

pub async fn search_users(
    state: &AppState,
    filters: &UserFilters,
    page: &PageRequest,
) -> Result<Page, ApiError> {
    Ok(search::search(state.store.as_ref(), filters, page).await?)
}

pub async fn check_readiness(state: &AppState) -> Result<(), ApiError> {
    state.store.ping().await.map_err(|e| {
        warn!(error = %e, "unable to reach user store");
        ApiError::Unavailable
    })
}
