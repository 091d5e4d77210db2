use tracing::debug;

use super::cursor::{Cursor, CursorError};
use super::filters::build_predicates;
use super::repo::{StoreError, UserStore};
use super::repo_types::{User, UserFilters};

/// One page request. An empty or absent token starts from the beginning.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub token: Option<String>,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub users: Vec<User>,
    /// Empty when this is the last page.
    pub next_page_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    InvalidToken(#[from] CursorError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch one page ordered by `(created_at, id)`.
///
/// A full page always yields a next token, even when nothing is left; the
/// caller then pays one extra request that comes back empty.
pub async fn search(
    store: &dyn UserStore,
    filters: &UserFilters,
    page: &PageRequest,
) -> Result<Page, SearchError> {
    let cursor = match page.token.as_deref() {
        Some(token) if !token.is_empty() => Some(Cursor::decode(token).map_err(|e| {
            debug!(error = %e, "decoding page token");
            e
        })?),
        _ => None,
    };

    let predicates = build_predicates(filters, cursor.as_ref());
    let users = store.fetch_page(&predicates, page.page_size).await?;

    let next_page_token = match users.last() {
        Some(last) if users.len() >= page.page_size as usize => Cursor::from(last).encode(),
        _ => String::new(),
    };

    Ok(Page {
        users,
        next_page_token,
    })
}
