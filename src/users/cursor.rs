//! Opaque keyset cursor: `base64url("<created_at>|<id>")`.
//!
//! The timestamp is always rendered in UTC with nine fractional digits so the
//! text form sorts the same way the instants do. Tokens are obfuscated, not
//! signed: anyone can mint one, and the worst a forged token does is move the
//! starting point of a scan.

use time::{
    format_description::FormatItem, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};
use tracing::warn;
use uuid::Uuid;

use super::repo_types::User;

const DELIMITER: char = '|';

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid page token: invalid base64url encoding")]
    InvalidBase64,
    #[error("invalid page token: payload is not utf-8")]
    InvalidUtf8,
    #[error("invalid page token: missing delimiter")]
    MissingDelimiter,
    #[error("invalid page token: malformed timestamp")]
    InvalidTimestamp,
    #[error("invalid page token: malformed identifier")]
    InvalidIdentifier,
}

/// Last-seen sort key of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(id: Uuid, created_at: OffsetDateTime) -> Self {
        Self { created_at, id }
    }

    pub fn encode(&self) -> String {
        let ts = format_timestamp(self.created_at);
        let payload = format!("{ts}{DELIMITER}{}", self.id);
        base64_url::encode(payload.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = base64_url::decode(token).map_err(|_| CursorError::InvalidBase64)?;
        let payload = String::from_utf8(bytes).map_err(|_| CursorError::InvalidUtf8)?;
        let (ts, id) = payload
            .split_once(DELIMITER)
            .ok_or(CursorError::MissingDelimiter)?;

        let created_at = PrimitiveDateTime::parse(ts, TIMESTAMP_FORMAT)
            .map_err(|_| CursorError::InvalidTimestamp)?
            .assume_utc();
        // The identifier segment is everything after the first delimiter, so a
        // second delimiter ends up here and fails the uuid parse.
        let id = Uuid::parse_str(id).map_err(|_| CursorError::InvalidIdentifier)?;

        Ok(Self { created_at, id })
    }
}

impl From<&User> for Cursor {
    fn from(user: &User) -> Self {
        let (created_at, id) = user.sort_key();
        Self { created_at, id }
    }
}

/// Signed years format fine (`-0001-...`), so failure here needs a year
/// beyond what `time` can represent without `large-dates`. The fallback token
/// will not decode; it is logged so a bad row is visible.
fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|e| {
            warn!(error = %e, %ts, "page token timestamp out of range");
            ts.unix_timestamp_nanos().to_string()
        })
}

// base64url helpers (no padding on encode, padding tolerated on decode)
mod base64_url {
    use base64::Engine;

    pub fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))
    }
}
