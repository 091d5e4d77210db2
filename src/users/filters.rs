use super::{cursor::Cursor, repo_types::UserFilters};

/// Searchable text columns, in the order their predicates are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    FirstName,
    LastName,
    Nickname,
    Email,
    Country,
}

impl Column {
    pub fn as_sql(self) -> &'static str {
        match self {
            Column::FirstName => "first_name",
            Column::LastName => "last_name",
            Column::Nickname => "nickname",
            Column::Email => "email",
            Column::Country => "country",
        }
    }
}

/// One conjunct of a search. Values are data only; the storage layer binds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring match.
    Contains { column: Column, needle: String },
    /// `(created_at, id) > (cursor.created_at, cursor.id)`
    After(Cursor),
}

pub fn build_predicates(filters: &UserFilters, cursor: Option<&Cursor>) -> Vec<Predicate> {
    let fields = [
        (Column::FirstName, &filters.first_name),
        (Column::LastName, &filters.last_name),
        (Column::Nickname, &filters.nickname),
        (Column::Email, &filters.email),
        (Column::Country, &filters.country),
    ];

    let mut predicates: Vec<Predicate> = fields
        .into_iter()
        .filter_map(|(column, value)| match value.as_deref() {
            Some(v) if !v.is_empty() => Some(Predicate::Contains {
                column,
                needle: v.to_string(),
            }),
            _ => None,
        })
        .collect();

    if let Some(cursor) = cursor {
        predicates.push(Predicate::After(*cursor));
    }
    predicates
}

/// `ILIKE` pattern matching `needle` literally anywhere in the value.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
