use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangelogConfig {
    pub kafka_brokers: Option<String>,
    pub topic: String,
    pub timeout_secs: u64,
}

impl ChangelogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub paging: PagingConfig,
    pub changelog: ChangelogConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let paging = PagingConfig {
            default_page_size: env_or("DEFAULT_PAGE_SIZE", 10),
            max_page_size: env_or("MAX_PAGE_SIZE", 100),
        };
        let changelog = ChangelogConfig {
            kafka_brokers: std::env::var("KAFKA_BROKERS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            topic: std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "users-changelog".into()),
            timeout_secs: env_or("CHANGELOG_TIMEOUT_SECS", 10),
        };
        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            paging,
            changelog,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("USER_DIRECTORY_TEST_PAGE", "not-a-number");
        assert_eq!(env_or::<u32>("USER_DIRECTORY_TEST_PAGE", 7), 7);
        std::env::set_var("USER_DIRECTORY_TEST_PAGE", "25");
        assert_eq!(env_or::<u32>("USER_DIRECTORY_TEST_PAGE", 7), 25);
        std::env::remove_var("USER_DIRECTORY_TEST_PAGE");
    }

    #[test]
    fn changelog_timeout_is_seconds() {
        let cfg = ChangelogConfig {
            kafka_brokers: None,
            topic: "users-changelog".into(),
            timeout_secs: 3,
        };
        assert_eq!(cfg.timeout(), Duration::from_secs(3));
    }
}
