use std::{env, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::types::{
    DEFAULT_LOCK_TIMEOUT, DEFAULT_PAGES, PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_DIRECTORY_ENTRY_SIZE,
    error::DatabaseError,
};

pub const ENV_PAGE_SIZE: &str = "LUMBUNG_PAGE_SIZE";
pub const ENV_NUM_PAGES: &str = "LUMBUNG_NUM_PAGES";
pub const ENV_LOCK_TIMEOUT_MS: &str = "LUMBUNG_LOCK_TIMEOUT_MS";

/// Sizing and timing knobs for one buffer pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferPoolConfig {
    /// Bytes per page, shared by every table of the catalog.
    pub page_size: usize,
    /// Maximum number of resident pages.
    pub num_pages: usize,
    /// How long a single `get_page` call may wait for its lock.
    pub lock_timeout: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            num_pages: DEFAULT_PAGES,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl BufferPoolConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_num_pages(mut self, num_pages: usize) -> Self {
        self.num_pages = num_pages;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Defaults, overridden by `LUMBUNG_*` environment variables when present.
    pub fn from_env() -> Result<Self, DatabaseError> {
        let mut config = Self::default();
        if let Some(page_size) = read_env::<usize>(ENV_PAGE_SIZE)? {
            config.page_size = page_size;
        }
        if let Some(num_pages) = read_env::<usize>(ENV_NUM_PAGES)? {
            config.num_pages = num_pages;
        }
        if let Some(millis) = read_env::<u64>(ENV_LOCK_TIMEOUT_MS)? {
            config.lock_timeout = Duration::from_millis(millis);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.num_pages == 0 {
            return Err(DatabaseError::InvalidConfig {
                details: "num_pages must be at least 1".to_string(),
            });
        }
        let min_page_size = PAGE_HEADER_SIZE + SLOT_DIRECTORY_ENTRY_SIZE + 1;
        if self.page_size < min_page_size || self.page_size > u16::MAX as usize {
            return Err(DatabaseError::InvalidConfig {
                details: format!(
                    "page_size must be between {} and {} bytes, got {}",
                    min_page_size,
                    u16::MAX,
                    self.page_size
                ),
            });
        }
        if self.lock_timeout.is_zero() {
            return Err(DatabaseError::InvalidConfig {
                details: "lock_timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

fn read_env<T: FromStr>(key: &str) -> Result<Option<T>, DatabaseError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DatabaseError::InvalidConfig {
                details: format!("{}={:?} is not a valid number", key, raw),
            }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(DatabaseError::InvalidConfig {
            details: format!("{} is not valid unicode", key),
        }),
    }
}
