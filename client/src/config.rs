use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use board_common::api::MAX_PAGE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("page_size must be between 1 and {max}, got {0}", max = MAX_PAGE)]
    PageSize(u64),
    #[error("resync_count must be between 1 and {max}, got {0}", max = MAX_PAGE)]
    ResyncCount(u64),
}

/// Tuning for a [`BoardStore`](crate::store::BoardStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Messages fetched per page; also the "probably more" threshold while
    /// the total count is unknown.
    pub page_size: u64,
    /// Messages refetched from offset 0 after a confirmed post.
    pub resync_count: u64,
    /// Limit on each read or submission. `None` waits forever.
    #[serde(with = "opt_millis")]
    pub call_timeout: Option<Duration>,
    /// Limit on waiting for a transaction to be confirmed.
    #[serde(with = "opt_millis")]
    pub confirmation_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            resync_count: 100,
            call_timeout: Some(Duration::from_secs(30)),
            confirmation_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl StoreConfig {
    /// Rejects windows a node would refuse to serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PAGE).contains(&self.page_size) {
            return Err(ConfigError::PageSize(self.page_size));
        }
        if !(1..=MAX_PAGE).contains(&self.resync_count) {
            return Err(ConfigError::ResyncCount(self.resync_count));
        }
        Ok(())
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&super::millis(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
