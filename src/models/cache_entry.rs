use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::CheckOutcome;

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub phone_number: String,
    /// 写入时间
    pub timestamp: DateTime<Utc>,
    pub payload: CheckOutcome,
}

impl CacheEntry {
    /// 在 `now` 时刻是否仍然有效：`now - timestamp < max_age_hours`
    ///
    /// 有效期超出 `Duration` 可表示的范围时视为永不过期
    pub fn is_valid_at(&self, max_age_hours: i64, now: DateTime<Utc>) -> bool {
        match Duration::try_hours(max_age_hours) {
            Some(max_age) => now.signed_duration_since(self.timestamp) < max_age,
            None => true,
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.timestamp)
    }
}
