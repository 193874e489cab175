//! 缓存后端接口

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// 缓存键前缀
pub const CACHE_KEY_PREFIX: &str = "phone-cache";

/// 号码对应的缓存键：`phone-cache-{号码}`
pub fn cache_key(phone_number: &str) -> String {
    format!("{}-{}", CACHE_KEY_PREFIX, phone_number)
}

/// 后端中保存的一条记录
///
/// `payload` 保持为原始 JSON，由上层决定能否解码，
/// 这样结构损坏的记录也能被读出来再删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub phone_number: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "data")]
    pub payload: serde_json::Value,
}

/// 缓存后端
///
/// 所有后端语义一致：每个号码最多一条记录，写入为 upsert（后写者胜）。
/// 过期判断不在这里做，由 [`super::ResultCache`] 统一处理。
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &'static str;

    /// 是否真正存储数据
    fn is_enabled(&self) -> bool {
        true
    }

    async fn fetch(&self, phone_number: &str) -> CacheResult<Option<StoredRecord>>;

    async fn upsert(&self, record: &StoredRecord) -> CacheResult<()>;

    /// 删除一条记录，返回是否确实删除了
    async fn remove(&self, phone_number: &str) -> CacheResult<bool>;

    /// 删除写入时间早于 `cutoff` 的记录，返回删除数量
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> CacheResult<u64>;

    /// 记录总数；无法统计的后端返回 `None`
    async fn count(&self) -> CacheResult<Option<u64>>;

    /// 检查后端是否可达
    async fn ping(&self) -> CacheResult<()>;
}

/// 没有配置任何后端时使用：读永远未命中，写永远成功
pub struct DisabledCache;

#[async_trait]
impl CacheBackend for DisabledCache {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn fetch(&self, _phone_number: &str) -> CacheResult<Option<StoredRecord>> {
        Ok(None)
    }

    async fn upsert(&self, _record: &StoredRecord) -> CacheResult<()> {
        Ok(())
    }

    async fn remove(&self, _phone_number: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> CacheResult<u64> {
        Ok(0)
    }

    async fn count(&self) -> CacheResult<Option<u64>> {
        Ok(None)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_prefix() {
        assert_eq!(cache_key("98297150"), "phone-cache-98297150");
    }

    #[test]
    fn record_json_shape() {
        let record = StoredRecord {
            phone_number: "98297150".into(),
            timestamp: "2025-01-02T03:04:05Z".parse().unwrap(),
            payload: serde_json::json!({"status": "resolved"}),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["phoneNumber"], "98297150");
        assert_eq!(json["data"]["status"], "resolved");
        assert!(json["timestamp"].as_str().unwrap().starts_with("2025-01-02T03:04:05"));
    }
}
