//! 缓存策略
//!
//! 所有后端共用的规则都在这里：
//! - 只缓存确定的结果
//! - 读取时判断过期，过期或损坏的记录视为未命中并尽量删除
//! - 后端错误只记日志，永远不影响查询本身

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::backend::{cache_key, CacheBackend, DisabledCache, StoredRecord};
use crate::error::CacheError;
use crate::models::{CacheEntry, CheckOutcome};

/// 缓存状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    pub backend_reachable: bool,
    pub max_age_hours: i64,
    pub backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_entries: Option<u64>,
}

/// 带策略的结果缓存，可在并发查询间共享
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    max_age_hours: i64,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, max_age_hours: i64) -> Self {
        Self {
            backend,
            max_age_hours,
        }
    }

    /// 不做任何缓存
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledCache), 24)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn max_age_hours(&self) -> i64 {
        self.max_age_hours
    }

    /// 缓存键
    pub fn generate_key(&self, phone_number: &str) -> String {
        cache_key(phone_number)
    }

    /// 条目是否在有效期内；`max_age_hours` 为 `None` 时使用配置值
    pub fn is_valid(&self, entry: &CacheEntry, max_age_hours: Option<i64>) -> bool {
        entry.is_valid_at(max_age_hours.unwrap_or(self.max_age_hours), Utc::now())
    }

    /// 读取缓存
    ///
    /// 未命中、过期、记录损坏、后端故障都返回 `None`。
    pub async fn get(&self, phone_number: &str) -> Option<CacheEntry> {
        if !self.backend.is_enabled() {
            return None;
        }

        let record = match self.backend.fetch(phone_number).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("[号码 {}] 缓存未命中", phone_number);
                return None;
            }
            Err(e @ CacheError::Corrupt { .. }) => {
                warn!("[号码 {}] ⚠️ {}，删除该记录", phone_number, e);
                self.evict(phone_number).await;
                return None;
            }
            Err(e) => {
                warn!("[号码 {}] ⚠️ 读取缓存失败，按未命中处理: {}", phone_number, e);
                return None;
            }
        };

        let entry = match decode(record) {
            Some(entry) => entry,
            None => {
                warn!("[号码 {}] ⚠️ 缓存记录结构无效，删除该记录", phone_number);
                self.evict(phone_number).await;
                return None;
            }
        };

        if !self.is_valid(&entry, None) {
            info!(
                "[号码 {}] 缓存已过期 ({} 小时前写入)，删除该记录",
                phone_number,
                entry.age().num_hours()
            );
            self.evict(phone_number).await;
            return None;
        }

        debug!("[号码 {}] 💾 命中缓存", phone_number);
        Some(entry)
    }

    /// 写入缓存
    ///
    /// 非确定结果（结构错误、未决）直接跳过。
    ///
    /// # 返回
    /// 是否实际写入
    pub async fn set(&self, phone_number: &str, outcome: &CheckOutcome) -> bool {
        if !self.backend.is_enabled() {
            return false;
        }
        if !outcome.is_cacheable() {
            debug!("[号码 {}] 结果不确定，不写入缓存", phone_number);
            return false;
        }

        let payload = match serde_json::to_value(outcome) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("[号码 {}] ⚠️ 结果序列化失败: {}", phone_number, e);
                return false;
            }
        };
        let record = StoredRecord {
            phone_number: phone_number.to_string(),
            timestamp: Utc::now(),
            payload,
        };

        match self.backend.upsert(&record).await {
            Ok(()) => {
                debug!("[号码 {}] 💾 已写入缓存 ({})", phone_number, self.backend.name());
                true
            }
            Err(e) => {
                warn!("[号码 {}] ⚠️ 写入缓存失败: {}", phone_number, e);
                false
            }
        }
    }

    /// 删除一个号码的缓存
    pub async fn clear(&self, phone_number: &str) -> bool {
        match self.backend.remove(phone_number).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("[号码 {}] ⚠️ 删除缓存失败: {}", phone_number, e);
                false
            }
        }
    }

    /// 删除所有过期记录，返回删除数量
    pub async fn clear_expired(&self) -> u64 {
        // 有效期无法表示成时间点时没有任何记录会过期
        let Some(cutoff) = Duration::try_hours(self.max_age_hours)
            .and_then(|max_age| Utc::now().checked_sub_signed(max_age))
        else {
            return 0;
        };
        match self.backend.purge_older_than(cutoff).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!("⚠️ 清理过期缓存失败: {}", e);
                0
            }
        }
    }

    pub async fn get_stats(&self) -> CacheStats {
        let backend_reachable = match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ 缓存后端不可达: {}", e);
                false
            }
        };
        let total_entries = if backend_reachable {
            self.backend.count().await.unwrap_or_else(|e| {
                warn!("⚠️ 统计缓存条目失败: {}", e);
                None
            })
        } else {
            None
        };

        CacheStats {
            enabled: self.backend.is_enabled(),
            backend_reachable,
            max_age_hours: self.max_age_hours,
            backend: self.backend.name(),
            total_entries,
        }
    }

    async fn evict(&self, phone_number: &str) {
        if let Err(e) = self.backend.remove(phone_number).await {
            warn!("[号码 {}] ⚠️ 删除无效缓存失败: {}", phone_number, e);
        }
    }
}

/// 解码记录；结果本身不可缓存的记录也视为无效
fn decode(record: StoredRecord) -> Option<CacheEntry> {
    let payload: CheckOutcome = serde_json::from_value(record.payload).ok()?;
    if !payload.is_cacheable() {
        return None;
    }
    Some(CacheEntry {
        phone_number: record.phone_number,
        timestamp: record.timestamp,
        payload,
    })
}
