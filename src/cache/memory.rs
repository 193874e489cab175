use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::backend::{CacheBackend, StoredRecord};
use crate::error::CacheResult;

/// 进程内缓存
///
/// 克隆后共享同一份数据；主要用于测试和单次批量运行。
#[derive(Clone, Default)]
pub struct MemoryCache {
    records: Arc<RwLock<HashMap<String, StoredRecord>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接读取存储内容，不经过任何策略
    pub async fn raw(&self, phone_number: &str) -> Option<StoredRecord> {
        self.records.read().await.get(phone_number).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, phone_number: &str) -> CacheResult<Option<StoredRecord>> {
        Ok(self.raw(phone_number).await)
    }

    async fn upsert(&self, record: &StoredRecord) -> CacheResult<()> {
        self.records
            .write()
            .await
            .insert(record.phone_number.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, phone_number: &str) -> CacheResult<bool> {
        Ok(self.records.write().await.remove(phone_number).is_some())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> CacheResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.timestamp >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn count(&self) -> CacheResult<Option<u64>> {
        Ok(Some(self.records.read().await.len() as u64))
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}
