//! HTTP 对象存储缓存后端
//!
//! 每个号码一个对象：`{base}/phone-cache-{号码}.json`，Bearer 令牌鉴权。
//! 对象存储不支持列举，因此无法统计条目数，也无法批量清理过期记录。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::backend::{cache_key, CacheBackend, StoredRecord};
use crate::error::{CacheError, CacheResult};

const BACKEND: &str = "blob";

pub struct BlobCache {
    client: Client,
    base_url: String,
    token: String,
}

fn backend_error(e: reqwest::Error) -> CacheError {
    CacheError::backend(BACKEND, e)
}

impl BlobCache {
    pub fn new(base_url: &str, token: impl Into<String>) -> CacheResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(backend_error)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn object_url(&self, phone_number: &str) -> String {
        format!("{}/{}.json", self.base_url, cache_key(phone_number))
    }
}

#[async_trait]
impl CacheBackend for BlobCache {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn fetch(&self, phone_number: &str) -> CacheResult<Option<StoredRecord>> {
        let url = self.object_url(phone_number);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(backend_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CacheError::backend(
                BACKEND,
                format!("GET {} 返回 {}", url, response.status()),
            ));
        }

        let body = response.text().await.map_err(backend_error)?;
        let record: StoredRecord = serde_json::from_str(&body)
            .map_err(|e| CacheError::corrupt(BACKEND, cache_key(phone_number), e))?;
        Ok(Some(record))
    }

    async fn upsert(&self, record: &StoredRecord) -> CacheResult<()> {
        let url = self.object_url(&record.phone_number);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await
            .map_err(backend_error)?;

        if !response.status().is_success() {
            return Err(CacheError::backend(
                BACKEND,
                format!("PUT {} 返回 {}", url, response.status()),
            ));
        }
        Ok(())
    }

    async fn remove(&self, phone_number: &str) -> CacheResult<bool> {
        let url = self.object_url(phone_number);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(backend_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(CacheError::backend(
                BACKEND,
                format!("DELETE {} 返回 {}", url, status),
            )),
        }
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> CacheResult<u64> {
        Ok(0)
    }

    async fn count(&self) -> CacheResult<Option<u64>> {
        Ok(None)
    }

    async fn ping(&self) -> CacheResult<()> {
        let response = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(backend_error)?;

        if response.status().is_server_error() {
            return Err(CacheError::backend(
                BACKEND,
                format!("存储服务返回 {}", response.status()),
            ));
        }
        Ok(())
    }
}
