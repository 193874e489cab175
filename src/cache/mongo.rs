//! MongoDB 缓存后端
//!
//! 集合 `phone_cache`，文档形如 `{phoneNumber, timestamp, data}`。
//! `timestamp` 上建 TTL 索引，与应用层的有效期一致。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::backend::{CacheBackend, StoredRecord};
use crate::error::{CacheError, CacheResult};

const BACKEND: &str = "mongodb";
const COLLECTION: &str = "phone_cache";

pub struct MongoCache {
    client: Client,
    collection: Collection<Document>,
    max_age_hours: i64,
    indexes: OnceCell<()>,
}

fn backend_error(e: mongodb::error::Error) -> CacheError {
    CacheError::backend(BACKEND, e)
}

impl MongoCache {
    /// 解析连接串并创建客户端（驱动内部惰性连接）
    ///
    /// # 参数
    /// - `url`: 连接串
    /// - `database`: 数据库名
    /// - `max_age_hours`: TTL 索引的过期时间
    pub async fn connect(url: &str, database: &str, max_age_hours: i64) -> CacheResult<Self> {
        let mut options = ClientOptions::parse(url).await.map_err(backend_error)?;
        options.app_name = Some("no_llame_check".to_string());
        options.connect_timeout = Some(Duration::from_secs(10));
        options.server_selection_timeout = Some(Duration::from_secs(10));

        let client = Client::with_options(options).map_err(backend_error)?;
        let collection = client.database(database).collection::<Document>(COLLECTION);

        Ok(Self {
            client,
            collection,
            max_age_hours,
            indexes: OnceCell::new(),
        })
    }

    async fn ensure_indexes(&self) -> CacheResult<()> {
        self.indexes
            .get_or_try_init(|| async {
                let ttl = IndexModel::builder()
                    .keys(doc! { "timestamp": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(ttl_index_duration(self.max_age_hours))
                            .build(),
                    )
                    .build();
                // 有效期改过之后旧索引会冲突，不影响读写
                if let Err(e) = self.collection.create_index(ttl).await {
                    warn!("⚠️ 创建 TTL 索引失败: {}", e);
                }

                let by_phone = IndexModel::builder()
                    .keys(doc! { "phoneNumber": 1 })
                    .build();
                self.collection
                    .create_index(by_phone)
                    .await
                    .map_err(backend_error)?;

                info!("📊 MongoDB 缓存索引已就绪");
                Ok::<(), CacheError>(())
            })
            .await
            .map(|_| ())
    }
}

/// TTL 索引的过期时长，超大的有效期按上限截断
fn ttl_index_duration(max_age_hours: i64) -> Duration {
    let hours = u64::try_from(max_age_hours.max(1)).unwrap_or(1);
    Duration::from_secs(hours.saturating_mul(3600))
}

/// `timestamp` 既可能是 BSON 日期，也可能是旧数据里的 ISO 字符串
fn read_timestamp(document: &Document) -> Option<DateTime<Utc>> {
    match document.get("timestamp")? {
        Bson::DateTime(dt) => DateTime::from_timestamp_millis(dt.timestamp_millis()),
        Bson::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

#[async_trait]
impl CacheBackend for MongoCache {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn fetch(&self, phone_number: &str) -> CacheResult<Option<StoredRecord>> {
        self.ensure_indexes().await?;

        let Some(document) = self
            .collection
            .find_one(doc! { "phoneNumber": phone_number })
            .sort(doc! { "timestamp": -1 })
            .await
            .map_err(backend_error)?
        else {
            return Ok(None);
        };

        let timestamp = read_timestamp(&document)
            .ok_or_else(|| CacheError::corrupt(BACKEND, phone_number, "timestamp 缺失或格式错误"))?;
        let data = document
            .get_document("data")
            .map_err(|e| CacheError::corrupt(BACKEND, phone_number, e))?;
        let payload: serde_json::Value = bson::from_document(data.clone())
            .map_err(|e| CacheError::corrupt(BACKEND, phone_number, e))?;

        Ok(Some(StoredRecord {
            phone_number: phone_number.to_string(),
            timestamp,
            payload,
        }))
    }

    async fn upsert(&self, record: &StoredRecord) -> CacheResult<()> {
        self.ensure_indexes().await?;

        let data = bson::to_document(&record.payload).map_err(|e| CacheError::backend(BACKEND, e))?;
        let replacement = doc! {
            "phoneNumber": record.phone_number.as_str(),
            "timestamp": bson::DateTime::from_millis(record.timestamp.timestamp_millis()),
            "data": data,
        };

        self.collection
            .replace_one(doc! { "phoneNumber": record.phone_number.as_str() }, replacement)
            .upsert(true)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn remove(&self, phone_number: &str) -> CacheResult<bool> {
        let result = self
            .collection
            .delete_many(doc! { "phoneNumber": phone_number })
            .await
            .map_err(backend_error)?;
        Ok(result.deleted_count > 0)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> CacheResult<u64> {
        let result = self
            .collection
            .delete_many(doc! {
                "timestamp": { "$lt": bson::DateTime::from_millis(cutoff.timestamp_millis()) }
            })
            .await
            .map_err(backend_error)?;
        Ok(result.deleted_count)
    }

    async fn count(&self) -> CacheResult<Option<u64>> {
        let total = self
            .collection
            .count_documents(doc! {})
            .await
            .map_err(backend_error)?;
        Ok(Some(total))
    }

    async fn ping(&self) -> CacheResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
