//! MySQL 缓存后端
//!
//! 表 `phone_cache`，`phone_number` 唯一，写入使用 `ON DUPLICATE KEY UPDATE`。
//! 连接池惰性建立，表结构在第一次操作时创建。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tokio::sync::OnceCell;
use tracing::info;

use super::backend::{CacheBackend, StoredRecord};
use crate::error::{CacheError, CacheResult};

const BACKEND: &str = "mysql";

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS `phone_cache` (
    `id` BIGINT AUTO_INCREMENT PRIMARY KEY,
    `phone_number` VARCHAR(20) NOT NULL,
    `cache_data` LONGTEXT NOT NULL,
    `timestamp` DATETIME(3) NOT NULL,
    `created_at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    `updated_at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY `uk_phone_number` (`phone_number`),
    KEY `idx_timestamp` (`timestamp`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
"#;

/// MySQL 连接参数
#[derive(Debug, Clone)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

pub struct MySqlCache {
    pool: MySqlPool,
    schema: OnceCell<()>,
}

impl MySqlCache {
    /// 创建后端（不立即连接）
    pub fn new(settings: &MySqlSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);

        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> CacheResult<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE_SQL)
                    .execute(&self.pool)
                    .await
                    .map_err(backend_error)?;
                info!("📊 MySQL 缓存表已就绪");
                Ok::<(), CacheError>(())
            })
            .await
            .map(|_| ())
    }
}

fn backend_error(e: sqlx::Error) -> CacheError {
    CacheError::backend(BACKEND, e)
}

#[async_trait]
impl CacheBackend for MySqlCache {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn fetch(&self, phone_number: &str) -> CacheResult<Option<StoredRecord>> {
        self.ensure_schema().await?;

        let row: Option<(String, NaiveDateTime)> = sqlx::query_as(
            "SELECT `cache_data`, `timestamp` FROM `phone_cache` WHERE `phone_number` = ? LIMIT 1",
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        let Some((cache_data, timestamp)) = row else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&cache_data)
            .map_err(|e| CacheError::corrupt(BACKEND, phone_number, e))?;

        Ok(Some(StoredRecord {
            phone_number: phone_number.to_string(),
            timestamp: timestamp.and_utc(),
            payload,
        }))
    }

    async fn upsert(&self, record: &StoredRecord) -> CacheResult<()> {
        self.ensure_schema().await?;

        let cache_data = serde_json::to_string(&record.payload)
            .map_err(|e| CacheError::backend(BACKEND, e))?;

        sqlx::query(
            "INSERT INTO `phone_cache` (`phone_number`, `cache_data`, `timestamp`) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE `cache_data` = VALUES(`cache_data`), `timestamp` = VALUES(`timestamp`)",
        )
        .bind(&record.phone_number)
        .bind(cache_data)
        .bind(record.timestamp.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn remove(&self, phone_number: &str) -> CacheResult<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM `phone_cache` WHERE `phone_number` = ?")
            .bind(phone_number)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> CacheResult<u64> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM `phone_cache` WHERE `timestamp` < ?")
            .bind(cutoff.naive_utc())
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> CacheResult<Option<u64>> {
        self.ensure_schema().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM `phone_cache`")
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(Some(total.max(0) as u64))
    }

    async fn ping(&self) -> CacheResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}
