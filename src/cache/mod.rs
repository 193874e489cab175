//! 可插拔结果缓存
//!
//! ## 职责
//!
//! 按号码缓存确定的查询结果，减少对门户的重复访问。缓存是尽力而为的：
//! 任何后端故障都只会变成未命中，不会让查询失败。
//!
//! ## 模块划分
//!
//! - `backend` - 后端接口、记录结构、禁用后端
//! - `policy` - `ResultCache`：过期判断、写入过滤、错误吸收
//! - `mysql` / `mongo` / `blob` / `memory` - 各个后端实现
//!
//! 后端在启动时由 [`create_cache`] 按配置选择一次：MySQL > MongoDB > 对象存储 > 禁用。

pub mod backend;
pub mod blob;
pub mod memory;
pub mod mongo;
pub mod mysql;
pub mod policy;

use std::sync::Arc;

use tracing::{info, warn};

pub use backend::{cache_key, CacheBackend, DisabledCache, StoredRecord};
pub use blob::BlobCache;
pub use memory::MemoryCache;
pub use mongo::MongoCache;
pub use mysql::{MySqlCache, MySqlSettings};
pub use policy::{CacheStats, ResultCache};

use crate::config::{CacheBackendKind, Config};

/// 按配置创建缓存
///
/// 后端构建失败（例如连接串无效）时退回禁用缓存，只记录警告。
pub async fn create_cache(config: &Config) -> ResultCache {
    let max_age_hours = config.cache_max_age_hours;

    let backend: Arc<dyn CacheBackend> = match config.cache_backend() {
        CacheBackendKind::MySql {
            host,
            port,
            user,
            password,
            database,
        } => Arc::new(MySqlCache::new(&MySqlSettings {
            host,
            port,
            user,
            password,
            database,
        })),
        CacheBackendKind::Mongo { url, database } => {
            match MongoCache::connect(&url, &database, max_age_hours).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!("⚠️ MongoDB 缓存初始化失败，禁用缓存: {}", e);
                    Arc::new(DisabledCache)
                }
            }
        }
        CacheBackendKind::Blob { base_url, token } => match BlobCache::new(&base_url, token) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("⚠️ 对象存储缓存初始化失败，禁用缓存: {}", e);
                Arc::new(DisabledCache)
            }
        },
        CacheBackendKind::Disabled => Arc::new(DisabledCache),
    };

    info!(
        "💾 缓存后端: {} (有效期 {} 小时)",
        backend.name(),
        max_age_hours
    );
    ResultCache::new(backend, max_age_hours)
}
