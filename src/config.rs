//! 程序配置
//!
//! 配置来源按优先级从低到高：内置默认值 → TOML 配置文件 → 环境变量。

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 缓存有效期上限（一百年）
pub const MAX_CACHE_AGE_HOURS: i64 = 24 * 365 * 100;

/// 程序配置
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // --- 门户配置 ---
    /// 门户站点 origin（scheme + host），测试时指向 mock 服务
    pub portal_origin: String,
    /// 普通请求超时（秒）
    pub request_timeout_secs: u64,
    /// 宽松 TLS 回退请求超时（秒）
    pub fallback_timeout_secs: u64,
    /// 外层验证码尝试次数
    pub captcha_outer_attempts: u32,
    /// 每轮验证码的识别重试次数
    pub captcha_inner_attempts: u32,
    /// 识别重试之间的等待（毫秒）
    pub captcha_backoff_ms: u64,

    // --- OCR 配置 ---
    /// 远程 OCR 服务地址，设置后替代本地 tesseract
    pub ocr_api_url: Option<String>,
    /// 本地 tesseract 可执行文件
    pub tesseract_path: String,
    /// OCR 请求超时（秒）
    pub ocr_timeout_secs: u64,
    /// 同时进行的 OCR 识别数量
    pub ocr_workers: usize,

    // --- 批处理配置 ---
    /// 同时查询的号码数量
    pub max_concurrent_checks: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,

    // --- 缓存配置 ---
    /// 是否启用缓存
    pub cache_enabled: bool,
    /// 缓存有效期（小时）
    pub cache_max_age_hours: i64,
    pub mysql_host: Option<String>,
    pub mysql_port: u16,
    pub mysql_user: Option<String>,
    pub mysql_password: Option<String>,
    pub mysql_database: Option<String>,
    pub mongodb_url: Option<String>,
    pub mongodb_database: String,
    pub blob_token: Option<String>,
    pub blob_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_origin: "https://tramites.ursec.gub.uy".to_string(),
            request_timeout_secs: 10,
            fallback_timeout_secs: 15,
            captcha_outer_attempts: 10,
            captcha_inner_attempts: 3,
            captcha_backoff_ms: 1000,
            ocr_api_url: None,
            tesseract_path: "tesseract".to_string(),
            ocr_timeout_secs: 30,
            ocr_workers: 4,
            max_concurrent_checks: 4,
            verbose_logging: false,
            cache_enabled: true,
            cache_max_age_hours: 24,
            mysql_host: None,
            mysql_port: 3306,
            mysql_user: None,
            mysql_password: None,
            mysql_database: None,
            mongodb_url: None,
            mongodb_database: "no_llamar_cache".to_string(),
            blob_token: None,
            blob_base_url: "https://blob.vercel-storage.com".to_string(),
        }
    }
}

/// 选中的缓存后端及其连接参数
#[derive(Clone, Debug, PartialEq)]
pub enum CacheBackendKind {
    MySql {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
    Mongo {
        url: String,
        database: String,
    },
    Blob {
        base_url: String,
        token: String,
    },
    Disabled,
}

/// 会话协议引擎使用的参数
#[derive(Clone, Debug)]
pub struct ProtocolSettings {
    pub origin: String,
    pub request_timeout: Duration,
    pub fallback_timeout: Duration,
    pub outer_attempts: u32,
    pub inner_attempts: u32,
    pub backoff: Duration,
}

impl Config {
    /// 读取可选的 TOML 文件，再叠加环境变量
    ///
    /// # 参数
    /// - `path`: 配置文件路径，`None` 时只使用默认值和环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides().validated()
    }

    /// 检查取值范围：缓存有效期必须为正，且不超过 `MAX_CACHE_AGE_HOURS`
    fn validated(self) -> Result<Self, ConfigError> {
        if !(1..=MAX_CACHE_AGE_HOURS).contains(&self.cache_max_age_hours) {
            return Err(ConfigError::InvalidValue {
                key: "cache_max_age_hours",
                reason: format!(
                    "{} 不在 1..={} 范围内",
                    self.cache_max_age_hours, MAX_CACHE_AGE_HOURS
                ),
            });
        }
        Ok(self)
    }

    /// 从 TOML 文件读取，缺失的键取默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })
    }

    fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            portal_origin: env_string("PORTAL_ORIGIN").unwrap_or(base.portal_origin),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(base.request_timeout_secs),
            fallback_timeout_secs: env_parse("FALLBACK_TIMEOUT_SECS").unwrap_or(base.fallback_timeout_secs),
            captcha_outer_attempts: env_parse("CAPTCHA_OUTER_ATTEMPTS").unwrap_or(base.captcha_outer_attempts),
            captcha_inner_attempts: env_parse("CAPTCHA_INNER_ATTEMPTS").unwrap_or(base.captcha_inner_attempts),
            captcha_backoff_ms: env_parse("CAPTCHA_BACKOFF_MS").unwrap_or(base.captcha_backoff_ms),
            ocr_api_url: env_string("OCR_API_URL").or(base.ocr_api_url),
            tesseract_path: env_string("TESSERACT_PATH").unwrap_or(base.tesseract_path),
            ocr_timeout_secs: env_parse("OCR_TIMEOUT_SECS").unwrap_or(base.ocr_timeout_secs),
            ocr_workers: env_parse("OCR_WORKERS").unwrap_or(base.ocr_workers),
            max_concurrent_checks: env_parse("MAX_CONCURRENT_CHECKS").unwrap_or(base.max_concurrent_checks),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
            cache_enabled: env_parse("CACHE_ENABLED").unwrap_or(base.cache_enabled),
            cache_max_age_hours: env_parse("CACHE_MAX_AGE_HOURS").unwrap_or(base.cache_max_age_hours),
            mysql_host: env_string("MYSQL_HOST").or(base.mysql_host),
            mysql_port: env_parse("MYSQL_PORT").unwrap_or(base.mysql_port),
            mysql_user: env_string("MYSQL_USER").or(base.mysql_user),
            mysql_password: env_string("MYSQL_PASSWORD").or(base.mysql_password),
            mysql_database: env_string("MYSQL_DATABASE").or(base.mysql_database),
            mongodb_url: env_string("MONGODB_URL")
                .or_else(|| env_string("MONGO_URL"))
                .or(base.mongodb_url),
            mongodb_database: env_string("MONGODB_DATABASE").unwrap_or(base.mongodb_database),
            blob_token: env_string("BLOB_READ_WRITE_TOKEN").or(base.blob_token),
            blob_base_url: env_string("BLOB_BASE_URL").unwrap_or(base.blob_base_url),
        }
    }

    /// 按 MySQL > MongoDB > Blob > 禁用 的顺序选择缓存后端
    pub fn cache_backend(&self) -> CacheBackendKind {
        if !self.cache_enabled {
            return CacheBackendKind::Disabled;
        }
        if let (Some(host), Some(user), Some(database)) =
            (&self.mysql_host, &self.mysql_user, &self.mysql_database)
        {
            return CacheBackendKind::MySql {
                host: host.clone(),
                port: self.mysql_port,
                user: user.clone(),
                password: self.mysql_password.clone().unwrap_or_default(),
                database: database.clone(),
            };
        }
        if let Some(url) = &self.mongodb_url {
            return CacheBackendKind::Mongo {
                url: url.clone(),
                database: self.mongodb_database.clone(),
            };
        }
        if let Some(token) = &self.blob_token {
            return CacheBackendKind::Blob {
                base_url: self.blob_base_url.clone(),
                token: token.clone(),
            };
        }
        CacheBackendKind::Disabled
    }

    pub fn protocol_settings(&self) -> ProtocolSettings {
        ProtocolSettings {
            origin: self.portal_origin.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            fallback_timeout: Duration::from_secs(self.fallback_timeout_secs),
            outer_attempts: self.captcha_outer_attempts,
            inner_attempts: self.captcha_inner_attempts,
            backoff: Duration::from_millis(self.captcha_backoff_ms),
        }
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_keys_are_optional() {
        let config = Config::from_toml_str(
            r#"
            portal_origin = "http://127.0.0.1:9000"
            captcha_backoff_ms = 0
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.portal_origin, "http://127.0.0.1:9000");
        assert_eq!(config.captcha_backoff_ms, 0);
        assert_eq!(config.captcha_outer_attempts, 10);
        assert_eq!(config.captcha_inner_attempts, 3);
        assert_eq!(config.cache_max_age_hours, 24);
    }

    #[test]
    fn toml_type_errors_are_reported() {
        let err = Config::from_toml_str("ocr_workers = \"many\"", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }

    #[test]
    fn cache_age_out_of_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["0", "-5", "9223372036854775807"] {
            let path = dir.path().join("ttl.toml");
            std::fs::write(&path, format!("cache_max_age_hours = {bad}")).unwrap();
            let err = Config::load(Some(&path)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { key: "cache_max_age_hours", .. }),
                "{bad}: {err}"
            );
        }

        let path = dir.path().join("ok.toml");
        std::fs::write(&path, "cache_max_age_hours = 1").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().cache_max_age_hours, 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_toml_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn mysql_wins_over_other_backends() {
        let config = Config {
            mysql_host: Some("db".into()),
            mysql_user: Some("root".into()),
            mysql_database: Some("cache".into()),
            mongodb_url: Some("mongodb://localhost".into()),
            blob_token: Some("tok".into()),
            ..Config::default()
        };
        assert!(matches!(config.cache_backend(), CacheBackendKind::MySql { .. }));
    }

    #[test]
    fn incomplete_mysql_falls_through_to_mongo() {
        let config = Config {
            mysql_host: Some("db".into()),
            mongodb_url: Some("mongodb://localhost".into()),
            ..Config::default()
        };
        assert_eq!(
            config.cache_backend(),
            CacheBackendKind::Mongo {
                url: "mongodb://localhost".into(),
                database: "no_llamar_cache".into(),
            }
        );
    }

    #[test]
    fn nothing_configured_disables_cache() {
        assert_eq!(Config::default().cache_backend(), CacheBackendKind::Disabled);

        let switched_off = Config {
            blob_token: Some("tok".into()),
            cache_enabled: false,
            ..Config::default()
        };
        assert_eq!(switched_off.cache_backend(), CacheBackendKind::Disabled);
    }
}
