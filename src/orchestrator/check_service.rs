//! 单个号码的查询编排
//!
//! 校验 → 读缓存 → 会话协议 → 写缓存。任何失败都体现在返回的
//! [`CheckResponse`] 里，不会向上抛出。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::models::{normalize, CaptchaStats, CheckOutcome, NormalizedPhone};
use crate::portal::SessionProtocol;

/// 一次查询的完整返回
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    /// 用户输入
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<NormalizedPhone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_check: Option<CheckOutcome>,
    /// 本次会话的验证码计数；命中缓存时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<CaptchaStats>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    pub time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResponse {
    fn failure(
        input: &str,
        phone_number: Option<NormalizedPhone>,
        error: String,
        started: Instant,
    ) -> Self {
        Self {
            success: false,
            input: input.to_string(),
            phone_number,
            registry_check: None,
            captcha: None,
            from_cache: false,
            cached_at: None,
            time_ms: elapsed_ms(started),
            error: Some(error),
        }
    }

    /// 查询任务本身异常退出（panic、被取消）时的占位结果
    pub(crate) fn task_failed(input: &str, reason: impl std::fmt::Display, started: Instant) -> Self {
        Self::failure(input, None, format!("task failed: {}", reason), started)
    }

    /// 号码是否在登记库中；未知或失败时为 `None`
    pub fn is_in_record(&self) -> Option<bool> {
        self.registry_check.as_ref().and_then(CheckOutcome::is_in_record)
    }
}

/// 查询服务，可在并发任务之间 clone
#[derive(Clone)]
pub struct PhoneCheckService {
    protocol: Arc<SessionProtocol>,
    cache: ResultCache,
}

impl PhoneCheckService {
    pub fn new(protocol: Arc<SessionProtocol>, cache: ResultCache) -> Self {
        Self { protocol, cache }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// 查询一个号码
    ///
    /// # 参数
    /// - `input`: 用户输入的号码（任意格式）
    /// - `ignore_cache`: 跳过缓存读取；确定的结果仍会写入缓存
    pub async fn check(&self, input: &str, ignore_cache: bool) -> CheckResponse {
        let started = Instant::now();

        let phone = match normalize(input) {
            Ok(phone) => phone,
            Err(e) => {
                warn!("⚠️ 号码无效 '{}': {}", input, e);
                return CheckResponse::failure(input, None, e.to_string(), started);
            }
        };
        let number = phone.normalized.clone();

        if !ignore_cache {
            if let Some(entry) = self.cache.get(&number).await {
                info!("[号码 {}] 💾 使用缓存结果 ({})", number, entry.timestamp);
                return CheckResponse {
                    success: true,
                    input: input.to_string(),
                    phone_number: Some(phone),
                    registry_check: Some(entry.payload),
                    captcha: None,
                    from_cache: true,
                    cached_at: Some(entry.timestamp),
                    time_ms: elapsed_ms(started),
                    error: None,
                };
            }
        }

        let report = match self.protocol.run(&number).await {
            Ok(report) => report,
            Err(e) => return CheckResponse::failure(input, Some(phone), e.to_string(), started),
        };

        self.cache.set(&number, &report.outcome).await;

        let error = report.outcome.error().map(str::to_string);
        CheckResponse {
            success: error.is_none(),
            input: input.to_string(),
            phone_number: Some(phone),
            registry_check: Some(report.outcome),
            captcha: Some(report.captcha),
            from_cache: false,
            cached_at: None,
            time_ms: elapsed_ms(started),
            error,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
