//! 批量查询处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装各层资源并批量执行查询。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建 OCR 识别器、HTTP 客户端、缓存后端
//! 2. **并发控制**：使用 Semaphore 限制同时进行的查询数量
//! 3. **全局统计**：汇总所有号码的查询结果
//! 4. **缓存维护**：统计、删除单个号码、清理过期记录
//!
//! 每个号码的查询互不共享会话状态，只共享连接池、OCR 工作池和缓存。

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::{create_cache, CacheStats};
use crate::config::Config;
use crate::models::normalize;
use crate::ocr::create_resolver;
use crate::orchestrator::check_service::{CheckResponse, PhoneCheckService};
use crate::portal::SessionProtocol;
use crate::utils::logging::{log_startup, print_final_stats};
use crate::utils::CheckTally;

/// 应用主结构
pub struct App {
    config: Config,
    service: PhoneCheckService,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let resolver = create_resolver(&config)?;
        let protocol = SessionProtocol::from_config(&config, resolver)?;
        let cache = create_cache(&config).await;

        Ok(Self {
            service: PhoneCheckService::new(Arc::new(protocol), cache),
            config,
        })
    }

    /// 用已经组装好的服务创建（测试中注入脚本化的 OCR 引擎）
    pub fn with_service(config: Config, service: PhoneCheckService) -> Self {
        Self { config, service }
    }

    pub fn service(&self) -> &PhoneCheckService {
        &self.service
    }

    /// 批量查询
    ///
    /// # 返回
    /// 与输入顺序一致的查询结果，以及汇总统计
    pub async fn run(
        &self,
        numbers: &[String],
        ignore_cache: bool,
    ) -> Result<(Vec<CheckResponse>, CheckTally)> {
        let max_concurrent = self.config.max_concurrent_checks.max(1);
        log_startup(numbers.len(), max_concurrent, self.service.cache().backend_name());

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut handles = Vec::with_capacity(numbers.len());

        for number in numbers {
            let permit = semaphore.clone().acquire_owned().await?;
            let service = self.service.clone();
            let number = number.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                service.check(&number, ignore_cache).await
            });
            handles.push(handle);
        }

        let (responses, tally) = collect(numbers, handles, started).await;

        print_final_stats(&tally);
        Ok((responses, tally))
    }

    /// 缓存状态
    pub async fn cache_stats(&self) -> CacheStats {
        self.service.cache().get_stats().await
    }

    /// 删除一个号码的缓存
    pub async fn cache_clear(&self, input: &str) -> Result<bool> {
        let phone = normalize(input)?;
        let removed = self.service.cache().clear(&phone.normalized).await;
        info!("[号码 {}] 🗑️ 删除缓存: {}", phone.normalized, removed);
        Ok(removed)
    }

    /// 清理所有过期缓存
    pub async fn cache_purge(&self) -> u64 {
        let purged = self.service.cache().clear_expired().await;
        info!("🧹 已清理 {} 条过期缓存", purged);
        purged
    }
}

/// 按输入顺序等待所有任务；异常退出的任务也占一个位置，记为失败
async fn collect(
    numbers: &[String],
    handles: Vec<JoinHandle<CheckResponse>>,
    started: Instant,
) -> (Vec<CheckResponse>, CheckTally) {
    let mut responses = Vec::with_capacity(handles.len());
    let mut tally = CheckTally::default();

    for (number, handle) in numbers.iter().zip(handles) {
        let response = match handle.await {
            Ok(response) => response,
            Err(e) => {
                error!("[号码 {}] ❌ 任务执行失败: {}", number, e);
                CheckResponse::task_failed(number, e, started)
            }
        };
        record(&mut tally, &response);
        responses.push(response);
    }

    (responses, tally)
}

/// 按查询结果更新统计
fn record(tally: &mut CheckTally, response: &CheckResponse) {
    if response.from_cache {
        tally.from_cache += 1;
    }
    match response.is_in_record() {
        Some(true) => tally.registered += 1,
        Some(false) => tally.not_registered += 1,
        // 页面结构异常或验证码用尽：会话走完了但没有答案
        None if response.registry_check.is_some() => tally.unknown += 1,
        None => tally.failed += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckOutcome;

    fn response(registry_check: Option<CheckOutcome>, from_cache: bool) -> CheckResponse {
        CheckResponse {
            success: registry_check.as_ref().map_or(false, |o| o.error().is_none()),
            input: "098297150".into(),
            phone_number: None,
            registry_check,
            captcha: None,
            from_cache,
            cached_at: None,
            time_ms: 0,
            error: None,
        }
    }

    #[test]
    fn tally_separates_unknown_from_failed() {
        let mut tally = CheckTally::default();
        record(
            &mut tally,
            &response(Some(CheckOutcome::resolved(1, "se encuentra en el Registro No llame")), true),
        );
        record(&mut tally, &response(Some(CheckOutcome::resolved(1, "no registrado")), false));
        record(
            &mut tally,
            &response(Some(CheckOutcome::Unresolved { captcha_solve_attempts: 10 }), false),
        );
        record(&mut tally, &response(Some(CheckOutcome::CodeNotFound), false));
        record(&mut tally, &response(None, false));

        assert_eq!(
            tally,
            CheckTally {
                registered: 1,
                not_registered: 1,
                unknown: 2,
                failed: 1,
                from_cache: 1,
            }
        );
        assert_eq!(tally.total(), 5);
    }

    #[tokio::test]
    async fn panicked_task_keeps_its_slot() {
        let numbers: Vec<String> = ["098297150", "boom", "099123456"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let handles = numbers
            .iter()
            .map(|number| {
                let number = number.clone();
                tokio::spawn(async move {
                    if number == "boom" {
                        panic!("worker crashed");
                    }
                    let mut ok = response(Some(CheckOutcome::resolved(1, "no registrado")), false);
                    ok.input = number;
                    ok
                })
            })
            .collect();

        let (responses, tally) = collect(&numbers, handles, Instant::now()).await;

        let inputs: Vec<&str> = responses.iter().map(|r| r.input.as_str()).collect();
        assert_eq!(inputs, ["098297150", "boom", "099123456"]);
        assert!(!responses[1].success);
        assert!(responses[1].registry_check.is_none());
        assert!(responses[1].error.as_deref().unwrap().starts_with("task failed"));
        assert_eq!(tally.not_registered, 2);
        assert_eq!(tally.failed, 1);
    }
}
