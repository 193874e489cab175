//! 会话协议引擎 - 流程层
//!
//! 核心职责：驱动一次完整的门户会话
//!
//! 流程顺序：
//! 1. 入口页（证书错误时降级 TLS 重试一次）
//! 2. 第一个 iframe
//! 3. 从 iframe 脚本中取 workArea 地址
//! 4. 访问 workArea，解析 tabId / tokenId
//! 5. 提交号码
//! 6. 探测待签名表单
//! 7. 验证码循环：识别 → 提交 → 解析结果字段
//!
//! 每一步都依赖上一步的 cookie 和令牌，单次查询内部没有并发。

use reqwest::header::{CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, info, warn};

use super::endpoints::{PortalEndpoints, SessionTokens};
use super::extract::PortalParser;
use super::session::CheckSession;
use crate::config::{Config, ProtocolSettings};
use crate::error::{AppError, AppResult, CaptchaError, TransportError};
use crate::infrastructure::{is_certificate_error, PortalHttp, TlsProfile};
use crate::models::{CheckOutcome, CheckReport};
use crate::ocr::{CaptchaProfile, CaptchaResolver};
use crate::utils::truncate_text;

/// 可提交的验证码文本长度
const MIN_CAPTCHA_LEN: usize = 3;
const MAX_CAPTCHA_LEN: usize = 8;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// 哪些状态码可以接受
#[derive(Debug, Clone, Copy)]
enum StatusPolicy {
    /// 入口页：5xx 以下都算拿到了页面
    BelowServerError,
    /// 其余步骤：只接受 2xx
    Success,
}

impl StatusPolicy {
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            StatusPolicy::BelowServerError => !status.is_server_error(),
            StatusPolicy::Success => status.is_success(),
        }
    }
}

/// 会话协议引擎
///
/// - 持有共享的 HTTP 客户端和验证码识别器，可被多个并发查询共用
/// - 每次 [`SessionProtocol::run`] 创建自己的 [`CheckSession`]
pub struct SessionProtocol {
    http: PortalHttp,
    endpoints: PortalEndpoints,
    parser: PortalParser,
    resolver: CaptchaResolver,
    settings: ProtocolSettings,
}

impl SessionProtocol {
    pub fn new(
        http: PortalHttp,
        resolver: CaptchaResolver,
        settings: ProtocolSettings,
    ) -> AppResult<Self> {
        Ok(Self {
            endpoints: PortalEndpoints::new(settings.origin.clone()),
            parser: PortalParser::new()?,
            http,
            resolver,
            settings,
        })
    }

    /// 按配置创建 HTTP 客户端并组装引擎
    pub fn from_config(config: &Config, resolver: CaptchaResolver) -> AppResult<Self> {
        let settings = config.protocol_settings();
        let http = PortalHttp::new(settings.request_timeout, settings.fallback_timeout)?;
        Self::new(http, resolver, settings)
    }

    /// 对一个规范化后的号码执行完整查询
    ///
    /// # 返回
    /// - `Ok(report)`: 会话走完（包括结构异常和"结果未知"）
    /// - `Err(Transport)`: 步骤 1-6 的网络错误
    /// - `Err(Captcha)`: 某一轮内层识别全部失败
    pub async fn run(&self, phone_number: &str) -> AppResult<CheckReport> {
        let mut session = CheckSession::new(phone_number);
        info!("{} 🚀 开始查询", session);

        let outcome = match self.drive(&mut session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{} ❌ 查询中止: {}", session, e);
                return Err(e);
            }
        };

        Ok(CheckReport {
            phone_number: session.phone_number,
            outcome,
            captcha: session.stats,
        })
    }

    async fn drive(&self, session: &mut CheckSession) -> AppResult<CheckOutcome> {
        let entry_url = self.endpoints.entry_url();

        // ========== 步骤 1: 入口页 ==========
        let entry_html = self.fetch_entry(session, &entry_url).await?;

        // ========== 步骤 2: iframe ==========
        let frames = self.parser.iframe_sources(&entry_html);
        let Some(first_frame) = frames.first() else {
            warn!("{} ⚠️ 入口页中没有 iframe", session);
            return Ok(CheckOutcome::FrameNotFound);
        };
        debug!("{} 找到 {} 个 iframe，使用第一个: {}", session, frames.len(), first_frame);

        let frame_url = self.endpoints.frame_url(first_frame);
        let builder = self.request(session, Method::GET, &frame_url).header(REFERER, &entry_url);
        let frame_html = self
            .dispatch_text(session, builder, &frame_url, StatusPolicy::Success)
            .await?;

        // ========== 步骤 3: workArea 地址 ==========
        let Some(raw_src) = self.parser.work_area_src(&frame_html) else {
            warn!("{} ⚠️ iframe 脚本中找不到 workArea 地址", session);
            return Ok(CheckOutcome::CodeNotFound);
        };
        let work_area_url = self.endpoints.resolve_work_area(&raw_src);
        info!("{} ✓ workArea: {}", session, work_area_url);

        // ========== 步骤 4: 建立服务端会话，解析令牌 ==========
        let builder = self
            .request(session, Method::GET, &work_area_url)
            .header(REFERER, &entry_url);
        self.dispatch_text(session, builder, &work_area_url, StatusPolicy::Success)
            .await?;

        let Some(tokens) = SessionTokens::from_url(&work_area_url) else {
            warn!("{} ⚠️ workArea 地址中缺少 tabId / tokenId", session);
            return Ok(CheckOutcome::TokensNotFound);
        };
        session.work_area_url = Some(work_area_url.clone());
        session.tokens = Some(tokens.clone());

        // ========== 步骤 5: 提交号码 ==========
        let url = self.endpoints.phone_submit_url(&tokens)?;
        let phone_number = session.phone_number.clone();
        let builder = self
            .ajax(session, url.as_str(), &work_area_url)
            .form(&[("value", phone_number.as_str())]);
        let reply = self
            .dispatch_text(session, builder, url.as_str(), StatusPolicy::Success)
            .await?;
        info!("{} 📤 号码已提交", session);
        debug!("{} 号码提交响应: {}", session, truncate_text(&reply, 200));

        // ========== 步骤 6: 待签名表单 ==========
        let url = self.endpoints.signable_forms_url(&tokens)?;
        let builder = self
            .ajax(session, url.as_str(), &work_area_url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        let reply = self
            .dispatch_text(session, builder, url.as_str(), StatusPolicy::Success)
            .await?;
        debug!("{} 待签名表单探测: {}", session, truncate_text(&reply, 200));

        // ========== 步骤 7: 验证码循环 ==========
        self.solve_and_submit(session).await
    }

    /// 入口页请求，证书类错误时切换到宽松 TLS 配置重试一次
    async fn fetch_entry(&self, session: &mut CheckSession, entry_url: &str) -> AppResult<String> {
        let builder = self.request(session, Method::GET, entry_url);
        match self
            .dispatch_text(session, builder, entry_url, StatusPolicy::BelowServerError)
            .await
        {
            Err(AppError::Transport(TransportError::RequestFailed { ref source, .. }))
                if session.tls == TlsProfile::Strict && is_certificate_error(source) =>
            {
                warn!(
                    "{} ⚠️ 入口页证书错误，改用 {} TLS 配置重试: {}",
                    session,
                    TlsProfile::Permissive.name(),
                    source
                );
                session.tls = TlsProfile::Permissive;
                let builder = self.request(session, Method::GET, entry_url);
                self.dispatch_text(session, builder, entry_url, StatusPolicy::BelowServerError)
                    .await
            }
            other => other,
        }
    }

    /// 外层循环：每轮重新取验证码并提交，直到结果字段非空
    ///
    /// 令牌和 Referer 取自会话在步骤 4 保存的 workArea 信息
    async fn solve_and_submit(&self, session: &mut CheckSession) -> AppResult<CheckOutcome> {
        let (Some(tokens), Some(referer)) = (session.tokens.clone(), session.work_area_url.clone())
        else {
            warn!("{} ⚠️ 会话中没有 workArea 令牌", session);
            return Ok(CheckOutcome::TokensNotFound);
        };
        let tokens = &tokens;
        let referer = referer.as_str();
        let captcha_field = tokens.captcha_field();
        let outer_budget = self.settings.outer_attempts;

        for outer in 1..=outer_budget {
            session.stats.outer_attempts = outer;
            let text = self.solve_captcha(session, tokens, outer).await?;
            info!(
                "{} 🔐 第 {}/{} 次提交验证码 '{}'",
                session, outer, outer_budget, text
            );

            let url = self.endpoints.next_step_url(tokens)?;
            let builder = self
                .ajax(session, url.as_str(), referer)
                .form(&[(captcha_field.as_str(), text.as_str())]);

            // 这一步的网络错误只算一次空结果
            let body = match self
                .dispatch_text(session, builder, url.as_str(), StatusPolicy::Success)
                .await
            {
                Ok(body) => body,
                Err(e) => {
                    warn!("{} ⚠️ 第 {} 次提交失败: {}", session, outer, e);
                    continue;
                }
            };

            match self.parser.result_field(&body) {
                Some((value, source)) => {
                    let outcome = CheckOutcome::resolved(outer, value);
                    info!(
                        "{} ✅ 第 {} 次得到结果 ({:?}): 已登记 = {:?}",
                        session,
                        outer,
                        source,
                        outcome.is_in_record()
                    );
                    return Ok(outcome);
                }
                None => {
                    debug!(
                        "{} 第 {} 次提交未返回结果字段: {}",
                        session,
                        outer,
                        truncate_text(&body, 200)
                    );
                }
            }
        }

        warn!(
            "{} ⚠️ {} 次提交后仍没有结果，结果未知",
            session, outer_budget
        );
        Ok(CheckOutcome::Unresolved {
            captcha_solve_attempts: outer_budget,
        })
    }

    /// 内层循环：取图并识别，直到得到长度合格的文本
    async fn solve_captcha(
        &self,
        session: &mut CheckSession,
        tokens: &SessionTokens,
        outer: u32,
    ) -> AppResult<String> {
        let inner_budget = self.settings.inner_attempts.max(1);
        let mut last_reason = String::new();

        for inner in 1..=inner_budget {
            if inner > 1 && !self.settings.backoff.is_zero() {
                tokio::time::sleep(self.settings.backoff).await;
            }
            session.stats.inner_attempts += 1;

            let image = match self.fetch_captcha_image(session, tokens).await {
                Ok(image) => image,
                Err(e) => {
                    warn!("{} ⚠️ 验证码图片获取失败 ({}/{}): {}", session, inner, inner_budget, e);
                    last_reason = e.to_string();
                    continue;
                }
            };

            let resolution = self.resolver.resolve(&image, &CaptchaProfile::PORTAL).await;
            if resolution.is_fallback() {
                session.stats.fallback_guesses += 1;
            }

            let text = resolution.chosen_text();
            let len = text.chars().count();
            if (MIN_CAPTCHA_LEN..=MAX_CAPTCHA_LEN).contains(&len) {
                return Ok(text.to_string());
            }

            last_reason = format!(
                "识别结果 '{}' 长度 {} 不在 {}-{} 之间",
                text, len, MIN_CAPTCHA_LEN, MAX_CAPTCHA_LEN
            );
            debug!("{} {} ({}/{})", session, last_reason, inner, inner_budget);
        }

        Err(CaptchaError::Unsolvable {
            outer_attempt: outer,
            inner_attempts: inner_budget,
            reason: last_reason,
        }
        .into())
    }

    async fn fetch_captcha_image(
        &self,
        session: &mut CheckSession,
        tokens: &SessionTokens,
    ) -> AppResult<Vec<u8>> {
        let url = self.endpoints.captcha_image_url(tokens)?;
        let builder = self
            .request(session, Method::GET, url.as_str())
            .header(REFERER, self.endpoints.base_url());
        let response = self
            .dispatch(session, builder, url.as_str(), StatusPolicy::Success)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::request_failed(url.as_str(), e))?;
        debug!("{} 验证码图片 {} 字节", session, bytes.len());
        Ok(bytes.to_vec())
    }

    // ========== 请求辅助 ==========

    /// 使用会话当前的 TLS 配置，附带累积的 cookie
    fn request(&self, session: &CheckSession, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.client(session.tls).request(method, url);
        if session.cookies.is_empty() {
            builder
        } else {
            builder.header(COOKIE, session.cookies.header_value())
        }
    }

    /// workArea 页面里发出的 AJAX POST
    fn ajax(&self, session: &CheckSession, url: &str, referer: &str) -> RequestBuilder {
        self.request(session, Method::POST, url)
            .header(REFERER, referer)
            .header(ORIGIN, self.endpoints.origin())
            .header("X-Requested-With", "XMLHttpRequest")
    }

    /// 发送请求，合并 cookie，检查状态码
    async fn dispatch(
        &self,
        session: &mut CheckSession,
        builder: RequestBuilder,
        url: &str,
        policy: StatusPolicy,
    ) -> AppResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::request_failed(url, e))?;

        let merged = session.cookies.merge_from_headers(response.headers());
        let status = response.status();
        debug!(
            "{} {} -> {} (cookie +{}, 共 {})",
            session,
            url,
            status,
            merged,
            session.cookies.len()
        );

        if !policy.accepts(status) {
            return Err(AppError::bad_status(url, status.as_u16()));
        }
        Ok(response)
    }

    async fn dispatch_text(
        &self,
        session: &mut CheckSession,
        builder: RequestBuilder,
        url: &str,
        policy: StatusPolicy,
    ) -> AppResult<String> {
        let response = self.dispatch(session, builder, url, policy).await?;
        response
            .text()
            .await
            .map_err(|e| AppError::request_failed(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_accepts_client_errors_but_not_server_errors() {
        assert!(StatusPolicy::BelowServerError.accepts(StatusCode::OK));
        assert!(StatusPolicy::BelowServerError.accepts(StatusCode::NOT_FOUND));
        assert!(!StatusPolicy::BelowServerError.accepts(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn later_steps_require_success() {
        assert!(StatusPolicy::Success.accepts(StatusCode::NO_CONTENT));
        assert!(!StatusPolicy::Success.accepts(StatusCode::FOUND));
        assert!(!StatusPolicy::Success.accepts(StatusCode::FORBIDDEN));
    }
}
