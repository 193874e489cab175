//! HTTP 客户端 - 基础设施层
//!
//! 门户证书经常是自签名或过期的，因此准备两套 TLS 配置：
//! - `Strict`：接受无效证书
//! - `Permissive`：同样接受无效证书，但限制到 TLS 1.2 并使用更长的超时，只在入口页证书错误时启用一次

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{tls, Client};

use crate::error::{AppResult, TransportError};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.9";

/// TLS 配置档
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProfile {
    Strict,
    Permissive,
}

impl TlsProfile {
    pub fn name(&self) -> &'static str {
        match self {
            TlsProfile::Strict => "strict",
            TlsProfile::Permissive => "permissive",
        }
    }
}

/// 门户 HTTP 客户端
///
/// 内部的 `reqwest::Client` 可以廉价 clone，多个并发查询共享同一对连接池；
/// cookie 由每个会话自己的 [`super::CookieJar`] 管理，客户端本身不保存任何会话状态。
#[derive(Clone)]
pub struct PortalHttp {
    strict: Client,
    permissive: Client,
}

impl PortalHttp {
    /// 创建两套客户端
    ///
    /// # 参数
    /// - `request_timeout`: 普通请求超时
    /// - `fallback_timeout`: 宽松配置的超时
    pub fn new(request_timeout: Duration, fallback_timeout: Duration) -> AppResult<Self> {
        let strict = Client::builder()
            .default_headers(browser_headers())
            .danger_accept_invalid_certs(true)
            .timeout(request_timeout)
            .build()
            .map_err(|source| TransportError::ClientBuild {
                profile: TlsProfile::Strict.name(),
                source,
            })?;

        let permissive = Client::builder()
            .default_headers(browser_headers())
            .danger_accept_invalid_certs(true)
            .max_tls_version(tls::Version::TLS_1_2)
            .timeout(fallback_timeout)
            .build()
            .map_err(|source| TransportError::ClientBuild {
                profile: TlsProfile::Permissive.name(),
                source,
            })?;

        Ok(Self { strict, permissive })
    }

    pub fn client(&self, profile: TlsProfile) -> &Client {
        match profile {
            TlsProfile::Strict => &self.strict,
            TlsProfile::Permissive => &self.permissive,
        }
    }
}

/// 浏览器请求头（门户会拒绝不像浏览器的请求）
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(r#""Not)A;Brand";v="8", "Chromium";v="138", "Google Chrome";v="138""#),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static(r#""Windows""#));
    headers
}

/// 是否为证书 / TLS 握手类错误
///
/// reqwest 不单独暴露 TLS 错误类型，只能沿 source 链查找关键词。
pub fn is_certificate_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return false;
    }
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        let text = e.to_string().to_lowercase();
        if ["certificate", "tls", "ssl", "handshake"]
            .iter()
            .any(|needle| text.contains(needle))
        {
            return true;
        }
        current = e.source();
    }
    false
}
