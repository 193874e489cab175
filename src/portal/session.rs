//! 单次查询的会话状态
//!
//! 每次查询独占一个 `CheckSession`，查询结束即丢弃，并发查询之间不共享任何状态。

use std::fmt::Display;

use super::endpoints::SessionTokens;
use crate::infrastructure::{CookieJar, TlsProfile};
use crate::models::CaptchaStats;

#[derive(Debug, Clone)]
pub struct CheckSession {
    /// 规范化后的号码
    pub phone_number: String,

    /// 累积的 cookie
    pub cookies: CookieJar,

    /// 当前使用的 TLS 配置；入口页降级后整个会话都沿用宽松配置
    pub tls: TlsProfile,

    /// 解析后的 workArea 地址，后续请求的 Referer
    pub work_area_url: Option<String>,

    pub tokens: Option<SessionTokens>,

    /// 验证码计数
    pub stats: CaptchaStats,
}

impl CheckSession {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            cookies: CookieJar::new(),
            tls: TlsProfile::Strict,
            work_area_url: None,
            tokens: None,
            stats: CaptchaStats::default(),
        }
    }
}

impl Display for CheckSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[号码 {}]", self.phone_number)
    }
}
