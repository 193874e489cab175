//! 基础设施层
//!
//! 持有稀缺资源（HTTP 连接池、会话 cookie），只暴露能力，不认识查询流程。

pub mod cookie_jar;
pub mod http;

pub use cookie_jar::CookieJar;
pub use http::{browser_headers, is_certificate_error, PortalHttp, TlsProfile};
