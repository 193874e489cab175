//! 会话协议引擎
//!
//! ## 职责
//!
//! 代替浏览器走完门户的多步会话：入口页 → iframe → workArea → 提交号码 →
//! 验证码 → 结果字段。
//!
//! ## 模块划分
//!
//! - `endpoints` - 地址、表单标识、提取规则常量（门户改版只改这里）
//! - `extract` - HTML / XML 提取
//! - `session` - 单次查询的 cookie、令牌、计数
//! - `protocol` - 七步状态机

pub mod endpoints;
pub mod extract;
pub mod protocol;
pub mod session;

pub use endpoints::{PortalEndpoints, SessionTokens};
pub use extract::{FieldSource, PortalParser};
pub use protocol::SessionProtocol;
pub use session::CheckSession;
