//! # No Llame Check
//!
//! 查询号码是否在乌拉圭「No llame」登记库中的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 连接池），只暴露能力
//! - `PortalHttp` - 严格 / 宽松两套 TLS 配置
//! - `CookieJar` - 单次会话的 cookie 容器
//!
//! ### ② 能力层（OCR / Cache）
//! - `ocr/` - 验证码识别：引擎接口、工作池、候选排序、占位猜测
//! - `cache/` - 结果缓存：后端接口、MySQL / MongoDB / 对象存储、过期策略
//!
//! ### ③ 流程层（Portal）
//! - `portal/` - 定义"一次查询"的七步会话
//! - `CheckSession` - 单次查询的状态（cookie、令牌、计数）
//! - `SessionProtocol` - 状态机（入口页 → iframe → workArea → 号码 → 验证码）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/check_service` - 校验 → 缓存 → 协议 → 写缓存
//! - `orchestrator/batch_processor` - 批量查询，管理资源和并发
//!
//! ## 模块结构

pub mod cache;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod portal;
pub mod utils;

// 重新导出常用类型
pub use cache::{create_cache, ResultCache};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{normalize, CheckOutcome, CheckReport, NormalizedPhone};
pub use orchestrator::{App, CheckResponse, PhoneCheckService};
pub use portal::SessionProtocol;
