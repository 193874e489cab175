//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把号码校验、缓存和会话协议串起来，并批量调度。
//!
//! ## 模块划分
//!
//! ### `check_service` - 单个号码
//! - 校验并归一化号码
//! - 读缓存（可跳过）
//! - 调用会话协议引擎
//! - 只把确定的结果写回缓存
//!
//! ### `batch_processor` - 批量查询
//! - 管理应用生命周期（组装 OCR、HTTP、缓存）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//! - 缓存维护命令
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<号码>)
//!     ↓
//! check_service (处理单个号码)
//!     ↓
//! portal::SessionProtocol (七步会话)  +  cache::ResultCache
//!     ↓
//! ocr (验证码识别)  +  infrastructure (HTTP、cookie)
//! ```

pub mod batch_processor;
pub mod check_service;

pub use batch_processor::App;
pub use check_service::{CheckResponse, PhoneCheckService};
