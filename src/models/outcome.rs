//! 查询结果模型

use serde::{Deserialize, Serialize};

/// 登记库回复中表示"已登记"的固定短语
pub const REGISTERED_PHRASE: &str = "se encuentra en el Registro No llame";

/// 一次查询的结果
///
/// 页面结构异常和"验证码用尽仍无结果"都是正常的返回值，不是错误，
/// 调用方可以据此区分"网站改版"与"网络故障"。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// 拿到了 RAF_RESPUESTA_STR
    Resolved {
        captcha_solve_attempts: u32,
        response: String,
        is_in_record: bool,
    },
    /// 外层尝试全部用尽，字段始终为空：结果未知，不等于"未登记"
    Unresolved { captcha_solve_attempts: u32 },
    /// 入口页没有 iframe
    FrameNotFound,
    /// iframe 脚本中找不到 workArea 地址
    CodeNotFound,
    /// workArea 地址缺少 tabId / tokenId
    TokensNotFound,
}

impl CheckOutcome {
    /// 由结果字段构造 Resolved
    pub fn resolved(captcha_solve_attempts: u32, response: impl Into<String>) -> Self {
        let response = response.into();
        let is_in_record = response.contains(REGISTERED_PHRASE);
        CheckOutcome::Resolved {
            captcha_solve_attempts,
            response,
            is_in_record,
        }
    }

    /// 结构性错误的标识，其余情况为 `None`
    pub fn error(&self) -> Option<&'static str> {
        match self {
            CheckOutcome::FrameNotFound => Some("frame_not_found"),
            CheckOutcome::CodeNotFound => Some("code_not_found"),
            CheckOutcome::TokensNotFound => Some("tokens_not_found"),
            CheckOutcome::Resolved { .. } | CheckOutcome::Unresolved { .. } => None,
        }
    }

    /// 是否为确定的结果（允许写入缓存）
    pub fn is_cacheable(&self) -> bool {
        matches!(self, CheckOutcome::Resolved { response, .. } if !response.trim().is_empty())
    }

    /// 号码是否在登记库中；未知时为 `None`
    pub fn is_in_record(&self) -> Option<bool> {
        match self {
            CheckOutcome::Resolved { is_in_record, .. } => Some(*is_in_record),
            _ => None,
        }
    }

    pub fn captcha_solve_attempts(&self) -> u32 {
        match self {
            CheckOutcome::Resolved {
                captcha_solve_attempts,
                ..
            }
            | CheckOutcome::Unresolved {
                captcha_solve_attempts,
            } => *captcha_solve_attempts,
            _ => 0,
        }
    }
}

/// 验证码相关计数，随结果一起返回便于观测
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaStats {
    /// 外层提交次数
    pub outer_attempts: u32,
    /// 识别次数（所有外层累计）
    pub inner_attempts: u32,
    /// 其中使用占位猜测的次数
    pub fallback_guesses: u32,
}

/// 会话协议引擎的完整输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub phone_number: String,
    pub outcome: CheckOutcome,
    pub captcha: CaptchaStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_phrase_sets_flag() {
        let outcome = CheckOutcome::resolved(
            2,
            "El número 98297150 se encuentra en el Registro No llame desde 2021",
        );
        assert_eq!(outcome.is_in_record(), Some(true));
        assert_eq!(outcome.captcha_solve_attempts(), 2);
        assert!(outcome.is_cacheable());
    }

    #[test]
    fn other_reply_is_not_registered() {
        let outcome = CheckOutcome::resolved(1, "El número no se encuentra registrado");
        assert_eq!(outcome.is_in_record(), Some(false));
    }

    #[test]
    fn unresolved_is_unknown_and_not_cacheable() {
        let outcome = CheckOutcome::Unresolved {
            captcha_solve_attempts: 10,
        };
        assert_eq!(outcome.is_in_record(), None);
        assert_eq!(outcome.error(), None);
        assert!(!outcome.is_cacheable());
    }

    #[test]
    fn structural_outcomes_carry_error_codes() {
        assert_eq!(CheckOutcome::CodeNotFound.error(), Some("code_not_found"));
        assert_eq!(CheckOutcome::FrameNotFound.error(), Some("frame_not_found"));
        assert!(!CheckOutcome::TokensNotFound.is_cacheable());
    }

    #[test]
    fn serialized_with_status_tag() {
        let json = serde_json::to_value(CheckOutcome::resolved(1, "ok")).unwrap();
        assert_eq!(json["status"], "resolved");
        assert_eq!(json["captcha_solve_attempts"], 1);
        assert_eq!(json["is_in_record"], false);
    }
}
