//! 号码校验与归一化
//!
//! 乌拉圭号码统一为不带国家码的本国号码（登记库使用的格式）。

use phonenumber::country;
use serde::Serialize;

use crate::error::ValidationError;

/// 归一化后的号码
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPhone {
    /// 用户输入的原始字符串
    pub original: String,
    /// 本国号码，例如 `98297150`
    pub normalized: String,
    /// 国际格式，例如 `+598 98 297 150`
    pub international: String,
    /// 号码类型（Mobile / FixedLine ...）
    #[serde(rename = "type")]
    pub kind: String,
}

/// 校验并归一化乌拉圭号码
///
/// 对已归一化的号码再次调用结果不变。
pub fn normalize(input: &str) -> Result<NormalizedPhone, ValidationError> {
    let trimmed = input.trim();
    let number = phonenumber::parse(Some(country::Id::UY), trimmed).map_err(|e| {
        ValidationError::Unparseable {
            input: trimmed.to_string(),
            reason: e.to_string(),
        }
    })?;

    if !phonenumber::is_valid(&number) {
        return Err(ValidationError::InvalidForRegion {
            input: trimmed.to_string(),
        });
    }

    if number.country().id() != Some(country::Id::UY) {
        return Err(ValidationError::ForeignNumber {
            input: trimmed.to_string(),
        });
    }

    let kind = number.number_type(&phonenumber::metadata::DATABASE);

    Ok(NormalizedPhone {
        original: input.to_string(),
        normalized: number.national().value().to_string(),
        international: number
            .format()
            .mode(phonenumber::Mode::International)
            .to_string(),
        kind: format!("{:?}", kind),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_country_code_and_trunk_prefix() {
        assert_eq!(normalize("+598 98 297 150").unwrap().normalized, "98297150");
        assert_eq!(normalize("098297150").unwrap().normalized, "98297150");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize("+59898297150").unwrap().normalized;
        let twice = normalize(&once).unwrap().normalized;
        assert_eq!(once, twice);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize("not a number").is_err());
        assert!(normalize("123").is_err());
    }

    #[test]
    fn foreign_numbers_are_rejected() {
        assert!(normalize("+1 650 253 0000").is_err());
    }
}
