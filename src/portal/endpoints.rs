//! 门户地址与提取规则
//!
//! 门户改版时只需要改这里。

use chrono::Utc;
use reqwest::Url;

use crate::error::{AppError, AppResult};

/// 默认门户 origin
pub const DEFAULT_ORIGIN: &str = "https://tramites.ursec.gub.uy";
/// 所有页面共用的路径前缀
pub const BASE_PATH: &str = "/tramites-en-linea/TramitesEnLinea/";
/// 入口页
pub const ENTRY_PAGE: &str = "apia.portal.PortalAction.run?dshId=1057";
const FORM_ACTION: &str = "apia.execution.FormAction.run";
const TASK_ACTION: &str = "apia.execution.TaskAction.run";
const CAPTCHA_IMAGE: &str = "captchaImg";

/// 号码输入框所在表单
pub const FORM_ID: &str = "6619";
/// 号码输入框的属性 id
pub const ATTRIBUTE_ID: &str = "11808";
/// 验证码字段名 = tabId + 该后缀
pub const CAPTCHA_FIELD_SUFFIX: &str = "E_6619";

/// 结果字段名
pub const RESULT_FIELD: &str = "RAF_RESPUESTA_STR";
/// 字段元素上保存字段名的属性
pub const FIELD_NAME_ATTR: &str = "attName";
/// 字段元素标签
pub const FIELD_TAG: &str = "field";
/// 携带内嵌 XML 的容器
pub const FORM_CONTAINER_SELECTOR: &str = ".formContainer";
/// 容器上的内嵌 XML 属性
pub const DATA_XML_ATTR: &str = "data-xml";
/// iframe 脚本中对 workArea 地址的赋值
pub const WORK_AREA_PATTERN: &str =
    r#"document\.getElementById\(["']workArea["']\)\.src\s*=\s*["']([^"']+)["']"#;

/// 会话令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub tab_id: String,
    pub token_id: String,
}

impl SessionTokens {
    /// 从 workArea 地址的查询串中读取 `tabId` / `tokenId`
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let mut tab_id = None;
        let mut token_id = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "tabId" if !value.is_empty() => tab_id = Some(value.into_owned()),
                "tokenId" if !value.is_empty() => token_id = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self {
            tab_id: tab_id?,
            token_id: token_id?,
        })
    }

    /// 验证码表单字段名，例如 `12E_6619`
    pub fn captcha_field(&self) -> String {
        format!("{}{}", self.tab_id, CAPTCHA_FIELD_SUFFIX)
    }
}

/// 门户地址构造器
#[derive(Debug, Clone)]
pub struct PortalEndpoints {
    origin: String,
}

impl Default for PortalEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN)
    }
}

impl PortalEndpoints {
    /// # 参数
    /// - `origin`: scheme + host（+ port），末尾斜杠会被去掉
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// `{origin}/tramites-en-linea/TramitesEnLinea/`
    pub fn base_url(&self) -> String {
        format!("{}{}", self.origin, BASE_PATH)
    }

    pub fn entry_url(&self) -> String {
        format!("{}{}", self.base_url(), ENTRY_PAGE)
    }

    /// iframe 的 src 直接拼在路径前缀后面
    pub fn frame_url(&self, src: &str) -> String {
        format!("{}{}", self.base_url(), src)
    }

    /// 解析 workArea 地址
    ///
    /// - `http(s)://` 开头：原样使用
    /// - `/` 开头：拼在 origin 后
    /// - 其他：origin + `/` + 地址
    pub fn resolve_work_area(&self, raw: &str) -> String {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else if raw.starts_with('/') {
            format!("{}{}", self.origin, raw)
        } else {
            format!("{}/{}", self.origin, raw)
        }
    }

    /// 号码提交地址
    pub fn phone_submit_url(&self, tokens: &SessionTokens) -> AppResult<Url> {
        let timestamp = timestamp();
        self.with_params(
            FORM_ACTION,
            &[
                ("action", "processFieldSubmit"),
                ("isAjax", "true"),
                ("frmId", FORM_ID),
                ("frmParent", "E"),
                ("timestamp", timestamp.as_str()),
                ("attId", ATTRIBUTE_ID),
                ("index", "0"),
                ("tabId", tokens.tab_id.as_str()),
                ("tokenId", tokens.token_id.as_str()),
            ],
        )
    }

    /// "是否有待签名表单" 探测地址
    pub fn signable_forms_url(&self, tokens: &SessionTokens) -> AppResult<Url> {
        self.with_params(
            TASK_ACTION,
            &[
                ("action", "hasSignableForms"),
                ("appletToken", ""),
                ("tabId", tokens.tab_id.as_str()),
                ("tokenId", tokens.token_id.as_str()),
            ],
        )
    }

    /// 下一步（提交验证码）地址
    pub fn next_step_url(&self, tokens: &SessionTokens) -> AppResult<Url> {
        self.with_params(
            TASK_ACTION,
            &[
                ("action", "gotoNextStep"),
                ("tabId", tokens.tab_id.as_str()),
                ("tokenId", tokens.token_id.as_str()),
                ("currentTab", "0"),
            ],
        )
    }

    /// 验证码图片地址，带时间戳避免缓存
    pub fn captcha_image_url(&self, tokens: &SessionTokens) -> AppResult<Url> {
        let field = tokens.captcha_field();
        let timestamp = timestamp();
        self.with_params(
            CAPTCHA_IMAGE,
            &[("captchaName", field.as_str()), ("t", timestamp.as_str())],
        )
    }

    fn with_params(&self, page: &str, params: &[(&str, &str)]) -> AppResult<Url> {
        let raw = format!("{}{}", self.base_url(), page);
        Url::parse_with_params(&raw, params).map_err(|e| AppError::invalid_url(raw, e))
    }
}

fn timestamp() -> String {
    Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> SessionTokens {
        SessionTokens {
            tab_id: "T1".into(),
            token_id: "K1".into(),
        }
    }

    #[test]
    fn work_area_resolution_cases() {
        let endpoints = PortalEndpoints::default();
        assert_eq!(
            endpoints.resolve_work_area("/foo/bar?x=1"),
            "https://tramites.ursec.gub.uy/foo/bar?x=1"
        );
        assert_eq!(endpoints.resolve_work_area("https://other/x"), "https://other/x");
        assert_eq!(
            endpoints.resolve_work_area("rel/path"),
            "https://tramites.ursec.gub.uy/rel/path"
        );
    }

    #[test]
    fn entry_and_frame_urls() {
        let endpoints = PortalEndpoints::new("http://127.0.0.1:8080/");
        assert_eq!(
            endpoints.entry_url(),
            "http://127.0.0.1:8080/tramites-en-linea/TramitesEnLinea/apia.portal.PortalAction.run?dshId=1057"
        );
        assert_eq!(
            endpoints.frame_url("page.jsp?a=1"),
            "http://127.0.0.1:8080/tramites-en-linea/TramitesEnLinea/page.jsp?a=1"
        );
    }

    #[test]
    fn tokens_come_from_query_string() {
        let parsed = SessionTokens::from_url(
            "https://tramites.ursec.gub.uy/tramites-en-linea/TramitesEnLinea/apia.execution.WorkArea.run?tabId=17&tokenId=abc%3D",
        )
        .unwrap();
        assert_eq!(parsed.tab_id, "17");
        assert_eq!(parsed.token_id, "abc=");
        assert_eq!(parsed.captcha_field(), "17E_6619");

        assert!(SessionTokens::from_url("https://x/y?tabId=17").is_none());
        assert!(SessionTokens::from_url("https://x/y?tabId=&tokenId=1").is_none());
        assert!(SessionTokens::from_url("not a url").is_none());
    }

    #[test]
    fn next_step_url_carries_tokens() {
        let url = PortalEndpoints::default().next_step_url(&tokens()).unwrap();
        assert_eq!(url.path(), "/tramites-en-linea/TramitesEnLinea/apia.execution.TaskAction.run");
        assert_eq!(
            url.query(),
            Some("action=gotoNextStep&tabId=T1&tokenId=K1&currentTab=0")
        );
    }

    #[test]
    fn captcha_url_uses_field_name() {
        let url = PortalEndpoints::default().captcha_image_url(&tokens()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("captchaName".to_string(), "T1E_6619".to_string()));
        assert_eq!(pairs[1].0, "t");
    }

    #[test]
    fn phone_submit_url_has_form_identifiers() {
        let url = PortalEndpoints::default().phone_submit_url(&tokens()).unwrap();
        let query = url.query().unwrap();
        assert!(query.starts_with("action=processFieldSubmit&isAjax=true&frmId=6619&frmParent=E&timestamp="));
        assert!(query.ends_with("&attId=11808&index=0&tabId=T1&tokenId=K1"));
    }
}
