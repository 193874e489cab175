//! 页面内容提取
//!
//! HTML 用 scraper 查询，内嵌 XML 用 roxmltree 解析。提取规则全部来自
//! [`super::endpoints`] 中的常量。

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::endpoints::{
    DATA_XML_ATTR, FIELD_NAME_ATTR, FIELD_TAG, FORM_CONTAINER_SELECTOR, RESULT_FIELD,
    WORK_AREA_PATTERN,
};
use crate::error::ConfigError;

/// 结果字段是在哪里找到的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// 直接出现在 HTML 中
    Html,
    /// 容器的 `data-xml` 属性
    DataXml,
    /// 整个响应按 XML 解析
    BodyXml,
}

/// 预编译的提取规则
pub struct PortalParser {
    work_area: Regex,
    iframe: Selector,
    field: Selector,
    form_container: Selector,
}

fn selector(pattern: &str) -> Result<Selector, ConfigError> {
    Selector::parse(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl PortalParser {
    pub fn new() -> Result<Self, ConfigError> {
        let work_area = Regex::new(WORK_AREA_PATTERN).map_err(|e| ConfigError::InvalidPattern {
            pattern: WORK_AREA_PATTERN.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            work_area,
            iframe: selector("iframe[src]")?,
            field: selector(FIELD_TAG)?,
            form_container: selector(FORM_CONTAINER_SELECTOR)?,
        })
    }

    /// 所有 iframe 的 src（按文档顺序，忽略空值）
    pub fn iframe_sources(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.iframe)
            .filter_map(|el| el.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 内联脚本中 workArea 的原始地址（未解析）
    pub fn work_area_src(&self, html: &str) -> Option<String> {
        self.work_area
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// 提取 `RAF_RESPUESTA_STR` 的值
    ///
    /// 依次查找 HTML 本身、容器的 `data-xml`、整个响应作为 XML；
    /// 第一个非空值胜出。
    pub fn result_field(&self, body: &str) -> Option<(String, FieldSource)> {
        let document = Html::parse_document(body);

        if let Some(value) = self.html_field(&document) {
            return Some((value, FieldSource::Html));
        }

        let embedded = document
            .select(&self.form_container)
            .find_map(|el| el.value().attr(DATA_XML_ATTR))
            .filter(|xml| !xml.trim().is_empty());
        if let Some(value) = embedded.and_then(xml_field) {
            return Some((value, FieldSource::DataXml));
        }

        xml_field(body).map(|value| (value, FieldSource::BodyXml))
    }

    fn html_field(&self, document: &Html) -> Option<String> {
        // html5ever 会把属性名转成小写，这里不区分大小写比较
        document
            .select(&self.field)
            .filter(|el| {
                el.value()
                    .attrs()
                    .any(|(name, value)| name.eq_ignore_ascii_case(FIELD_NAME_ATTR) && value == RESULT_FIELD)
            })
            .find_map(|el| element_value(&el))
    }
}

fn element_value(el: &ElementRef) -> Option<String> {
    let text = el.text().collect::<String>();
    let text = text.trim();
    if !text.is_empty() {
        return Some(text.to_string());
    }
    el.value()
        .attr("value")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 按 XML 解析并查找结果字段；片段有多个根元素时包一层再试
fn xml_field(xml: &str) -> Option<String> {
    match roxmltree::Document::parse(xml) {
        Ok(doc) => find_xml_field(&doc),
        Err(_) => {
            let wrapped = format!("<root>{}</root>", strip_xml_declaration(xml));
            match roxmltree::Document::parse(&wrapped) {
                Ok(doc) => find_xml_field(&doc),
                Err(e) => {
                    debug!("响应不是有效的 XML: {}", e);
                    None
                }
            }
        }
    }
}

fn strip_xml_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    trimmed
}

fn find_xml_field(doc: &roxmltree::Document) -> Option<String> {
    doc.descendants()
        .filter(|node| node.is_element() && node.tag_name().name().eq_ignore_ascii_case(FIELD_TAG))
        .filter(|node| {
            node.attributes()
                .any(|a| a.name().eq_ignore_ascii_case(FIELD_NAME_ATTR) && a.value() == RESULT_FIELD)
        })
        .find_map(|node| {
            let text: String = node
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect();
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
            node.attribute("value")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}
