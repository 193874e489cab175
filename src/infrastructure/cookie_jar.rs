//! 会话 Cookie 容器
//!
//! 每次查询独享一个，按首次出现的顺序保存，同名 cookie 原位覆盖。

use reqwest::header::{HeaderMap, SET_COOKIE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖一个 cookie
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// 删除一个 cookie，返回是否存在
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    /// 合并响应头中的所有 `Set-Cookie`
    ///
    /// 值为空的 `Set-Cookie` 是服务端在清除 cookie，对应条目被删除。
    ///
    /// # 返回
    /// 新增、更新或删除的 cookie 数量
    pub fn merge_from_headers(&mut self, headers: &HeaderMap) -> usize {
        let mut merged = 0;
        for raw in headers.get_all(SET_COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            match parse_set_cookie(raw) {
                Some((name, "")) => {
                    if self.remove(name) {
                        merged += 1;
                    }
                }
                Some((name, value)) => {
                    self.insert(name, value);
                    merged += 1;
                }
                None => {}
            }
        }
        merged
    }

    /// 渲染为 `Cookie` 请求头：`a=1; b=2`
    pub fn header_value(&self) -> String {
        self.entries
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 取 `Set-Cookie` 第一个 `;` 之前的 `name=value`，名字为空时丢弃
fn parse_set_cookie(raw: &str) -> Option<(&str, &str)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}
