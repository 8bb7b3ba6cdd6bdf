//! 链接占位符编解码
//!
//! 把 `<a href=...>标签</a>` 替换为 `[LINK_n]标签[/LINK_n]`，让链接结构
//! 经过自由文本翻译后仍能恢复。编号从映射表当前大小开始递增，
//! 同一批次内的多个单元共享一张映射表而不会冲突。

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

/// 一个被替换的链接
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    pub original_html: String,
    pub href: String,
    pub original_text: String,
    /// 开始标签中的原始属性串
    pub attributes: String,
}

/// 占位符到链接信息的有序映射，作用域为一次批次编码
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LinkMap {
    entries: Vec<(String, LinkInfo)>,
}

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按开始占位符查找
    pub fn get(&self, token: &str) -> Option<&LinkInfo> {
        self.entries
            .iter()
            .find(|(key, _)| key == token)
            .map(|(_, info)| info)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LinkInfo)> {
        self.entries.iter().map(|(key, info)| (key.as_str(), info))
    }

    fn insert(&mut self, token: String, info: LinkInfo) {
        self.entries.push((token, info));
    }
}

fn anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<a\s+([^>]*?\bhref\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)[^>]*)>(.*?)</a\s*>"#,
        )
        .expect("anchor pattern is valid")
    })
}

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
            .expect("href pattern is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

fn stray_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[/?LINK_\d+\]").expect("token pattern is valid"))
}

fn open_token(n: usize) -> String {
    format!("[LINK_{}]", n)
}

fn close_token(n: usize) -> String {
    format!("[/LINK_{}]", n)
}

/// 文本中是否含有带 `href` 的链接标签
pub fn contains_anchor(text: &str) -> bool {
    anchor_regex().is_match(text)
}

/// 去掉标签，只保留文本
pub fn strip_tags(html: &str) -> String {
    tag_regex().replace_all(html, "").trim().to_string()
}

/// 将 HTML 中带 `href` 的链接替换为占位符，并记录到 `map`
pub fn encode(html: &str, map: &mut LinkMap) -> String {
    anchor_regex()
        .replace_all(html, |caps: &Captures| {
            let n = map.len();
            let attributes = caps[1].trim().to_string();
            let href = href_regex()
                .captures(&attributes)
                .and_then(|h| h.get(1).or_else(|| h.get(2)).or_else(|| h.get(3)))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let original_text = strip_tags(&caps[2]);

            let encoded = format!("{}{}{}", open_token(n), original_text, close_token(n));
            map.insert(
                open_token(n),
                LinkInfo {
                    original_html: caps[0].to_string(),
                    href,
                    original_text,
                    attributes,
                },
            );
            encoded
        })
        .into_owned()
}

/// 将占位符还原为链接
///
/// 只剩开始占位符时以原链接整体替换；两个占位符都丢失时该链接从此处消失。
pub fn decode(text: &str, map: &LinkMap) -> String {
    let mut result = text.to_string();

    for (token, info) in map.iter() {
        let Some(start) = result.find(token) else {
            continue;
        };
        let close = token.replacen("[LINK_", "[/LINK_", 1);
        let inner_start = start + token.len();

        match result[inner_start..].find(&close) {
            Some(offset) => {
                let inner_end = inner_start + offset;
                let label = result[inner_start..inner_end].trim();
                let anchor = format!("<a {}>{}</a>", info.attributes, label);
                result.replace_range(start..inner_end + close.len(), &anchor);
            }
            None => {
                tracing::debug!("链接 {} 缺少结束占位符，使用原始链接", token);
                result.replace_range(start..inner_start, &info.original_html);
            }
        }
    }

    stray_token_regex().replace_all(&result, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_links_with_shared_counter() {
        let mut map = LinkMap::new();
        let first = encode(r#"See <a href="/a" class="x">the <b>docs</b></a>."#, &mut map);
        let second = encode(r#"<a href='/b'>home</a> and <a name="top">anchor</a>"#, &mut map);

        assert_eq!(first, "See [LINK_0]the docs[/LINK_0].");
        assert_eq!(second, r#"[LINK_1]home[/LINK_1] and <a name="top">anchor</a>"#);
        assert_eq!(map.len(), 2);

        let info = map.get("[LINK_0]").expect("first link");
        assert_eq!(info.href, "/a");
        assert_eq!(info.attributes, r#"href="/a" class="x""#);
        assert_eq!(info.original_text, "the docs");
        assert_eq!(map.get("[LINK_1]").map(|i| i.href.as_str()), Some("/b"));
    }

    #[test]
    fn exact_round_trip() {
        let html = r#"<a href="https://x.com">click</a> now"#;
        let mut map = LinkMap::new();
        let encoded = encode(html, &mut map);

        assert_eq!(encoded, "[LINK_0]click[/LINK_0] now");
        assert_eq!(decode(&encoded, &map), html);
    }

    #[test]
    fn translated_label_is_kept() {
        let mut map = LinkMap::new();
        let _ = encode(r#"Go <a href="/x" target="_blank">here</a>"#, &mut map);

        let decoded = decode("Ve [LINK_0] aquí [/LINK_0]", &map);
        assert_eq!(decoded, r#"Ve <a href="/x" target="_blank">aquí</a>"#);
        assert!(contains_anchor(&decoded));
        assert!(!contains_anchor("Ve aquí"));
    }

    #[test]
    fn missing_close_token_falls_back_to_original() {
        let mut map = LinkMap::new();
        let _ = encode(r#"Go <a href="/x">here</a> now"#, &mut map);

        let decoded = decode("Ve [LINK_0]aquí ahora", &map);
        assert_eq!(decoded, r#"Ve <a href="/x">here</a>aquí ahora"#);
    }

    #[test]
    fn dropped_tokens_lose_the_link() {
        let mut map = LinkMap::new();
        let _ = encode(r#"Go <a href="/x">here</a>"#, &mut map);

        assert_eq!(decode("Ve aquí[/LINK_0]", &map), "Ve aquí");
        assert_eq!(decode("Ve aquí", &map), "Ve aquí");
    }
}
