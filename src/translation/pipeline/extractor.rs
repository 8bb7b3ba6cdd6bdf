//! 文本块提取器
//!
//! 在主内容区域内按文档顺序查找可翻译的文本节点，并把同一父元素下的
//! 所有文本合并为一个 [`Item`]。提取过程只读，不修改文档。

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::walker::TextNodeWalker;
use crate::parsers::html::dom::{
    ancestors, find_elements, get_node_attr, get_node_name, get_parent_node, has_class,
    is_element_named, node_depth, normalize_whitespace, text_content, text_of,
};
use crate::parsers::html::serializer::inner_html;
use crate::translation::config::{constants, ExtractionConfig};
use crate::translation::error::{TranslationError, TranslationResult};

/// 一个可翻译单元，绑定到唯一的页面元素
///
/// 快照字段在创建后不再改变，只有绑定元素的实际内容会被修改。
pub struct Item {
    pub element: Handle,
    /// 提取时的扁平化文本
    pub original_text: String,
    /// 提取时的 innerHTML 快照
    pub original_inner_html: String,
    pub has_links: bool,
    pub all_text_nodes: Vec<Handle>,
    pub tag_name: String,
    pub depth: usize,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("tag_name", &self.tag_name)
            .field("depth", &self.depth)
            .field("original_text", &self.original_text)
            .field("has_links", &self.has_links)
            .field("text_nodes", &self.all_text_nodes.len())
            .finish()
    }
}

impl Item {
    /// 发送给翻译服务的文本：含链接时使用 HTML，否则使用纯文本
    pub fn source_html(&self) -> &str {
        if self.has_links {
            &self.original_inner_html
        } else {
            &self.original_text
        }
    }

    pub fn char_count(&self) -> usize {
        self.original_text.chars().count()
    }
}

/// 元素可见性探测
///
/// 页面样式由宿主计算，提取器只通过此接口询问。探测失败不会导致节点被跳过。
pub trait StyleProbe {
    fn is_hidden(&self, element: &Handle) -> TranslationResult<bool>;
}

/// 基于 `hidden` 属性和内联 `style` 的可见性探测
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineStyleProbe;

impl InlineStyleProbe {
    fn inline_hidden(element: &Handle) -> TranslationResult<bool> {
        if get_node_attr(element, "hidden").is_some() {
            return Ok(true);
        }

        let Some(style) = get_node_attr(element, "style") else {
            return Ok(false);
        };

        for declaration in style.split(';').map(str::trim).filter(|d| !d.is_empty()) {
            let (property, value) = declaration.split_once(':').ok_or_else(|| {
                TranslationError::ExtractionError(format!("无法解析样式声明 '{}'", declaration))
            })?;
            let property = property.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();

            match (property.as_str(), value.as_str()) {
                ("display", "none") => return Ok(true),
                ("visibility", "hidden") | ("visibility", "collapse") => return Ok(true),
                _ => {}
            }
        }

        Ok(false)
    }
}

impl StyleProbe for InlineStyleProbe {
    fn is_hidden(&self, element: &Handle) -> TranslationResult<bool> {
        // 隐藏的祖先会让整个子树不可见
        for node in std::iter::once(element.clone()).chain(ancestors(element)) {
            if matches!(node.data, NodeData::Element { .. }) && Self::inline_hidden(&node)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// 主内容区域候选选择器，仅支持单一的标签、class、id 或属性等值选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Tag(String),
    Class(String),
    Id(String),
    Attribute { name: String, value: String },
}

impl SimpleSelector {
    pub fn parse(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if let Some(class) = selector.strip_prefix('.') {
            return (!class.is_empty()).then(|| SimpleSelector::Class(class.to_string()));
        }
        if let Some(id) = selector.strip_prefix('#') {
            return (!id.is_empty()).then(|| SimpleSelector::Id(id.to_string()));
        }
        if let Some(inner) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let (name, value) = inner.split_once('=')?;
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            return Some(SimpleSelector::Attribute {
                name: name.trim().to_ascii_lowercase(),
                value: value.to_string(),
            });
        }
        if !selector.is_empty()
            && selector
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Some(SimpleSelector::Tag(selector.to_ascii_lowercase()));
        }
        None
    }

    pub fn matches(&self, node: &Handle) -> bool {
        match self {
            SimpleSelector::Tag(tag) => is_element_named(node, tag),
            SimpleSelector::Class(class) => has_class(node, class),
            SimpleSelector::Id(id) => get_node_attr(node, "id").as_deref() == Some(id.as_str()),
            SimpleSelector::Attribute { name, value } => {
                get_node_attr(node, name).as_deref() == Some(value.as_str())
            }
        }
    }
}

/// 提取统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub text_nodes_visited: usize,
    /// 被含直接文本的父元素替代的子孙单元数
    pub merged_into_parent: usize,
    pub skipped_short: usize,
    pub skipped_excluded: usize,
    pub skipped_hidden: usize,
    pub skipped_duplicate: usize,
    pub probe_failures: usize,
    pub items: usize,
    pub hit_node_limit: bool,
}

/// 文本块提取器
pub struct Extractor<P: StyleProbe = InlineStyleProbe> {
    config: ExtractionConfig,
    selectors: Vec<SimpleSelector>,
    probe: P,
    stats: ExtractionStats,
}

impl Extractor<InlineStyleProbe> {
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_probe(config, InlineStyleProbe)
    }
}

impl<P: StyleProbe> Extractor<P> {
    pub fn with_probe(config: ExtractionConfig, probe: P) -> Self {
        let selectors = config
            .content_selectors
            .iter()
            .filter_map(|s| {
                let parsed = SimpleSelector::parse(s);
                if parsed.is_none() {
                    tracing::warn!("忽略不支持的内容选择器: {}", s);
                }
                parsed
            })
            .collect();

        Self {
            config,
            selectors,
            probe,
            stats: ExtractionStats::default(),
        }
    }

    /// 最近一次提取的统计
    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// 选择主内容根节点：依次尝试候选选择器，文本量不足时回退到 body，再回退到文档本身
    pub fn select_root(&self, document: &Handle) -> Handle {
        for selector in &self.selectors {
            let candidate = find_elements(document, |node| selector.matches(node))
                .into_iter()
                .next();
            if let Some(candidate) = candidate {
                if self.has_text_mass(&candidate) {
                    tracing::debug!("使用内容根节点: {:?}", selector);
                    return candidate;
                }
            }
        }

        find_elements(document, |node| is_element_named(node, "body"))
            .into_iter()
            .next()
            .unwrap_or_else(|| document.clone())
    }

    fn has_text_mass(&self, node: &Handle) -> bool {
        let text = normalize_whitespace(&text_content(node));
        text.chars().count() > self.config.root_min_chars
            && text.split_whitespace().count() > self.config.root_min_words
    }

    /// 提取可翻译单元
    pub fn extract(&mut self, document: &Handle) -> Vec<Item> {
        self.stats = ExtractionStats::default();

        let root = self.select_root(document);
        let mut walker =
            TextNodeWalker::new(&root, self.config.max_text_nodes, self.config.max_depth);
        let mut processed: HashSet<*const markup5ever_rcdom::Node> = HashSet::new();
        let mut items: Vec<Item> = Vec::new();

        for text_node in walker.by_ref() {
            let text = text_of(&text_node).unwrap_or_default();
            if text.trim().chars().count() < self.config.min_text_node_chars {
                self.stats.skipped_short += 1;
                continue;
            }

            // 节点在遍历过程中被移除属于预期情况
            let Some(parent) = get_parent_node(&text_node) else {
                continue;
            };

            if processed.contains(&Rc::as_ptr(&parent)) {
                self.stats.skipped_duplicate += 1;
                continue;
            }

            if is_excluded(&parent) {
                self.stats.skipped_excluded += 1;
                continue;
            }

            match self.probe.is_hidden(&parent) {
                Ok(true) => {
                    self.stats.skipped_hidden += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    self.stats.probe_failures += 1;
                    tracing::debug!("样式探测失败，按可见处理: {}", e);
                }
            }

            if ancestors(&parent).any(|a| processed.contains(&Rc::as_ptr(&a))) {
                self.stats.skipped_duplicate += 1;
                processed.insert(Rc::as_ptr(&parent));
                continue;
            }

            processed.insert(Rc::as_ptr(&parent));

            match self.build_item(&parent) {
                Ok(Some(item)) => {
                    // 混合内容：父元素自身还有文本时由父元素整体替代已提取的子孙单元
                    let before = items.len();
                    items.retain(|existing| {
                        !ancestors(&existing.element).any(|a| Rc::ptr_eq(&a, &parent))
                    });
                    if items.len() < before {
                        self.stats.merged_into_parent += before - items.len();
                        tracing::debug!(
                            "<{}> 含有直接文本，合并 {} 个子孙单元",
                            item.tag_name,
                            before - items.len()
                        );
                    }
                    items.push(item);
                }
                Ok(None) => self.stats.skipped_short += 1,
                Err(e) => tracing::warn!("跳过无法读取的元素: {}", e),
            }
        }

        self.stats.text_nodes_visited = walker.visited();

        self.stats.hit_node_limit = walker.hit_limit();
        if self.stats.hit_node_limit {
            tracing::warn!(
                "文本节点数量达到上限 {}，剩余内容不再提取",
                self.config.max_text_nodes
            );
        }

        self.stats.items = items.len();
        tracing::debug!("提取完成: {:?}", self.stats);
        items
    }

    fn build_item(&self, element: &Handle) -> TranslationResult<Option<Item>> {
        let original_text = normalize_whitespace(&text_content(element));
        let tag_name = get_node_name(element).unwrap_or_default().to_ascii_lowercase();
        // 标题天然较短，不受最小长度限制
        let is_heading = matches!(tag_name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6");
        if !is_heading && original_text.chars().count() < self.config.min_item_chars {
            return Ok(None);
        }

        let original_inner_html = inner_html(element)?;
        let has_links = !find_elements(element, |node| {
            is_element_named(node, "a") && get_node_attr(node, "href").is_some()
        })
        .is_empty();
        let all_text_nodes =
            TextNodeWalker::new(element, self.config.max_text_nodes, self.config.max_depth)
                .collect();

        Ok(Some(Item {
            element: element.clone(),
            original_text,
            original_inner_html,
            has_links,
            all_text_nodes,
            tag_name,
            depth: node_depth(element),
        }))
    }
}

/// 父元素是否被排除：不可翻译的标签或显式退出标记
fn is_excluded(parent: &Handle) -> bool {
    let Some(tag) = get_node_name(parent) else {
        return true;
    };
    if constants::SKIP_PARENTS
        .iter()
        .any(|skip| tag.eq_ignore_ascii_case(skip))
    {
        return true;
    }

    get_node_attr(parent, "aria-hidden").as_deref() == Some("true")
        || get_node_attr(parent, "translate").is_some_and(|v| v.eq_ignore_ascii_case("no"))
        || get_node_attr(parent, "data-no-translate").is_some()
        || has_class(parent, "notranslate")
}
