//! 标记序列化与片段解析
//!
//! 元素内容的快照使用 `ChildrenOnly` 序列化（即 `innerHTML`），
//! 回写时以元素本身作为解析上下文，保证 `<li>`、`<td>` 等内容按原语境解析。

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_fragment, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use url::Url;

use crate::translation::error::{TranslationError, TranslationResult};

use super::dom::{get_node_attr, get_node_name, replace_children, set_node_attr};

/// 插入译文前必须移除的元素
const UNSAFE_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "link", "meta", "base", "frame", "frameset",
];

/// 需要检查协议的 URL 属性
const URL_ATTRS: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

const UNSAFE_SCHEMES: &[&str] = &["javascript", "vbscript", "data"];

/// 序列化元素的子节点（innerHTML）
pub fn inner_html(node: &Handle) -> TranslationResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };

    serialize(&mut buf, &serializable, opts)
        .map_err(|e| TranslationError::SerializationError(format!("序列化元素内容失败: {}", e)))?;

    String::from_utf8(buf)
        .map_err(|e| TranslationError::SerializationError(format!("元素内容不是有效UTF-8: {}", e)))
}

/// 以 `context` 元素为上下文解析 HTML 片段，返回顶层节点
pub fn parse_fragment_nodes(context: &Handle, html: &str) -> TranslationResult<Vec<Handle>> {
    let NodeData::Element { name, .. } = &context.data else {
        return Err(TranslationError::DomMutation(
            "片段只能写入元素节点".to_string(),
        ));
    };

    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), name.clone(), vec![])
        .one(html);

    // 片段解析器把结果放在文档下的 <html> 根元素中
    let root = dom
        .document
        .children
        .borrow()
        .first()
        .cloned()
        .ok_or_else(|| TranslationError::DomMutation("片段解析结果为空".to_string()))?;
    let nodes = root.children.borrow().clone();
    Ok(nodes)
}

/// 用 HTML 片段替换元素内容
///
/// `sanitize` 为真时先清理脚本注入相关的节点和属性。
pub fn set_inner_html(node: &Handle, html: &str, sanitize: bool) -> TranslationResult<()> {
    let nodes = parse_fragment_nodes(node, html)?;
    let nodes = if sanitize {
        sanitize_nodes(nodes)
    } else {
        nodes
    };
    replace_children(node, nodes);
    Ok(())
}

/// 递归清理片段，移除危险元素、事件属性和危险协议链接
pub fn sanitize_nodes(nodes: Vec<Handle>) -> Vec<Handle> {
    nodes
        .into_iter()
        .filter_map(|node| {
            if matches!(node.data, NodeData::Text { .. }) {
                return Some(node);
            }
            // 注释、处理指令等不回写
            let tag = get_node_name(&node)?.to_ascii_lowercase();
            if UNSAFE_ELEMENTS.contains(&tag.as_str()) {
                tracing::debug!("清理译文中的 <{}> 元素", tag);
                return None;
            }
            sanitize_attributes(&node);
            let children = node.children.borrow().clone();
            replace_children(&node, sanitize_nodes(children));
            Some(node)
        })
        .collect()
}

fn sanitize_attributes(node: &Handle) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };

    let event_attrs: Vec<String> = attrs
        .borrow()
        .iter()
        .map(|attr| attr.name.local.to_string())
        .filter(|name| name.to_ascii_lowercase().starts_with("on"))
        .collect();
    for name in event_attrs {
        set_node_attr(node, &name, None);
    }

    for attr_name in URL_ATTRS {
        if let Some(value) = get_node_attr(node, attr_name) {
            if has_unsafe_scheme(&value) {
                tracing::debug!("清理危险链接: {}", value);
                set_node_attr(node, attr_name, None);
            }
        }
    }
}

/// 判断 URL 是否使用可执行脚本的协议
pub fn has_unsafe_scheme(value: &str) -> bool {
    // 浏览器会忽略协议中的空白和控制字符
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();

    match Url::parse(&compact) {
        Ok(url) => UNSAFE_SCHEMES.contains(&url.scheme()),
        // 相对地址没有协议
        Err(_) => false,
    }
}
