//! 基础DOM操作
//!
//! 在外部持有的 `RcDom` 树上进行读取和原地修改。节点可能在处理过程中被移除，
//! 因此所有查找父节点的操作都返回 `Option`，而不是假设节点始终挂载。

use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> std::io::Result<RcDom> {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 判断节点是否为指定标签
pub fn is_element_named(node: &Handle, tag: &str) -> bool {
    get_node_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();

    match attr_value {
        Some(value) => {
            if let Some(attr) = attrs.iter_mut().find(|attr| &*attr.name.local == attr_name) {
                attr.value.clear();
                attr.value.push_slice(value);
            } else {
                attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", value),
                });
            }
        }
        None => attrs.retain(|attr| &*attr.name.local != attr_name),
    }
}

/// 获取父节点
///
/// `parent` 是一个 `Cell`，取出后必须放回，否则节点会与树断开。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 自下而上遍历祖先节点（不含自身）
pub fn ancestors(node: &Handle) -> impl Iterator<Item = Handle> {
    std::iter::successors(get_parent_node(node), get_parent_node)
}

/// 节点是否仍挂载在文档上
pub fn is_attached(node: &Handle) -> bool {
    ancestors(node).any(|ancestor| matches!(ancestor.data, NodeData::Document))
}

/// 节点在树中的深度（文档节点为0）
pub fn node_depth(node: &Handle) -> usize {
    ancestors(node).count()
}

/// 两个句柄是否指向同一节点
pub fn same_node(a: &Handle, b: &Handle) -> bool {
    Rc::ptr_eq(a, b)
}

/// 收集元素下所有文本（等价于 `textContent`）
pub fn text_content(node: &Handle) -> String {
    fn collect(node: &Handle, out: &mut String) {
        match &node.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            _ => {
                for child in node.children.borrow().iter() {
                    collect(child, out);
                }
            }
        }
    }

    let mut out = String::new();
    collect(node, &mut out);
    out
}

/// 折叠空白并去除首尾空白
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 读取文本节点内容
pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 元素的直接文本子节点（忽略纯空白）
pub fn direct_text_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| text_of(child).is_some_and(|text| !text.trim().is_empty()))
        .cloned()
        .collect()
}

/// 创建文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 用新的子节点列表替换元素的全部子节点
pub fn replace_children(parent: &Handle, children: Vec<Handle>) {
    for old in parent.children.borrow().iter() {
        old.parent.set(None);
    }
    for child in &children {
        child.parent.set(Some(Rc::downgrade(parent)));
    }
    *parent.children.borrow_mut() = children;
}

/// 将元素内容替换为纯文本（不会被解释为标记）
pub fn set_text_content(node: &Handle, text: &str) {
    replace_children(node, vec![create_text_node(text)]);
}

/// 深度优先查找满足条件的元素
pub fn find_elements<P>(root: &Handle, predicate: P) -> Vec<Handle>
where
    P: Fn(&Handle) -> bool,
{
    let mut found = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if matches!(node.data, NodeData::Element { .. }) && predicate(&node) {
            found.push(node.clone());
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }

    found
}

/// 获取元素的 class 列表
pub fn class_list(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// 是否包含指定 class
pub fn has_class(node: &Handle, class: &str) -> bool {
    class_list(node).iter().any(|c| c == class)
}

/// 添加 class
pub fn add_class(node: &Handle, class: &str) {
    let mut classes = class_list(node);
    if !classes.iter().any(|c| c == class) {
        classes.push(class.to_string());
        set_node_attr(node, "class", Some(&classes.join(" ")));
    }
}

/// 移除满足条件的 class，class 为空时删除属性
pub fn remove_classes<P>(node: &Handle, predicate: P)
where
    P: Fn(&str) -> bool,
{
    let classes = class_list(node);
    let kept: Vec<&String> = classes.iter().filter(|c| !predicate(c)).collect();
    if kept.len() == classes.len() {
        return;
    }
    if kept.is_empty() {
        set_node_attr(node, "class", None);
    } else {
        let joined = kept.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" ");
        set_node_attr(node, "class", Some(&joined));
    }
}
