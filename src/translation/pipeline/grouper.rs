//! 文本块分组
//!
//! 按文档顺序把相邻单元分成语义连贯的块（1 – 5 个单元），
//! 一个块作为一次翻译上下文和一次动画单位。

use markup5ever_rcdom::Handle;

use super::extractor::Item;
use crate::parsers::html::dom::{ancestors, get_node_name, get_parent_node, has_class, same_node};
use crate::translation::config::{constants, GroupingConfig};

/// 一起翻译、一起显示的单元序列
#[derive(Debug)]
pub struct Block {
    pub id: usize,
    pub items: Vec<Item>,
}

impl Block {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 块内所有单元原文，以空行连接
    pub fn original_text(&self) -> String {
        self.items
            .iter()
            .map(|item| item.original_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// 按结构边界分组
pub fn group(items: Vec<Item>, config: &GroupingConfig) -> Vec<Block> {
    let hard_limit = config.hard_limit.max(1);
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Vec<Item> = Vec::new();

    for item in items {
        if let Some(prev) = current.last() {
            if starts_new_block(prev, &item, current.len(), config) {
                flush(&mut blocks, &mut current);
            }
        }

        current.push(item);
        if current.len() >= hard_limit {
            flush(&mut blocks, &mut current);
        }
    }
    flush(&mut blocks, &mut current);

    tracing::debug!("分组完成: {} 个块", blocks.len());
    blocks
}

fn flush(blocks: &mut Vec<Block>, current: &mut Vec<Item>) {
    if current.is_empty() {
        return;
    }
    let id = blocks.len();
    blocks.push(Block {
        id,
        items: std::mem::take(current),
    });
}

fn starts_new_block(prev: &Item, next: &Item, current_len: usize, config: &GroupingConfig) -> bool {
    if constants::SECTION_TAGS.contains(&next.tag_name.as_str()) {
        return true;
    }

    if prev.tag_name != next.tag_name && constants::BLOCK_TAGS.contains(&next.tag_name.as_str())
    {
        return true;
    }

    if prev.depth.abs_diff(next.depth) > config.max_depth_jump {
        return true;
    }

    current_len >= config.soft_limit && !is_related(prev, next)
}

/// 同一父元素，或最近的列表/表格/引用/内容区域祖先相同
fn is_related(a: &Item, b: &Item) -> bool {
    if let (Some(pa), Some(pb)) = (get_parent_node(&a.element), get_parent_node(&b.element)) {
        if same_node(&pa, &pb) {
            return true;
        }
    }

    match (related_container(&a.element), related_container(&b.element)) {
        (Some(ca), Some(cb)) => same_node(&ca, &cb),
        _ => false,
    }
}

fn related_container(element: &Handle) -> Option<Handle> {
    ancestors(element).find(|node| {
        get_node_name(node).is_some_and(|tag| {
            constants::RELATED_CONTAINERS
                .iter()
                .any(|c| tag.eq_ignore_ascii_case(c))
        }) || constants::RELATED_CONTENT_CLASSES
            .iter()
            .any(|class| has_class(node, class))
    })
}
