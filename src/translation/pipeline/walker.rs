//! 有界文本节点遍历器
//!
//! 按文档顺序惰性产出非空白文本节点。遍历使用显式栈，
//! 受节点数量和深度两个上限约束，遍历结束后不可重启。

use markup5ever_rcdom::{Handle, NodeData};

/// 深度优先的文本节点迭代器
pub struct TextNodeWalker {
    stack: Vec<(Handle, usize)>,
    max_nodes: usize,
    max_depth: usize,
    yielded: usize,
}

impl TextNodeWalker {
    pub fn new(root: &Handle, max_nodes: usize, max_depth: usize) -> Self {
        Self {
            stack: vec![(root.clone(), 0)],
            max_nodes,
            max_depth,
            yielded: 0,
        }
    }

    /// 已产出的文本节点数
    pub fn visited(&self) -> usize {
        self.yielded
    }

    /// 是否因为节点上限而提前结束
    pub fn hit_limit(&self) -> bool {
        self.yielded >= self.max_nodes && !self.stack.is_empty()
    }
}

impl Iterator for TextNodeWalker {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        if self.yielded >= self.max_nodes {
            return None;
        }

        while let Some((node, depth)) = self.stack.pop() {
            match &node.data {
                NodeData::Text { contents } => {
                    if contents.borrow().trim().is_empty() {
                        continue;
                    }
                    self.yielded += 1;
                    return Some(node);
                }
                NodeData::Document | NodeData::Element { .. } => {
                    if depth >= self.max_depth {
                        continue;
                    }
                    let children = node.children.borrow();
                    self.stack
                        .extend(children.iter().rev().map(|child| (child.clone(), depth + 1)));
                }
                _ => {}
            }
        }

        None
    }
}
