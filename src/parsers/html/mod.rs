//! HTML DOM 辅助模块
//!
//! - `dom`: 节点读取、属性、class 与子节点操作
//! - `serializer`: innerHTML 序列化、片段解析与清理

pub mod dom;
pub mod serializer;

pub use dom::{
    add_class, ancestors, get_node_attr, get_node_name, get_parent_node, html_to_dom,
    is_attached, is_element_named, node_depth, remove_classes, set_node_attr, set_text_content,
    text_content,
};
pub use serializer::{inner_html, set_inner_html};
