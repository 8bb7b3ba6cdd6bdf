//! # 解析器模块
//!
//! 页面文档的解析与原地操作：
//!
//! - `html` - HTML 解析、DOM 读取与修改、innerHTML 序列化与清理

pub mod html;

pub use html::html_to_dom;
