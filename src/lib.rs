//! # Page Translator Library
//!
//! 渐进式网页原地翻译引擎：从页面中提取可见文本块，批量发送给外部语言模型，
//! 再按文档顺序以动画方式把译文写回页面，并支持在原文和译文之间切换。
//!
//! ## 模块组织
//!
//! - `env` - 类型化的环境变量
//! - `parsers` - HTML 解析、DOM 辅助与标记序列化
//! - `translation` - 提取、分组、编解码、流水线、动画与会话控制

pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::html_to_dom;
pub use translation::{SessionController, TranslationError, TranslationResult};
