//! 存储模块
//!
//! 提供按页面保存翻译状态的持久化接口。

pub mod state;

pub use state::{MemoryStateStore, StateStore, TranslationState, TranslationStatus};
