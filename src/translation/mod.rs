//! 翻译模块
//!
//! 在页面原地逐块替换可见文本，并以动画方式渐进显示译文：
//! - **pipeline**: 提取、分组、链接占位符、批次编解码与流水线调度
//! - **animation**: 单元动画阶段、内容替换与原文/译文切换
//! - **session**: 单个页面的翻译生命周期与状态发布
//! - **channel**: 外部翻译服务接口与翻译历史
//! - **storage**: 翻译状态持久化
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use page_translator::parsers::html_to_dom;
//! use page_translator::translation::{
//!     MemoryStateStore, SessionController, TranslationChannel, TranslationSettings,
//!     TranslatorConfig,
//! };
//!
//! # async fn example(channel: Arc<dyn TranslationChannel>) -> Result<(), Box<dyn std::error::Error>> {
//! let dom = html_to_dom(b"<body><p>Hello world of tests</p></body>", "utf-8")?;
//! let config = TranslatorConfig::default();
//! let settings = TranslationSettings::new("api-key", "model", "es", &config.request);
//!
//! let session = SessionController::new(
//!     "tab-1",
//!     dom.document.clone(),
//!     channel,
//!     Arc::new(MemoryStateStore::new()),
//!     config,
//! );
//! let state = session.start_translation(settings).await?;
//! println!("{}%", state.progress);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 动画与内容替换
pub mod animation;

/// 翻译服务接口与翻译历史
pub mod channel;

/// 配置管理模块 - 处理翻译相关的所有配置
pub mod config;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 文本处理管道模块
pub mod pipeline;

/// 翻译会话
pub mod session;

/// 状态存储
pub mod storage;

// ============================================================================
// 公共API重新导出
// ============================================================================

pub use animation::{AnimationEngine, DisplayState, ItemPhase};
pub use channel::{
    ChannelFailure, ChannelResult, ChannelSuccess, ErrorType, HistoryEntry, TokenUsage,
    TranslateOptions, TranslationChannel, TranslationHistory,
};
pub use config::{
    AnimationTiming, BlocksPerRequest, ConfigManager, ExtractionConfig, GroupingConfig,
    RequestConfig, TranslationSettings, TranslatorConfig,
};
pub use error::{ErrorKind, ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{group, Block, BatchRequest, Extractor, Item};
pub use session::SessionController;
pub use storage::{MemoryStateStore, StateStore, TranslationState, TranslationStatus};
