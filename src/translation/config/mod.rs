//! 翻译配置管理模块
//!
//! 提供配置加载、校验，支持配置文件、环境变量和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{
    AnimationTiming, BlocksPerRequest, ConfigManager, ExtractionConfig, GroupingConfig,
    RequestConfig, TranslationSettings, TranslatorConfig,
};

/// 配置常量
pub mod constants {
    // 提取相关
    pub const MAX_TEXT_NODES: usize = 1000;
    pub const MAX_WALK_DEPTH: usize = 256;
    pub const MIN_TEXT_NODE_CHARS: usize = 5;
    pub const MIN_ITEM_CHARS: usize = 10;
    pub const ROOT_MIN_CHARS: usize = 50;
    pub const ROOT_MIN_WORDS: usize = 10;

    // 分组相关
    pub const SOFT_BLOCK_ITEMS: usize = 3;
    pub const MAX_BLOCK_ITEMS: usize = 5;
    pub const MAX_DEPTH_JUMP: usize = 2;

    // 流水线相关
    pub const DEFAULT_BLOCKS_PER_REQUEST: usize = 5;
    pub const LOOKAHEAD_DEPTH: usize = 2;
    pub const HISTORY_CAPACITY: usize = 10;

    // 请求默认值
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

    // 动画默认值（毫秒）
    pub const FADE_OUT_MS: u64 = 300;
    pub const SETTLE_MS: u64 = 400;
    pub const BLOCK_PAUSE_MS: u64 = 120;
    pub const BATCH_PAUSE_MS: u64 = 200;
    pub const RESET_DELAY_MS: u64 = 3000;

    /// 主内容区域候选选择器，按优先级排列
    pub const CONTENT_SELECTORS: &[&str] = &[
        "[role=main]",
        "main",
        "article",
        ".post-content",
        ".entry-content",
        ".article-content",
        ".article-body",
        ".content",
        "#content",
        "#main",
    ];

    /// 父元素为这些标签时文本不翻译
    pub const SKIP_PARENTS: &[&str] = &[
        "script", "style", "code", "pre", "noscript", "svg", "canvas", "textarea",
    ];

    /// 总是开始新块的标签
    pub const SECTION_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "article", "section"];

    /// 标签切换到这些块级元素时开始新块
    pub const BLOCK_TAGS: &[&str] = &["p", "div", "li", "blockquote"];

    /// 判断相邻项是否相关的容器标签
    pub const RELATED_CONTAINERS: &[&str] = &["ul", "ol", "table", "blockquote"];

    /// 判断相邻项是否相关的内容区域 class
    pub const RELATED_CONTENT_CLASSES: &[&str] =
        &["content", "post-content", "entry-content", "article-content", "article-body"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "page-translator.toml",
        ".page-translator.toml",
        "~/.config/page-translator/config.toml",
    ];
}
