//! 配置管理器
//!
//! 提供统一的配置接口：默认值 → 配置文件 → 环境变量，加载后统一校验

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::env::{animation, translation, EnvVar};
use crate::translation::error::{helpers, TranslationError, TranslationResult};

/// 每个请求包含的块数，仅支持 3、5、8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum BlocksPerRequest {
    Three,
    #[default]
    Five,
    Eight,
}

impl BlocksPerRequest {
    pub fn get(self) -> usize {
        match self {
            BlocksPerRequest::Three => 3,
            BlocksPerRequest::Five => 5,
            BlocksPerRequest::Eight => 8,
        }
    }
}

impl TryFrom<usize> for BlocksPerRequest {
    type Error = TranslationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(BlocksPerRequest::Three),
            5 => Ok(BlocksPerRequest::Five),
            8 => Ok(BlocksPerRequest::Eight),
            other => Err(helpers::config_error(format!(
                "不支持的每请求块数 {}，可选值: 3, 5, 8",
                other
            ))),
        }
    }
}

impl From<BlocksPerRequest> for usize {
    fn from(value: BlocksPerRequest) -> Self {
        value.get()
    }
}

/// 请求参数默认值
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    pub blocks_per_request: BlocksPerRequest,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            blocks_per_request: BlocksPerRequest::default(),
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,
            timeout_ms: constants::DEFAULT_TIMEOUT_MS,
        }
    }
}

/// 文本提取配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// 最多访问的候选文本节点数
    pub max_text_nodes: usize,
    pub max_depth: usize,
    pub min_text_node_chars: usize,
    pub min_item_chars: usize,
    pub root_min_chars: usize,
    pub root_min_words: usize,
    pub content_selectors: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_text_nodes: constants::MAX_TEXT_NODES,
            max_depth: constants::MAX_WALK_DEPTH,
            min_text_node_chars: constants::MIN_TEXT_NODE_CHARS,
            min_item_chars: constants::MIN_ITEM_CHARS,
            root_min_chars: constants::ROOT_MIN_CHARS,
            root_min_words: constants::ROOT_MIN_WORDS,
            content_selectors: constants::CONTENT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 分组配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GroupingConfig {
    pub soft_limit: usize,
    pub hard_limit: usize,
    pub max_depth_jump: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            soft_limit: constants::SOFT_BLOCK_ITEMS,
            hard_limit: constants::MAX_BLOCK_ITEMS,
            max_depth_jump: constants::MAX_DEPTH_JUMP,
        }
    }
}

/// 动画节奏（毫秒）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnimationTiming {
    pub fade_out_ms: u64,
    pub settle_ms: u64,
    pub block_pause_ms: u64,
    pub batch_pause_ms: u64,
    pub reset_delay_ms: u64,
}

impl AnimationTiming {
    /// 所有等待为零，用于测试和无界面场景
    pub fn immediate() -> Self {
        Self {
            fade_out_ms: 0,
            settle_ms: 0,
            block_pause_ms: 0,
            batch_pause_ms: 0,
            reset_delay_ms: 0,
        }
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn block_pause(&self) -> Duration {
        Duration::from_millis(self.block_pause_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            fade_out_ms: constants::FADE_OUT_MS,
            settle_ms: constants::SETTLE_MS,
            block_pause_ms: constants::BLOCK_PAUSE_MS,
            batch_pause_ms: constants::BATCH_PAUSE_MS,
            reset_delay_ms: constants::RESET_DELAY_MS,
        }
    }
}

/// 翻译器配置
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub request: RequestConfig,
    pub extraction: ExtractionConfig,
    pub grouping: GroupingConfig,
    pub animation: AnimationTiming,
}

impl TranslatorConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        let grouping = &self.grouping;
        if grouping.soft_limit == 0 || grouping.soft_limit > grouping.hard_limit {
            return Err(helpers::config_error(format!(
                "分组软上限 {} 必须在 1 到硬上限 {} 之间",
                grouping.soft_limit, grouping.hard_limit
            )));
        }
        if grouping.hard_limit > constants::MAX_BLOCK_ITEMS {
            return Err(helpers::config_error(format!(
                "分组硬上限不能超过 {}",
                constants::MAX_BLOCK_ITEMS
            )));
        }

        if self.extraction.max_text_nodes == 0 || self.extraction.max_depth == 0 {
            return Err(helpers::config_error("提取节点上限和深度上限必须大于0"));
        }

        if !(0.0..=1.0).contains(&self.request.temperature) {
            return Err(helpers::config_error(format!(
                "温度 {} 超出 0.0 – 1.0 范围",
                self.request.temperature
            )));
        }

        if self.request.max_tokens == 0 || self.request.timeout_ms == 0 {
            return Err(helpers::config_error("最大令牌数和超时时间必须大于0"));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        fn apply<T, V: EnvVar<T>>(target: &mut T) {
            match V::lookup() {
                Ok(Some(value)) => *target = value,
                Ok(None) => {}
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        match translation::BlocksPerRequest::lookup() {
            Ok(Some(count)) => match BlocksPerRequest::try_from(count) {
                Ok(value) => self.request.blocks_per_request = value,
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
        }

        apply::<_, translation::Temperature>(&mut self.request.temperature);
        apply::<_, translation::MaxTokens>(&mut self.request.max_tokens);
        apply::<_, translation::TimeoutMs>(&mut self.request.timeout_ms);
        apply::<_, animation::FadeOutMs>(&mut self.animation.fade_out_ms);
        apply::<_, animation::SettleMs>(&mut self.animation.settle_ms);
        apply::<_, animation::ResetDelayMs>(&mut self.animation.reset_delay_ms);
    }
}

/// 启动一次翻译所需的设置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationSettings {
    pub api_key: String,
    pub model: String,
    pub target_language: String,
    #[serde(default)]
    pub blocks_per_request: BlocksPerRequest,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_temperature() -> f32 {
    constants::DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    constants::DEFAULT_MAX_TOKENS
}

fn default_timeout_ms() -> u64 {
    constants::DEFAULT_TIMEOUT_MS
}

impl TranslationSettings {
    /// 使用请求配置中的默认参数创建设置
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        target_language: impl Into<String>,
        request: &RequestConfig,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            target_language: target_language.into(),
            blocks_per_request: request.blocks_per_request,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            timeout_ms: request.timeout_ms,
        }
    }

    /// 启动前校验，任何一项不通过都不会开始翻译
    pub fn validate(&self) -> TranslationResult<()> {
        for (field, value) in [
            ("apiKey", &self.api_key),
            ("model", &self.model),
            ("targetLanguage", &self.target_language),
        ] {
            if value.trim().is_empty() {
                return Err(helpers::validation_error(format!("{} 不能为空", field)));
            }
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(helpers::validation_error(format!(
                "temperature {} 超出 0.0 – 1.0 范围",
                self.temperature
            )));
        }

        if self.max_tokens == 0 || self.timeout_ms == 0 {
            return Err(helpers::validation_error("maxTokens 和 timeoutMs 必须大于0"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslatorConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 从默认搜索路径加载配置
    pub fn new() -> TranslationResult<Self> {
        let path = Self::search_paths().into_iter().find(|p| p.exists());
        Self::load(path, false)
    }

    /// 展开 `~` 后的配置文件搜索路径，按优先级排列
    pub fn search_paths() -> Vec<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
            .collect()
    }

    /// 从指定文件加载配置，文件必须存在
    pub fn from_path(path: impl AsRef<Path>) -> TranslationResult<Self> {
        Self::load(Some(path.as_ref().to_path_buf()), true)
    }

    fn load(path: Option<PathBuf>, required: bool) -> TranslationResult<Self> {
        // 首先尝试加载 .env 文件
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("未加载 .env 文件: {}", e);
        }

        let mut builder = Config::builder().add_source(
            Config::try_from(&TranslatorConfig::default())
                .map_err(|e| helpers::config_error(format!("默认配置错误: {}", e)))?,
        );

        if let Some(ref path) = path {
            tracing::info!("加载配置文件: {}", path.display());
            builder = builder.add_source(File::from(path.clone()).required(required));
        }

        let mut config: TranslatorConfig = builder.build()?.try_deserialize()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config,
            config_path: path,
        })
    }

    /// 获取当前配置
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslatorConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = TranslatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request.blocks_per_request.get(), 5);
        assert_eq!(config.grouping.hard_limit, 5);
    }

    #[test]
    fn blocks_per_request_rejects_unsupported_sizes() {
        assert_eq!(BlocksPerRequest::try_from(8).ok(), Some(BlocksPerRequest::Eight));
        assert!(BlocksPerRequest::try_from(4).is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "[request]\nblocks_per_request = 3\n\n[animation]\nfade_out_ms = 10"
        )
        .expect("write config");

        let manager = ConfigManager::from_path(file.path()).expect("load config");
        let config = manager.config();
        assert_eq!(config.request.blocks_per_request, BlocksPerRequest::Three);
        assert_eq!(config.animation.fade_out_ms, 10);
        assert_eq!(config.grouping, GroupingConfig::default());
    }

    #[test]
    fn search_paths_expand_home_directory() {
        let paths = ConfigManager::search_paths();
        assert_eq!(paths.len(), constants::CONFIG_PATHS.len());
        assert_eq!(paths[0], PathBuf::from("page-translator.toml"));

        let user_config = &paths[2];
        assert!(user_config.ends_with(".config/page-translator/config.toml"));
        if std::env::var_os("HOME").is_some() {
            assert!(!user_config.starts_with("~"));
        }
    }

    #[test]
    fn invalid_grouping_is_rejected() {
        let mut config = TranslatorConfig::default();
        config.grouping.soft_limit = 6;
        assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn settings_require_non_empty_strings() {
        let request = RequestConfig::default();
        let settings = TranslationSettings::new("key", "model-x", "es", &request);
        assert!(settings.validate().is_ok());

        let missing_key = TranslationSettings::new("  ", "model-x", "es", &request);
        let error = missing_key.validate().expect_err("empty key must fail");
        assert!(error.to_string().contains("apiKey"));

        let missing_lang = TranslationSettings::new("key", "model-x", "", &request);
        assert!(matches!(
            missing_lang.validate(),
            Err(TranslationError::InvalidInput(_))
        ));
    }

    #[test]
    fn settings_deserialize_from_camel_case() {
        let settings: TranslationSettings = serde_json::from_str(
            r#"{"apiKey":"k","model":"m","targetLanguage":"fr","blocksPerRequest":8}"#,
        )
        .expect("parse settings");
        assert_eq!(settings.blocks_per_request, BlocksPerRequest::Eight);
        assert_eq!(settings.max_tokens, constants::DEFAULT_MAX_TOKENS);
    }
}
