//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

use crate::translation::channel::ErrorType;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 输入验证错误（启动前检查）
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 页面中没有可翻译内容
    #[error("文本提取错误: {0}")]
    ExtractionError(String),

    /// 不可重试的通道错误，终止整个翻译过程
    #[error("翻译服务错误 ({error_type}): {message}")]
    ChannelFatal {
        error_type: ErrorType,
        status: Option<u16>,
        message: String,
    },

    /// 可恢复的通道错误，仅影响当前批次
    #[error("翻译服务暂时不可用 ({error_type}): {message}")]
    ChannelTransient {
        error_type: ErrorType,
        status: Option<u16>,
        message: String,
    },

    /// 元素已被移除或内容无法写回
    #[error("DOM修改失败: {0}")]
    DomMutation(String),

    /// 会话状态不允许该操作
    #[error("状态错误: {0}")]
    InvalidState(String),

    /// 并发错误
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 是否应终止整个翻译过程
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranslationError::ChannelFatal { .. })
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::ExtractionError(_) => ErrorSeverity::Warning,
            TranslationError::ChannelFatal { .. } => ErrorSeverity::Critical,
            TranslationError::ChannelTransient { .. } => ErrorSeverity::Warning,
            TranslationError::DomMutation(_) => ErrorSeverity::Warning,
            TranslationError::InvalidState(_) => ErrorSeverity::Info,
            TranslationError::ConcurrencyError(_) => ErrorSeverity::Warning,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::ConfigError(_) | TranslationError::InvalidInput(_) => {
                ErrorKind::Validation
            }
            TranslationError::ExtractionError(_) => ErrorKind::Extraction,
            TranslationError::ChannelFatal { .. } => ErrorKind::ChannelFatal,
            TranslationError::ChannelTransient { .. } | TranslationError::ConcurrencyError(_) => {
                ErrorKind::ChannelTransient
            }
            TranslationError::DomMutation(_) | TranslationError::SerializationError(_) => {
                ErrorKind::DomMutation
            }
            TranslationError::InvalidState(_) => ErrorKind::State,
            TranslationError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// 上报给界面的错误类型字符串
    pub fn error_type(&self) -> String {
        match self {
            TranslationError::ChannelFatal { error_type, .. }
            | TranslationError::ChannelTransient { error_type, .. } => {
                error_type.as_str().to_string()
            }
            other => other.kind().as_str().to_string(),
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Extraction,
    ChannelFatal,
    ChannelTransient,
    DomMutation,
    State,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Extraction => "extraction",
            ErrorKind::ChannelFatal => "channel-fatal",
            ErrorKind::ChannelTransient => "channel-transient",
            ErrorKind::DomMutation => "dom-mutation",
            ErrorKind::State => "state",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(format!("配置错误: {}", error))
    }
}

impl From<tokio::task::JoinError> for TranslationError {
    fn from(error: tokio::task::JoinError) -> Self {
        TranslationError::ConcurrencyError(format!("翻译请求任务异常结束: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }
}
