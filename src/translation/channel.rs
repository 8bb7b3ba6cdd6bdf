//! 翻译通道接口
//!
//! 对外部补全服务的抽象。HTTP 调用、重试与退避都属于通道实现本身，
//! 引擎只关心结果是否成功，以及失败时是否需要终止整个翻译过程。

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::translation::config::constants;
use crate::translation::error::TranslationError;

/// 一次翻译请求的附加参数
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateOptions {
    pub model: String,
    /// 最近的翻译记录，最新的在最后
    pub history: Vec<HistoryEntry>,
    /// 0.0 – 1.0
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// 令牌用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 成功的翻译响应
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSuccess {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

impl ChannelSuccess {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            model: None,
        }
    }
}

/// 失败的翻译响应
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFailure {
    /// 通道给出的错误类型，缺省时按状态码推断
    pub error_type: Option<ErrorType>,
    pub error_status: Option<u16>,
    pub is_retryable: bool,
    pub message: String,
    pub retry_after_seconds: Option<u64>,
}

impl ChannelFailure {
    /// 按 HTTP 状态码构造失败响应
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let error_type = ErrorType::from_status(status);
        Self {
            error_type: Some(error_type),
            error_status: Some(status),
            is_retryable: error_type.is_retryable(),
            message: message.into(),
            retry_after_seconds: None,
        }
    }

    /// 最终生效的错误类型
    pub fn resolved_type(&self) -> ErrorType {
        self.error_type
            .or_else(|| self.error_status.map(ErrorType::from_status))
            .unwrap_or(ErrorType::Unknown)
    }

    /// 不可重试，或属于 4xx（限流与请求超时除外）即为致命错误
    pub fn is_fatal(&self) -> bool {
        if !self.is_retryable {
            return true;
        }
        match self.error_status {
            Some(408) | Some(429) => false,
            Some(status) => (400..500).contains(&status),
            None => false,
        }
    }
}

impl From<ChannelFailure> for TranslationError {
    fn from(failure: ChannelFailure) -> Self {
        let error_type = failure.resolved_type();
        if failure.is_fatal() {
            TranslationError::ChannelFatal {
                error_type,
                status: failure.error_status,
                message: failure.message,
            }
        } else {
            TranslationError::ChannelTransient {
                error_type,
                status: failure.error_status,
                message: failure.message,
            }
        }
    }
}

pub type ChannelResult = Result<ChannelSuccess, ChannelFailure>;

/// 通道错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Authentication,
    Forbidden,
    NotFound,
    RateLimit,
    Timeout,
    Network,
    ServerError,
    ClientError,
    Unknown,
}

impl ErrorType {
    /// 按 HTTP 状态码分类
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorType::Authentication,
            403 => ErrorType::Forbidden,
            404 => ErrorType::NotFound,
            408 => ErrorType::Timeout,
            429 => ErrorType::RateLimit,
            400..=499 => ErrorType::ClientError,
            500..=599 => ErrorType::ServerError,
            _ => ErrorType::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorType::RateLimit | ErrorType::Timeout | ErrorType::Network | ErrorType::ServerError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Authentication => "authentication",
            ErrorType::Forbidden => "forbidden",
            ErrorType::NotFound => "not_found",
            ErrorType::RateLimit => "rate_limit",
            ErrorType::Timeout => "timeout",
            ErrorType::Network => "network",
            ErrorType::ServerError => "server_error",
            ErrorType::ClientError => "client_error",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 翻译通道
///
/// 实现必须是 `Send + Sync`：请求在独立任务中运行，
/// 与留在驱动任务上的 DOM 动画并行。
#[async_trait]
pub trait TranslationChannel: Send + Sync {
    async fn translate(
        &self,
        payload: &str,
        target_language: &str,
        options: &TranslateOptions,
    ) -> ChannelResult;
}

/// 一条翻译记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub original: String,
    pub translated: String,
    pub timestamp: DateTime<Utc>,
}

/// 有界的翻译历史，为通道提供术语一致性的上下文
#[derive(Debug, Clone)]
pub struct TranslationHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl TranslationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加记录，超出容量时淘汰最旧的一条
    pub fn push(&mut self, original: impl Into<String>, translated: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            original: original.into(),
            translated: translated.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按时间顺序复制当前记录
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for TranslationHistory {
    fn default() -> Self {
        Self::new(constants::HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(ChannelFailure::from_status(401, "bad key").is_fatal());
        assert!(ChannelFailure::from_status(404, "no model").is_fatal());
        assert!(!ChannelFailure::from_status(500, "oops").is_fatal());
        assert!(!ChannelFailure::from_status(429, "slow down").is_fatal());

        let failure = ChannelFailure {
            error_type: None,
            error_status: Some(403),
            is_retryable: true,
            message: "forbidden".to_string(),
            retry_after_seconds: None,
        };
        assert_eq!(failure.resolved_type(), ErrorType::Forbidden);
        assert!(failure.is_fatal(), "4xx is fatal even when marked retryable");
    }

    #[test]
    fn non_retryable_without_status_is_fatal() {
        let failure = ChannelFailure {
            error_type: Some(ErrorType::Network),
            error_status: None,
            is_retryable: false,
            message: "gave up".to_string(),
            retry_after_seconds: None,
        };

        let error = TranslationError::from(failure);
        assert!(error.is_fatal());
        assert_eq!(error.error_type(), "network");
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = TranslationHistory::new(3);
        for i in 0..5 {
            history.push(format!("o{}", i), format!("t{}", i));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].original, "o2");
        assert_eq!(snapshot[2].translated, "t4");

        history.clear();
        assert!(history.is_empty());
    }
}
