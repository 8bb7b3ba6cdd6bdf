//! 翻译状态与状态存储
//!
//! 状态按页面键保存，界面通过轮询或订阅读取。存储本身由宿主提供，
//! 这里给出接口和一个基于 `DashMap` 的内存实现。

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    Starting,
    Translating,
    Completed,
    Error,
}

/// 一次翻译运行对外可见的状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationState {
    pub is_translating: bool,
    pub status: TranslationStatus,
    /// 0 – 100
    pub progress: u8,
    pub total_blocks: usize,
    pub completed_blocks: usize,
    pub completed_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl TranslationState {
    pub fn starting() -> Self {
        Self {
            is_translating: true,
            status: TranslationStatus::Starting,
            progress: 0,
            total_blocks: 0,
            completed_blocks: 0,
            completed_items: 0,
            error: None,
            error_type: None,
        }
    }

    /// 按完成块数计算进度，向下取整
    pub fn compute_progress(completed_blocks: usize, total_blocks: usize) -> u8 {
        if total_blocks == 0 {
            return 0;
        }
        ((completed_blocks.min(total_blocks) * 100) / total_blocks) as u8
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TranslationStatus::Completed | TranslationStatus::Error
        )
    }
}

/// 状态持久化接口
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<TranslationState>;
    fn set(&self, key: &str, state: &TranslationState);
    fn clear(&self, key: &str);
}

/// 内存状态存储
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<DashMap<String, TranslationState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<TranslationState> {
        self.states.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, state: &TranslationState) {
        self.states.insert(key.to_string(), state.clone());
    }

    fn clear(&self, key: &str) {
        self.states.remove(key);
    }
}
