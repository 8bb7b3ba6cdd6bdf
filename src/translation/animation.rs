//! 动画与内容替换引擎
//!
//! 每个单元依次经过四个阶段：准备 → 淡出 → 显示 → 稳定，不可跳过。
//! 替换内容前把原始内容记录到元素属性上，之后可以随时在原文和译文之间整体切换。

use std::time::Duration;

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{
    add_class, class_list, find_elements, get_node_attr, is_attached, remove_classes,
    set_node_attr, set_text_content, text_of,
};
use crate::parsers::html::serializer::{inner_html, set_inner_html};
use crate::translation::config::AnimationTiming;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{link_codec, Block, Item};

/// 所有阶段 class 的公共前缀
pub const PHASE_CLASS_PREFIX: &str = "ai-translate-";

/// 元素属性名
pub mod attrs {
    pub const STATE: &str = "data-translation-state";
    pub const ORIGINAL_HTML: &str = "data-original-html";
    pub const ORIGINAL_TEXT: &str = "data-original-text";
    pub const TRANSLATED_TEXT: &str = "data-translated-text";
    pub const TRANSLATED_HTML: &str = "data-translated-html";
    pub const TEXT_NODES: &str = "data-original-text-nodes";
}

/// 单元动画阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPhase {
    Preparing,
    FadingOut,
    Revealed,
    Settled,
    Error,
}

impl ItemPhase {
    pub fn class_name(&self) -> &'static str {
        match self {
            ItemPhase::Preparing => "ai-translate-preparing",
            ItemPhase::FadingOut => "ai-translate-fading-out",
            ItemPhase::Revealed => "ai-translate-revealed",
            ItemPhase::Settled => "ai-translate-settled",
            ItemPhase::Error => "ai-translate-error",
        }
    }
}

/// 页面整体显示状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Translated,
    ShowingOriginal,
}

impl DisplayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayState::Translated => "translated",
            DisplayState::ShowingOriginal => "showing-original",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "translated" => Some(DisplayState::Translated),
            "showing-original" => Some(DisplayState::ShowingOriginal),
            _ => None,
        }
    }

    fn flipped(self) -> Self {
        match self {
            DisplayState::Translated => DisplayState::ShowingOriginal,
            DisplayState::ShowingOriginal => DisplayState::Translated,
        }
    }
}

/// 设置元素的阶段 class，移除之前的阶段
pub fn set_phase(element: &Handle, phase: ItemPhase) {
    remove_classes(element, |class| class.starts_with(PHASE_CLASS_PREFIX));
    add_class(element, phase.class_name());
}

async fn hold(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// 动画引擎
#[derive(Debug, Clone, Default)]
pub struct AnimationEngine {
    timing: AnimationTiming,
}

impl AnimationEngine {
    pub fn new(timing: AnimationTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> &AnimationTiming {
        &self.timing
    }

    /// 批次开始时把所有单元置为准备状态
    pub fn mark_preparing(&self, blocks: &[Block]) {
        for item in blocks.iter().flat_map(|block| block.items.iter()) {
            if is_attached(&item.element) {
                set_phase(&item.element, ItemPhase::Preparing);
            }
        }
    }

    pub fn mark_failed(&self, item: &Item) {
        set_phase(&item.element, ItemPhase::Error);
    }

    pub fn mark_block_failed(&self, block: &Block) {
        for item in &block.items {
            self.mark_failed(item);
        }
    }

    /// 执行一个单元的淡出、替换和稳定阶段
    pub async fn reveal_item(&self, item: &Item, translated: &str) -> TranslationResult<()> {
        ensure_attached(item)?;
        set_phase(&item.element, ItemPhase::FadingOut);
        hold(self.timing.fade_out()).await;

        // 等待期间元素可能已被页面移除
        ensure_attached(item)?;
        capture_original(item);
        apply_translation(&item.element, translated)?;
        set_phase(&item.element, ItemPhase::Revealed);

        hold(self.timing.settle()).await;
        set_phase(&item.element, ItemPhase::Settled);
        Ok(())
    }

    /// 依次显示块内单元，单个单元失败不影响其他单元
    ///
    /// 每个成功的单元调用一次 `on_item`，返回成功数量。
    pub async fn reveal_block<C>(
        &self,
        block: &Block,
        translations: &[String],
        mut on_item: C,
    ) -> usize
    where
        C: FnMut(usize),
    {
        let mut revealed = 0;
        for (index, item) in block.items.iter().enumerate() {
            let Some(translated) = translations.get(index) else {
                tracing::warn!("块 {} 缺少第 {} 个单元的译文", block.id, index);
                self.mark_failed(item);
                continue;
            };

            match self.reveal_item(item, translated).await {
                Ok(()) => {
                    revealed += 1;
                    on_item(index);
                }
                Err(e) => {
                    tracing::warn!("块 {} 第 {} 个单元显示失败: {}", block.id, index, e);
                    self.mark_failed(item);
                }
            }
        }
        revealed
    }

    /// 已被替换过内容的元素
    pub fn mutated_elements(&self, root: &Handle) -> Vec<Handle> {
        find_elements(root, |node| get_node_attr(node, attrs::STATE).is_some())
    }

    /// 移除上一次运行留下的阶段 class，替换记录保留
    pub fn clear_artifacts(&self, root: &Handle) {
        for element in find_elements(root, |node| {
            class_list(node)
                .iter()
                .any(|class| class.starts_with(PHASE_CLASS_PREFIX))
        }) {
            remove_classes(&element, |class| class.starts_with(PHASE_CLASS_PREFIX));
        }
    }

    /// 整体切换原文与译文，返回切换后的状态
    pub fn toggle_all(&self, root: &Handle) -> TranslationResult<DisplayState> {
        let elements = self.mutated_elements(root);
        let current = elements
            .first()
            .and_then(|element| get_node_attr(element, attrs::STATE))
            .and_then(|state| DisplayState::parse(&state))
            .ok_or_else(|| TranslationError::InvalidState("页面上还没有已翻译的内容".to_string()))?;
        let target = current.flipped();

        for element in &elements {
            let result = match target {
                DisplayState::ShowingOriginal => restore_original(element),
                DisplayState::Translated => restore_translation(element),
            };
            match result {
                Ok(()) => set_node_attr(element, attrs::STATE, Some(target.as_str())),
                Err(e) => tracing::warn!("切换元素内容失败: {}", e),
            }
        }

        tracing::info!("切换显示状态: {} 个元素 -> {}", elements.len(), target.as_str());
        Ok(target)
    }
}

fn ensure_attached(item: &Item) -> TranslationResult<()> {
    if is_attached(&item.element) {
        Ok(())
    } else {
        Err(TranslationError::DomMutation(format!(
            "<{}> 元素已不在文档中",
            item.tag_name
        )))
    }
}

/// 记录原始内容，已有记录时保持不变
fn capture_original(item: &Item) {
    let element = &item.element;
    if get_node_attr(element, attrs::ORIGINAL_HTML).is_some() {
        return;
    }

    set_node_attr(element, attrs::ORIGINAL_HTML, Some(&item.original_inner_html));
    set_node_attr(element, attrs::ORIGINAL_TEXT, Some(&item.original_text));

    let nodes: Vec<String> = item.all_text_nodes.iter().filter_map(text_of).collect();
    match serde_json::to_string(&nodes) {
        Ok(json) => set_node_attr(element, attrs::TEXT_NODES, Some(&json)),
        Err(e) => tracing::debug!("无法记录文本节点: {}", e),
    }
}

/// 写入译文：含链接时按清理后的标记写入，否则只写纯文本
fn apply_translation(element: &Handle, translated: &str) -> TranslationResult<()> {
    if link_codec::contains_anchor(translated) {
        set_inner_html(element, translated, true)?;
    } else {
        set_text_content(element, translated);
    }

    set_node_attr(element, attrs::TRANSLATED_TEXT, Some(translated));
    set_node_attr(element, attrs::TRANSLATED_HTML, Some(&inner_html(element)?));
    set_node_attr(element, attrs::STATE, Some(DisplayState::Translated.as_str()));
    Ok(())
}

fn restore_original(element: &Handle) -> TranslationResult<()> {
    if let Some(html) = get_node_attr(element, attrs::ORIGINAL_HTML) {
        return set_inner_html(element, &html, false);
    }
    if let Some(text) = get_node_attr(element, attrs::ORIGINAL_TEXT) {
        set_text_content(element, &text);
        return Ok(());
    }
    if let Some(json) = get_node_attr(element, attrs::TEXT_NODES) {
        let nodes: Vec<String> = serde_json::from_str(&json)?;
        set_text_content(element, &nodes.concat());
        return Ok(());
    }
    Err(TranslationError::DomMutation("元素缺少原文记录".to_string()))
}

fn restore_translation(element: &Handle) -> TranslationResult<()> {
    if let Some(html) = get_node_attr(element, attrs::TRANSLATED_HTML) {
        // 写入时已经清理过
        return set_inner_html(element, &html, false);
    }
    match get_node_attr(element, attrs::TRANSLATED_TEXT) {
        Some(text) if link_codec::contains_anchor(&text) => set_inner_html(element, &text, true),
        Some(text) => {
            set_text_content(element, &text);
            Ok(())
        }
        None => Err(TranslationError::DomMutation("元素缺少译文记录".to_string())),
    }
}
