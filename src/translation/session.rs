//! 翻译会话控制器
//!
//! 管理单个页面的翻译生命周期：
//! `idle → starting → translating → completed | error → idle`。
//! 每次状态变化和每个单元完成后都会把状态快照写入状态存储。
//!
//! 控制器本身不是 `Send`：它持有页面 DOM 句柄，应在驱动页面的任务上使用。
//! 翻译请求由流水线在独立任务中执行。

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use markup5ever_rcdom::Handle;

use crate::translation::animation::{AnimationEngine, DisplayState};
use crate::translation::channel::{
    ErrorType, TranslateOptions, TranslationChannel, TranslationHistory,
};
use crate::translation::config::{TranslationSettings, TranslatorConfig};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::pipeline::{
    group, BatchFuture, BatchPipeline, BatchRequest, Block, Extractor,
};
use crate::translation::storage::{StateStore, TranslationState, TranslationStatus};

async fn hold(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// 运行结束时释放重入标记
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// 页面翻译会话
pub struct SessionController {
    page_key: String,
    document: Handle,
    channel: Arc<dyn TranslationChannel>,
    store: Arc<dyn StateStore>,
    config: TranslatorConfig,
    engine: AnimationEngine,
    running: Cell<bool>,
    stop_requested: Cell<bool>,
    generation: Cell<u64>,
    history: RefCell<TranslationHistory>,
    state: RefCell<Option<TranslationState>>,
}

impl SessionController {
    pub fn new(
        page_key: impl Into<String>,
        document: Handle,
        channel: Arc<dyn TranslationChannel>,
        store: Arc<dyn StateStore>,
        config: TranslatorConfig,
    ) -> Self {
        let engine = AnimationEngine::new(config.animation.clone());
        Self {
            page_key: page_key.into(),
            document,
            channel,
            store,
            config,
            engine,
            running: Cell::new(false),
            stop_requested: Cell::new(false),
            generation: Cell::new(0),
            history: RefCell::new(TranslationHistory::default()),
            state: RefCell::new(None),
        }
    }

    pub fn page_key(&self) -> &str {
        &self.page_key
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// 最近一次发布的状态
    pub fn state(&self) -> Option<TranslationState> {
        self.state.borrow().clone()
    }

    /// 当前翻译历史（最新的在最后）
    pub fn history(&self) -> TranslationHistory {
        self.history.borrow().clone()
    }

    /// 请求提前结束：不再消费新的块，运行以已完成的进度结束
    pub fn stop(&self) {
        if self.running.get() && !self.stop_requested.get() {
            tracing::info!("页面 {} 请求停止翻译", self.page_key);
            self.stop_requested.set(true);
        }
    }

    /// 在原文和译文之间整体切换
    pub fn toggle_display(&self) -> TranslationResult<DisplayState> {
        self.engine.toggle_all(&self.document)
    }

    /// 开始翻译
    ///
    /// 设置无效时立即返回，不产生任何状态；已有运行进行中时返回状态错误。
    /// 致命的通道错误会让运行以 `error` 状态结束并返回该错误。
    pub async fn start_translation(
        &self,
        settings: TranslationSettings,
    ) -> TranslationResult<TranslationState> {
        settings.validate()?;

        if self.running.get() {
            return Err(TranslationError::InvalidState(format!(
                "页面 {} 的翻译正在进行中",
                self.page_key
            )));
        }
        self.running.set(true);
        let guard = RunGuard(&self.running);
        self.stop_requested.set(false);
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        self.history.borrow_mut().clear();
        self.engine.clear_artifacts(&self.document);
        *self.state.borrow_mut() = None;
        self.update(|_| {});

        let mut extractor = Extractor::new(self.config.extraction.clone());
        let items = extractor.extract(&self.document);
        if items.is_empty() {
            let error = TranslationError::ExtractionError("页面中没有可翻译的内容".to_string());
            drop(guard);
            return self.fail(error, generation).await;
        }

        let blocks = group(items, &self.config.grouping);
        let total_blocks = blocks.len();
        tracing::info!(
            "开始翻译页面 {}: {} 个块，每次请求 {} 个块，目标语言 {}",
            self.page_key,
            total_blocks,
            settings.blocks_per_request.get(),
            settings.target_language
        );
        self.update(|state| {
            state.status = TranslationStatus::Translating;
            state.total_blocks = total_blocks;
        });

        let mut pipeline = BatchPipeline::new(
            blocks,
            settings.blocks_per_request.get(),
            self.launcher(&settings),
        );
        pipeline.start();

        let timing = self.engine.timing().clone();
        'batches: loop {
            if self.stop_requested.get() {
                pipeline.abort();
                break;
            }

            if let Some(upcoming) = pipeline.peek_blocks() {
                self.engine.mark_preparing(upcoming);
            }

            let outcome = match pipeline.next_batch().await {
                None => break,
                Some(Ok(outcome)) => outcome,
                Some(Err(error)) => {
                    drop(guard);
                    return self.fail(error, generation).await;
                }
            };

            match &outcome.result {
                Ok(translations) => {
                    for (block, texts) in outcome.blocks.iter().zip(translations) {
                        self.engine
                            .reveal_block(block, texts, |_| {
                                self.update(|state| state.completed_items += 1);
                            })
                            .await;

                        self.history
                            .borrow_mut()
                            .push(block.original_text(), texts.join("\n\n"));
                        self.update(|state| state.completed_blocks += 1);

                        hold(timing.block_pause()).await;
                        if self.stop_requested.get() {
                            pipeline.abort();
                            break 'batches;
                        }
                    }
                }
                Err(error) => {
                    helpers::log_error(error);
                    tracing::warn!("批次 {} 翻译失败，标记为错误后继续", outcome.index);
                    for block in &outcome.blocks {
                        self.engine.mark_block_failed(block);
                        self.update(|state| state.completed_blocks += 1);
                    }
                }
            }

            pipeline.finish_batch(outcome.index);
            hold(timing.batch_pause()).await;
        }

        let stopped = self.stop_requested.get();
        let final_state = self.update(|state| {
            state.is_translating = false;
            state.status = TranslationStatus::Completed;
        });
        tracing::info!(
            "页面 {} 翻译{}: {}/{} 个块，{} 个单元",
            self.page_key,
            if stopped { "已停止" } else { "完成" },
            final_state.completed_blocks,
            final_state.total_blocks,
            final_state.completed_items
        );

        drop(guard);
        hold(timing.reset_delay()).await;
        if self.generation.get() == generation {
            self.store.clear(&self.page_key);
        }
        Ok(final_state)
    }

    /// 构造批次请求：在发出时编码并取历史快照
    fn launcher<'a>(
        &'a self,
        settings: &TranslationSettings,
    ) -> impl FnMut(usize, &[Block]) -> BatchFuture + 'a {
        let channel = Arc::clone(&self.channel);
        let target_language = settings.target_language.clone();
        let base_options = TranslateOptions {
            model: settings.model.clone(),
            history: Vec::new(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: settings.timeout(),
        };
        let history = &self.history;

        move |index: usize, blocks: &[Block]| -> BatchFuture {
            let request = BatchRequest::from_blocks(blocks);
            let mut options = base_options.clone();
            options.history = history.borrow().snapshot();
            let channel = Arc::clone(&channel);
            let target_language = target_language.clone();

            async move {
                let call = channel.translate(&request.payload, &target_language, &options);
                match tokio::time::timeout(options.timeout, call).await {
                    Ok(Ok(success)) => {
                        tracing::debug!("批次 {} 返回 {} 个字符", index, success.text.len());
                        Ok(request.decode(&success.text))
                    }
                    Ok(Err(failure)) => Err(TranslationError::from(failure)),
                    Err(_) => Err(TranslationError::ChannelTransient {
                        error_type: ErrorType::Timeout,
                        status: None,
                        message: format!("批次 {} 请求超时", index),
                    }),
                }
            }
            .boxed()
        }
    }

    async fn fail(
        &self,
        error: TranslationError,
        generation: u64,
    ) -> TranslationResult<TranslationState> {
        helpers::log_error(&error);
        let message = error.to_string();
        let error_type = error.error_type();
        self.update(|state| {
            state.is_translating = false;
            state.status = TranslationStatus::Error;
            state.error = Some(message);
            state.error_type = Some(error_type);
        });

        hold(self.engine.timing().reset_delay()).await;
        if self.generation.get() == generation {
            self.engine.clear_artifacts(&self.document);
            self.store.clear(&self.page_key);
        }
        Err(error)
    }

    /// 修改状态、重新计算进度并写入存储
    fn update<F>(&self, f: F) -> TranslationState
    where
        F: FnOnce(&mut TranslationState),
    {
        let mut slot = self.state.borrow_mut();
        let state = slot.get_or_insert_with(TranslationState::starting);
        f(state);
        state.progress =
            TranslationState::compute_progress(state.completed_blocks, state.total_blocks);
        self.store.set(&self.page_key, state);
        state.clone()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::parsers::html::dom::html_to_dom;
    use crate::translation::channel::{ChannelResult, ChannelSuccess};
    use crate::translation::config::{AnimationTiming, BlocksPerRequest, RequestConfig};
    use crate::translation::storage::MemoryStateStore;

    struct EchoChannel;

    #[async_trait]
    impl TranslationChannel for EchoChannel {
        async fn translate(
            &self,
            payload: &str,
            _target_language: &str,
            _options: &TranslateOptions,
        ) -> ChannelResult {
            Ok(ChannelSuccess::text(payload.to_uppercase()))
        }
    }

    fn settings() -> TranslationSettings {
        let mut settings =
            TranslationSettings::new("key", "model-x", "es", &RequestConfig::default());
        settings.blocks_per_request = BlocksPerRequest::Three;
        settings
    }

    fn controller(html: &str) -> (SessionController, Arc<MemoryStateStore>) {
        let dom = html_to_dom(html.as_bytes(), "utf-8").expect("parse");
        let store = Arc::new(MemoryStateStore::new());
        let config = TranslatorConfig {
            animation: AnimationTiming::immediate(),
            ..TranslatorConfig::default()
        };
        let controller = SessionController::new(
            "tab-1",
            dom.document.clone(),
            Arc::new(EchoChannel),
            store.clone(),
            config,
        );
        (controller, store)
    }

    #[tokio::test]
    async fn completes_and_records_history() {
        let (controller, store) =
            controller("<body><h1>Hello</h1><p>World of tests</p></body>");

        let state = controller
            .start_translation(settings())
            .await
            .expect("translation");

        assert_eq!(state.status, TranslationStatus::Completed);
        assert_eq!(state.progress, 100);
        assert_eq!(state.completed_items, 2);
        assert!(!controller.is_running());
        assert_eq!(controller.history().len(), 2);
        // 重置延迟为零，状态立即清除
        assert!(store.get("tab-1").is_none());
    }

    #[tokio::test]
    async fn invalid_settings_publish_nothing() {
        let (controller, store) = controller("<body><p>World of tests</p></body>");
        let mut settings = settings();
        settings.api_key = String::new();

        let error = controller
            .start_translation(settings)
            .await
            .expect_err("must fail");
        assert_eq!(error.error_type(), "validation");
        assert!(controller.state().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_page_is_an_extraction_error() {
        let (controller, _) = controller("<body><script>var x = 1;</script></body>");

        let error = controller
            .start_translation(settings())
            .await
            .expect_err("nothing to translate");
        assert_eq!(error.error_type(), "extraction");

        let state = controller.state().expect("error state");
        assert_eq!(state.status, TranslationStatus::Error);
        assert_eq!(state.error_type.as_deref(), Some("extraction"));
    }

    #[test]
    fn toggle_before_translation_is_rejected() {
        let (controller, _) = controller("<body><p>World of tests</p></body>");
        assert!(matches!(
            controller.toggle_display(),
            Err(TranslationError::InvalidState(_))
        ));
    }
}
