// 集成测试公共模块
//
// 提供测试页面、脚本化翻译通道和记录型状态存储

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, RcDom};

use page_translator::parsers::html::dom::{find_elements, get_node_name, text_content};
use page_translator::parsers::html_to_dom;
use page_translator::translation::{
    AnimationTiming, BlocksPerRequest, ChannelFailure, ChannelResult, ChannelSuccess,
    MemoryStateStore, SessionController, StateStore, TranslateOptions, TranslationChannel,
    TranslationSettings, TranslationState, TranslatorConfig,
};

/// 测试页面
pub struct HtmlTestHelper;

#[allow(dead_code)]
impl HtmlTestHelper {
    pub fn create_test_dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").expect("Failed to parse test HTML")
    }

    /// 标题加段落的最小页面
    pub fn heading_and_paragraph() -> &'static str {
        "<html><body><h1>Hello</h1><p>World of tests</p></body></html>"
    }

    /// 六个章节，每个章节一个标题和一个段落，分组后至少六个块
    pub fn sectioned_article() -> String {
        let names = ["one", "two", "three", "four", "five", "six"];
        let mut body = String::from("<html><body><article>");
        for name in names {
            body.push_str(&format!(
                "<h2>Section {} heading</h2><p>Paragraph text for section {} goes here.</p>",
                name, name
            ));
        }
        body.push_str("</article></body></html>");
        body
    }

    /// 含链接和列表的页面
    pub fn page_with_links() -> &'static str {
        r#"<html><body><main>
            <h1>Getting started guide</h1>
            <p>Please <a href="https://x.com">click</a> now to continue reading.</p>
            <ul>
                <li>Install the package first</li>
                <li>Read the <a href="/docs">manual</a> page</li>
            </ul>
            <script>var ignored = "not translated at all";</script>
        </main></body></html>"#
    }

    /// 第一个标签名为 `tag` 且文本包含 `needle` 的元素
    pub fn find_element(root: &Handle, tag: &str, needle: &str) -> Handle {
        find_elements(root, |node| {
            get_node_name(node) == Some(tag) && text_content(node).contains(needle)
        })
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{}> containing {:?}", tag, needle))
    }
}

/// 一次通道调用的记录
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedCall {
    pub payload: String,
    pub target_language: String,
    pub history_len: usize,
    pub model: String,
}

/// 把请求文本转为大写的通道；分隔符与链接占位符本身是大写，因此保持不变
///
/// `fail_on` 中任一片段出现在请求文本里时返回 `failure`。
#[derive(Default)]
pub struct ScriptedChannel {
    calls: Mutex<Vec<RecordedCall>>,
    fail_on: Vec<String>,
    failure: Option<ChannelFailure>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl ScriptedChannel {
    pub fn uppercase() -> Self {
        Self::default()
    }

    /// 所有请求都失败
    pub fn always_failing(failure: ChannelFailure) -> Self {
        Self {
            fail_on: vec![String::new()],
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// 请求文本包含 `needle` 时失败
    pub fn failing_on(needle: &str, failure: ChannelFailure) -> Self {
        Self {
            fail_on: vec![needle.to_string()],
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl TranslationChannel for ScriptedChannel {
    async fn translate(
        &self,
        payload: &str,
        target_language: &str,
        options: &TranslateOptions,
    ) -> ChannelResult {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            payload: payload.to_string(),
            target_language: target_language.to_string(),
            history_len: options.history.len(),
            model: options.model.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = &self.failure {
            if self.fail_on.iter().any(|needle| payload.contains(needle.as_str())) {
                return Err(failure.clone());
            }
        }
        Ok(ChannelSuccess::text(payload.to_uppercase()))
    }
}

/// 记录每一次写入的状态存储
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStateStore,
    history: Mutex<Vec<TranslationState>>,
    clears: Mutex<usize>,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn snapshots(&self) -> Vec<TranslationState> {
        self.history.lock().expect("history lock").clone()
    }

    pub fn clear_count(&self) -> usize {
        *self.clears.lock().expect("clears lock")
    }
}

impl StateStore for RecordingStore {
    fn get(&self, key: &str) -> Option<TranslationState> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, state: &TranslationState) {
        self.history.lock().expect("history lock").push(state.clone());
        self.inner.set(key, state);
    }

    fn clear(&self, key: &str) {
        *self.clears.lock().expect("clears lock") += 1;
        self.inner.clear(key);
    }
}

/// 测试环境：页面、通道、存储和会话
pub struct TestEnvironment {
    pub dom: RcDom,
    pub channel: Arc<ScriptedChannel>,
    pub store: Arc<RecordingStore>,
    pub session: SessionController,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new(html: &str, channel: ScriptedChannel) -> Self {
        Self::with_config(html, channel, Self::immediate_config())
    }

    pub fn with_config(html: &str, channel: ScriptedChannel, config: TranslatorConfig) -> Self {
        let dom = HtmlTestHelper::create_test_dom(html);
        let channel = Arc::new(channel);
        let store = Arc::new(RecordingStore::default());
        let session = SessionController::new(
            "tab-1",
            dom.document.clone(),
            channel.clone(),
            store.clone(),
            config,
        );
        Self {
            dom,
            channel,
            store,
            session,
        }
    }

    /// 所有动画与停顿为零
    pub fn immediate_config() -> TranslatorConfig {
        TranslatorConfig {
            animation: AnimationTiming::immediate(),
            ..TranslatorConfig::default()
        }
    }

    pub fn settings(blocks_per_request: BlocksPerRequest) -> TranslationSettings {
        let config = TranslatorConfig::default();
        let mut settings =
            TranslationSettings::new("test-key", "test-model", "es", &config.request);
        settings.blocks_per_request = blocks_per_request;
        settings
    }
}
