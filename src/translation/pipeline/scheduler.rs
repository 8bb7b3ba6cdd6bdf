//! 批次流水线调度
//!
//! 把块按配置的每请求块数切成批次，并保持最多两个批次的请求在途，
//! 让网络往返时间隐藏在当前批次的动画时间之后。
//!
//! ## 执行模型
//!
//! - **有序消费**: 调用方按批次序号逐个等待结果，即使后面的请求先完成，
//!   结果也严格按文档顺序应用
//! - **前瞻请求**: 启动时发出批次 0 和 1；调用方完成批次 `i` 的动画后，
//!   调度器发出批次 `i + 2`
//! - **错误分级**: 致命错误立即终止流水线，已发出的请求不取消，只丢弃其结果；
//!   非致命错误只影响当前批次
//!
//! ## 线程模型
//!
//! DOM 句柄不是 `Send`，因此所有 DOM 工作留在驱动任务上。每个请求在发出前
//! 就完成编码，只携带自有数据，通过 `tokio::spawn` 在独立任务中运行。

use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use super::grouper::Block;
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 一个批次的译文：每块一组，每组与块内单元一一对应
pub type BatchTranslation = Vec<Vec<String>>;

/// 发出一个批次请求得到的任务
pub type BatchFuture = BoxFuture<'static, TranslationResult<BatchTranslation>>;

/// 一个按顺序取出的批次结果
#[derive(Debug)]
pub struct PipelineOutcome {
    pub index: usize,
    pub blocks: Vec<Block>,
    /// 非致命错误保留在这里，由调用方逐项标记失败
    pub result: TranslationResult<BatchTranslation>,
}

/// 批次流水线
pub struct BatchPipeline<F>
where
    F: FnMut(usize, &[Block]) -> BatchFuture,
{
    batches: Vec<Option<Vec<Block>>>,
    in_flight: HashMap<usize, JoinHandle<TranslationResult<BatchTranslation>>>,
    launched: Vec<bool>,
    launch: F,
    next_index: usize,
    lookahead: usize,
    aborted: bool,
}

impl<F> BatchPipeline<F>
where
    F: FnMut(usize, &[Block]) -> BatchFuture,
{
    /// 按 `blocks_per_request` 切分批次，`launch` 负责编码并返回请求任务
    pub fn new(blocks: Vec<Block>, blocks_per_request: usize, launch: F) -> Self {
        let size = blocks_per_request.max(1);
        let mut batches: Vec<Option<Vec<Block>>> = Vec::new();
        let mut current: Vec<Block> = Vec::with_capacity(size);

        for block in blocks {
            current.push(block);
            if current.len() == size {
                batches.push(Some(std::mem::replace(
                    &mut current,
                    Vec::with_capacity(size),
                )));
            }
        }
        if !current.is_empty() {
            batches.push(Some(current));
        }

        let count = batches.len();
        Self {
            batches,
            in_flight: HashMap::new(),
            launched: vec![false; count],
            launch,
            next_index: 0,
            lookahead: constants::LOOKAHEAD_DEPTH,
            aborted: false,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// 已发出的请求数
    pub fn launched_count(&self) -> usize {
        self.launched.iter().filter(|l| **l).count()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// 发出最前面的两个批次
    pub fn start(&mut self) {
        for index in 0..self.lookahead {
            self.ensure_launched(index);
        }
    }

    /// 下一个待消费批次的块，用于在结果到达前显示准备状态
    pub fn peek_blocks(&self) -> Option<&[Block]> {
        if self.aborted {
            return None;
        }
        self.batches
            .get(self.next_index)
            .and_then(|batch| batch.as_deref())
    }

    fn ensure_launched(&mut self, index: usize) {
        if self.aborted || index >= self.batches.len() || self.launched[index] {
            return;
        }
        let Some(blocks) = self.batches[index].as_deref() else {
            return;
        };

        tracing::debug!("发出批次 {} 的翻译请求（{} 个块）", index, blocks.len());
        let future = (self.launch)(index, blocks);
        self.in_flight.insert(index, tokio::spawn(future));
        self.launched[index] = true;
    }

    /// 按顺序等待下一个批次
    ///
    /// 返回 `None` 表示所有批次已消费或流水线已终止；
    /// 返回 `Some(Err(_))` 表示致命错误，之后不会再产出任何批次。
    pub async fn next_batch(&mut self) -> Option<TranslationResult<PipelineOutcome>> {
        if self.aborted || self.next_index >= self.batches.len() {
            return None;
        }

        let index = self.next_index;
        self.ensure_launched(index);
        self.next_index += 1;

        let result = match self.in_flight.remove(&index) {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(TranslationError::from(e)),
            },
            None => Err(TranslationError::InternalError(format!(
                "批次 {} 没有对应的请求",
                index
            ))),
        };
        let blocks = self.batches[index].take().unwrap_or_default();

        match result {
            Err(e) if e.is_fatal() => {
                self.abort();
                Some(Err(e))
            }
            result => Some(Ok(PipelineOutcome {
                index,
                blocks,
                result,
            })),
        }
    }

    /// 调用方完成批次 `index` 的动画后调用，保持前瞻深度
    pub fn finish_batch(&mut self, index: usize) {
        self.ensure_launched(index + self.lookahead);
    }

    /// 停止消费；在途请求被分离，结果直接丢弃
    pub fn abort(&mut self) {
        if !self.in_flight.is_empty() {
            tracing::debug!("丢弃 {} 个在途请求", self.in_flight.len());
        }
        self.in_flight.clear();
        self.aborted = true;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use futures::FutureExt;

    use super::*;
    use crate::translation::channel::ErrorType;

    fn empty_blocks(count: usize) -> Vec<Block> {
        (0..count)
            .map(|id| Block {
                id,
                items: Vec::new(),
            })
            .collect()
    }

    fn ready(result: TranslationResult<BatchTranslation>) -> BatchFuture {
        async move { result }.boxed()
    }

    fn fatal() -> TranslationError {
        TranslationError::ChannelFatal {
            error_type: ErrorType::Authentication,
            status: Some(401),
            message: "bad key".to_string(),
        }
    }

    fn transient() -> TranslationError {
        TranslationError::ChannelTransient {
            error_type: ErrorType::ServerError,
            status: Some(500),
            message: "oops".to_string(),
        }
    }

    #[test]
    fn blocks_are_chunked_by_request_size() {
        let pipeline = BatchPipeline::new(empty_blocks(11), 5, |_, _| ready(Ok(Vec::new())));
        assert_eq!(pipeline.batch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_consumed_in_order() {
        let mut pipeline = BatchPipeline::new(empty_blocks(6), 2, |index, blocks| {
            let ids: Vec<String> = blocks.iter().map(|b| b.id.to_string()).collect();
            // 批次 0 最慢
            let delay = if index == 0 { 50 } else { 5 };
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, TranslationError>(vec![ids])
            }
            .boxed()
        });
        pipeline.start();

        let mut order = Vec::new();
        while let Some(outcome) = pipeline.next_batch().await {
            let outcome = outcome.expect("no fatal errors");
            order.push((outcome.index, outcome.result.expect("translated")));
            pipeline.finish_batch(outcome.index);
        }

        assert_eq!(
            order,
            vec![
                (0, vec![vec!["0".to_string(), "1".to_string()]]),
                (1, vec![vec!["2".to_string(), "3".to_string()]]),
                (2, vec![vec!["4".to_string(), "5".to_string()]]),
            ]
        );
    }

    #[tokio::test]
    async fn keeps_two_batches_in_flight() {
        let launches = Rc::new(RefCell::new(Vec::new()));
        let recorded = Rc::clone(&launches);
        let mut pipeline = BatchPipeline::new(empty_blocks(4), 1, move |index, _| {
            recorded.borrow_mut().push(index);
            ready(Ok(Vec::new()))
        });

        pipeline.start();
        assert_eq!(*launches.borrow(), vec![0, 1]);

        let first = pipeline.next_batch().await.expect("batch").expect("ok");
        assert_eq!(*launches.borrow(), vec![0, 1]);
        pipeline.finish_batch(first.index);
        assert_eq!(*launches.borrow(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn fatal_error_aborts_the_pipeline() {
        let mut pipeline = BatchPipeline::new(empty_blocks(5), 1, |index, _| {
            ready(if index == 0 { Err(fatal()) } else { Ok(Vec::new()) })
        });
        pipeline.start();

        let first = pipeline.next_batch().await.expect("batch");
        assert!(matches!(first, Err(ref e) if e.is_fatal()));
        assert!(pipeline.is_aborted());
        assert!(pipeline.next_batch().await.is_none());
        pipeline.finish_batch(0);
        assert_eq!(pipeline.launched_count(), 2);
    }

    #[tokio::test]
    async fn transient_error_only_affects_its_batch() {
        let mut pipeline = BatchPipeline::new(empty_blocks(2), 1, |index, _| {
            ready(if index == 0 {
                Err(transient())
            } else {
                Ok(vec![vec!["ok".to_string()]])
            })
        });
        pipeline.start();

        let first = pipeline.next_batch().await.expect("batch").expect("not fatal");
        assert!(first.result.is_err());
        let second = pipeline.next_batch().await.expect("batch").expect("not fatal");
        assert!(second.result.is_ok());
        assert!(pipeline.next_batch().await.is_none());
    }
}
