//! 翻译管道模块
//!
//! 提取 → 分组 → 批次编码 → 流水线请求 → 解码，DOM 之外的部分都是纯函数。

pub mod batch_codec;
pub mod extractor;
pub mod grouper;
pub mod link_codec;
pub mod scheduler;
pub mod split;
pub mod walker;

// 重新导出主要类型
pub use batch_codec::{BatchRequest, BLOCK_SEPARATOR, ITEM_SEPARATOR};
pub use extractor::{ExtractionStats, Extractor, InlineStyleProbe, Item, StyleProbe};
pub use grouper::{group, Block};
pub use link_codec::{LinkInfo, LinkMap};
pub use scheduler::{BatchFuture, BatchPipeline, BatchTranslation, PipelineOutcome};
pub use split::SplitStrategy;
pub use walker::TextNodeWalker;
