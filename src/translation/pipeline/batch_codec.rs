//! 批次编解码
//!
//! 把多个块打包为一次请求的分隔文本，并把模型返回的文本还原为
//! 块 × 单元的译文矩阵。解码永不失败：任何无法恢复的位置都回退为原文，
//! 保证返回的块数和每块单元数与请求完全一致。

use serde::Serialize;

use super::grouper::Block;
use super::link_codec::{self, LinkMap};
use super::split::{resplit, split_on_separator, SplitStrategy};

/// 块分隔符
pub const BLOCK_SEPARATOR: &str = "===BLOCK_SEPARATOR===";
/// 单元分隔符
pub const ITEM_SEPARATOR: &str = "||ITEM_SEPARATOR||";

fn padded(token: &str) -> String {
    format!("\n\n{}\n\n", token)
}

/// 编码一组块，链接占位符写入 `map`
pub fn encode(blocks: &[Block], map: &mut LinkMap) -> String {
    let item_sep = padded(ITEM_SEPARATOR);
    let block_sep = padded(BLOCK_SEPARATOR);

    blocks
        .iter()
        .map(|block| {
            block
                .items
                .iter()
                .map(|item| {
                    if item.has_links {
                        link_codec::encode(&item.original_inner_html, map)
                    } else {
                        item.original_text.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(&item_sep)
        })
        .collect::<Vec<_>>()
        .join(&block_sep)
}

/// 解码模型响应
///
/// `original_texts[i][j]` 是第 `i` 块第 `j` 个单元的回退文本。
pub fn decode(
    response: &str,
    block_count: usize,
    item_counts: &[usize],
    original_texts: &[Vec<String>],
    map: &LinkMap,
) -> Vec<Vec<String>> {
    let (mut parts, strategy) = split_on_separator(response, BLOCK_SEPARATOR);
    if strategy.is_some_and(|s| s != SplitStrategy::Padded) {
        tracing::warn!("块分隔符格式不完整，使用宽松切分: {:?}", strategy);
    }

    if parts.len() > block_count && block_count > 0 {
        tracing::warn!(
            "响应包含 {} 个块，多于预期的 {} 个，多余部分并入最后一块",
            parts.len(),
            block_count
        );
        let surplus = parts.split_off(block_count - 1);
        parts.push(surplus.join(&padded(ITEM_SEPARATOR)));
    }

    (0..block_count)
        .map(|i| {
            let expected = item_counts.get(i).copied().unwrap_or(0);
            let originals = original_texts.get(i).map(Vec::as_slice).unwrap_or(&[]);

            match parts.get(i) {
                Some(text) => decode_block(i, text, expected, originals, map),
                None => {
                    tracing::warn!("响应缺少第 {} 块，使用原文", i);
                    fallback(expected, originals)
                }
            }
        })
        .collect()
}

fn decode_block(
    index: usize,
    text: &str,
    expected: usize,
    originals: &[String],
    map: &LinkMap,
) -> Vec<String> {
    let (parts, _) = split_on_separator(text, ITEM_SEPARATOR);
    let mut items: Vec<String> = parts
        .iter()
        .map(|part| strip_separators(&link_codec::decode(part, map)))
        .collect();

    if items.len() != expected && expected > 0 {
        tracing::warn!(
            "第 {} 块单元数量不匹配: 预期 {}，实际 {}",
            index,
            expected,
            items.len()
        );

        if items.len() == 1 {
            items = resplit(&items[0], originals);
        } else if items.len() > expected {
            let surplus = items.split_off(expected - 1);
            items.push(surplus.join(" "));
        } else {
            let missing = expected - items.len();
            items.extend(originals.iter().skip(items.len()).take(missing).cloned());
        }
    }

    if items.len() != expected {
        tracing::warn!("第 {} 块无法对齐，整块回退为原文", index);
        return fallback(expected, originals);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(j, item)| {
            if item.is_empty() {
                originals.get(j).cloned().unwrap_or_default()
            } else {
                item
            }
        })
        .collect()
}

/// 去除残留的分隔符，不让它们写入页面
fn strip_separators(text: &str) -> String {
    if !text.contains(BLOCK_SEPARATOR) && !text.contains(ITEM_SEPARATOR) {
        return text.trim().to_string();
    }
    tracing::warn!("单元译文中残留分隔符，已移除");
    text.replace(BLOCK_SEPARATOR, " ")
        .replace(ITEM_SEPARATOR, " ")
        .split(' ')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn fallback(expected: usize, originals: &[String]) -> Vec<String> {
    (0..expected)
        .map(|j| originals.get(j).cloned().unwrap_or_default())
        .collect()
}

/// 一次请求的全部编码数据
///
/// 只包含自有数据，可以移入独立的请求任务。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub payload: String,
    pub item_counts: Vec<usize>,
    /// 回退文本：含链接的单元为原始 HTML，否则为纯文本
    pub original_texts: Vec<Vec<String>>,
    pub link_map: LinkMap,
}

impl BatchRequest {
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut link_map = LinkMap::new();
        let payload = encode(blocks, &mut link_map);

        Self {
            payload,
            item_counts: blocks.iter().map(Block::len).collect(),
            original_texts: blocks
                .iter()
                .map(|block| {
                    block
                        .items
                        .iter()
                        .map(|item| item.source_html().to_string())
                        .collect()
                })
                .collect(),
            link_map,
        }
    }

    pub fn block_count(&self) -> usize {
        self.item_counts.len()
    }

    pub fn decode(&self, response: &str) -> Vec<Vec<String>> {
        decode(
            response,
            self.block_count(),
            &self.item_counts,
            &self.original_texts,
            &self.link_map,
        )
    }
}
