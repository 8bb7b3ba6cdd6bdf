//! 分隔符恢复与重新切分
//!
//! 模型不保证保留分隔符周围的空白。这里把容错切分建模为按优先级尝试的策略列表，
//! 每个策略都是全函数：任何输入都返回结果，从不失败。

use std::sync::OnceLock;

use regex::Regex;

/// 分隔符切分策略，按尝试顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// 分隔符前后各有一个空行
    Padded,
    /// 只有分隔符本身
    Bare,
    /// 分隔符前后各有一个换行
    Newlines,
}

impl SplitStrategy {
    pub const LADDER: [SplitStrategy; 3] =
        [SplitStrategy::Padded, SplitStrategy::Bare, SplitStrategy::Newlines];

    fn pattern(self, token: &str) -> String {
        match self {
            SplitStrategy::Padded => format!("\n\n{}\n\n", token),
            SplitStrategy::Newlines => format!("\n{}\n", token),
            SplitStrategy::Bare => token.to_string(),
        }
    }

    /// 按此策略切分，结果已去除首尾空白
    pub fn split(self, text: &str, token: &str) -> Vec<String> {
        text.split(self.pattern(token).as_str())
            .map(|part| part.trim().to_string())
            .collect()
    }
}

/// 依次尝试各策略，返回第一个切出多于一段且没有残留分隔符的结果和所用策略
///
/// 文本中不含分隔符时返回整段文本。混用多种分隔符形式时，宽松策略会接手。
pub fn split_on_separator(text: &str, token: &str) -> (Vec<String>, Option<SplitStrategy>) {
    if !text.contains(token) {
        return (vec![text.trim().to_string()], None);
    }

    for strategy in SplitStrategy::LADDER {
        let parts = strategy.split(text, token);
        if parts.len() > 1 && parts.iter().all(|part| !part.contains(token)) {
            return (parts, Some(strategy));
        }
    }

    (vec![text.trim().to_string()], None)
}

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[^.!?。！？]+(?:[.!?。！？]+|$)").expect("sentence pattern is valid")
    })
}

/// 按句末标点切分成句子
pub fn sentences(text: &str) -> Vec<String> {
    sentence_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 按空行切分成段落
pub fn paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// 把片段按顺序分成 `n` 组，每组至少一个片段
fn distribute(pieces: Vec<String>, n: usize, joiner: &str) -> Option<Vec<String>> {
    if n == 0 || pieces.len() < n {
        return None;
    }

    let base = pieces.len() / n;
    let extra = pieces.len() % n;
    let mut iter = pieces.into_iter();
    let groups = (0..n)
        .map(|i| {
            let size = base + usize::from(i < extra);
            iter.by_ref().take(size).collect::<Vec<_>>().join(joiner)
        })
        .collect();
    Some(groups)
}

/// 按原文长度比例切分，切点移到最近的空白处
///
/// 这是最后手段，切点可能落在语义中间。
pub fn split_proportionally(text: &str, weights: &[usize]) -> Vec<String> {
    let n = weights.len();
    if n <= 1 {
        return vec![text.trim().to_string()];
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total_chars = chars.len();
    let total_weight: usize = weights.iter().sum::<usize>().max(1);

    let mut parts = Vec::with_capacity(n);
    let mut start_char = 0;
    let mut consumed_weight = 0;

    for (i, weight) in weights.iter().enumerate() {
        if i == n - 1 {
            parts.push(slice_chars(text, &chars, start_char, total_chars));
            break;
        }

        consumed_weight += weight;
        let target = (total_chars * consumed_weight / total_weight).clamp(start_char, total_chars);
        let cut = nearest_whitespace(&chars, target, start_char);
        parts.push(slice_chars(text, &chars, start_char, cut));
        start_char = cut;
    }

    parts
}

fn slice_chars(text: &str, chars: &[(usize, char)], from: usize, to: usize) -> String {
    let start = chars.get(from).map_or(text.len(), |(i, _)| *i);
    let end = chars.get(to).map_or(text.len(), |(i, _)| *i);
    text[start..end.max(start)].trim().to_string()
}

fn nearest_whitespace(chars: &[(usize, char)], target: usize, floor: usize) -> usize {
    let len = chars.len();
    for distance in 0..len {
        let forward = target + distance;
        if forward < len && chars[forward].1.is_whitespace() {
            return forward;
        }
        if let Some(back) = target.checked_sub(distance) {
            if back > floor && back < len && chars[back].1.is_whitespace() {
                return back;
            }
        }
    }
    target
}

/// 把单段译文重新切成 `n` 段：先按句子，再按段落，最后按长度比例
pub fn resplit(text: &str, original_texts: &[String]) -> Vec<String> {
    let n = original_texts.len();

    if let Some(groups) = distribute(sentences(text), n, " ") {
        tracing::debug!("按句子重新切分为 {} 段", n);
        return groups;
    }

    if let Some(groups) = distribute(paragraphs(text), n, "\n\n") {
        tracing::debug!("按段落重新切分为 {} 段", n);
        return groups;
    }

    tracing::debug!("按长度比例重新切分为 {} 段", n);
    let weights: Vec<usize> = original_texts
        .iter()
        .map(|t| t.chars().count().max(1))
        .collect();
    split_proportionally(text, &weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEP: &str = "||ITEM_SEPARATOR||";

    #[test]
    fn ladder_prefers_padded_form() {
        let text = format!("one\n\n{}\n\ntwo", SEP);
        let (parts, strategy) = split_on_separator(&text, SEP);
        assert_eq!(parts, vec!["one", "two"]);
        assert_eq!(strategy, Some(SplitStrategy::Padded));
    }

    #[test]
    fn ladder_falls_back_to_looser_forms() {
        let text = format!("one\n{}\ntwo", SEP);
        let (parts, strategy) = split_on_separator(&text, SEP);
        assert_eq!(parts, vec!["one", "two"]);
        assert_eq!(strategy, Some(SplitStrategy::Bare));

        let text = format!("one {} two", SEP);
        let (parts, strategy) = split_on_separator(&text, SEP);
        assert_eq!(parts, vec!["one", "two"]);
        assert_eq!(strategy, Some(SplitStrategy::Bare));
    }

    #[test]
    fn mixed_separator_forms_leave_no_tokens() {
        let text = format!("one\n\n{0}\n\ntwo{0}three\n{0}\nfour", SEP);
        let (parts, strategy) = split_on_separator(&text, SEP);
        assert_eq!(parts, vec!["one", "two", "three", "four"]);
        assert_eq!(strategy, Some(SplitStrategy::Bare));
    }

    #[test]
    fn missing_separator_returns_whole_text() {
        let (parts, strategy) = split_on_separator("  only one  ", SEP);
        assert_eq!(parts, vec!["only one"]);
        assert_eq!(strategy, None);
    }

    #[test]
    fn resplit_by_sentences() {
        let originals = vec!["First.".to_string(), "Second one.".to_string()];
        let parts = resplit("Primero. Segundo. Tercero!", &originals);
        assert_eq!(parts, vec!["Primero. Segundo.", "Tercero!"]);
    }

    #[test]
    fn resplit_by_paragraphs_when_sentences_are_too_few() {
        let originals = vec!["a".to_string(), "b".to_string()];
        let parts = resplit("sin puntos aqui\n\notro parrafo", &originals);
        assert_eq!(parts, vec!["sin puntos aqui", "otro parrafo"]);
    }

    #[test]
    fn proportional_split_lands_on_whitespace() {
        let parts = split_proportionally("alpha beta gamma delta", &[1, 1]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.join(" "), "alpha beta gamma delta");
        assert!(parts.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn proportional_split_is_char_boundary_safe() {
        let parts = split_proportionally("日本語のテキストです", &[3, 2]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.concat(), "日本語のテキストです");
    }
}
