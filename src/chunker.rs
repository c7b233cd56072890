//! 智能文本分块
//!
//! 把超过后端单次长度限制的文本切成有序的分块。切分是无损的：
//! 分隔符留在前一个分块的末尾，所有分块按顺序拼接即为原文。
//!
//! 长度按字符（Unicode scalar value）计算，不按字节，
//! 因此多字节文本不会在字符中间被切开。
//!
//! # 边界策略
//!
//! 在每个窗口（接下来的 `max_chars` 个字符）末尾的回看区间内，
//! 按以下优先级寻找最靠后的切分点：
//!
//! 1. 空行之后（段落边界）
//! 2. 换行之后
//! 3. 句末标点之后（`. ! ?` 后面须跟空白，`。！？` 不要求）
//! 4. 任意空白之后
//! 5. 都找不到时在 `max_chars` 处硬切

use crate::types::Chunk;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];
const CJK_TERMINATORS: &[char] = &['。', '！', '？'];

/// 文本分块器
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chars: usize,
    lookback_chars: usize,
}

impl Chunker {
    /// 创建分块器，回看区间为单块上限的一半
    pub fn new(max_chars: usize) -> Self {
        Self::with_lookback_ratio(max_chars, 0.5)
    }

    /// 创建分块器并指定回看比例（0.0 - 1.0）
    ///
    /// 比例越大，越倾向于在自然边界处切分，代价是分块可能更短。
    pub fn with_lookback_ratio(max_chars: usize, ratio: f64) -> Self {
        let max_chars = max_chars.max(1);
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let lookback = (max_chars as f64 * ratio).floor() as usize;

        Self {
            max_chars,
            // 切分点必须严格前进
            lookback_chars: lookback.min(max_chars - 1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// 切分文本
    ///
    /// 空文本返回空列表；不超过上限的文本返回与原文相同的单个分块。
    ///
    /// ```rust
    /// use doc_translator::Chunker;
    ///
    /// let chunker = Chunker::new(5000);
    /// let chunks = chunker.split("Hello world");
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].text, "Hello world");
    /// ```
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let total = chars.len();

        if total == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let cut = if total - start <= self.max_chars {
                total
            } else {
                self.find_cut(&chars, start)
            };

            let byte_start = chars[start].0;
            let byte_end = if cut == total { text.len() } else { chars[cut].0 };

            chunks.push(Chunk {
                index: chunks.len(),
                text: text[byte_start..byte_end].to_string(),
            });

            start = cut;
        }

        chunks
    }

    fn find_cut(&self, chars: &[(usize, char)], start: usize) -> usize {
        let window_end = start + self.max_chars;
        let min_cut = window_end - self.lookback_chars;

        for boundary in Boundary::PRIORITY {
            let found = (min_cut..=window_end)
                .rev()
                .find(|&p| p > start && boundary.ends_at(chars, start, p));
            if let Some(cut) = found {
                return cut;
            }
        }

        window_end
    }
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Whitespace,
}

impl Boundary {
    const PRIORITY: [Boundary; 4] = [
        Boundary::Paragraph,
        Boundary::Line,
        Boundary::Sentence,
        Boundary::Whitespace,
    ];

    /// 切分点 `p` 是否紧跟在该类边界之后
    ///
    /// 调用方保证 `start < p < chars.len()`。
    fn ends_at(self, chars: &[(usize, char)], start: usize, p: usize) -> bool {
        let prev = chars[p - 1].1;
        match self {
            Boundary::Paragraph => ends_blank_line(chars, start, p),
            Boundary::Line => prev == '\n',
            Boundary::Sentence => {
                CJK_TERMINATORS.contains(&prev)
                    || (SENTENCE_TERMINATORS.contains(&prev) && chars[p].1.is_whitespace())
            }
            Boundary::Whitespace => prev.is_whitespace(),
        }
    }
}

/// `p` 之前是否以空行结尾（"\n" + 可选空白 + "\n"）
fn ends_blank_line(chars: &[(usize, char)], start: usize, p: usize) -> bool {
    if p < start + 2 || chars[p - 1].1 != '\n' {
        return false;
    }
    let mut i = p - 1;
    while i > start {
        i -= 1;
        match chars[i].1 {
            '\n' => return true,
            ' ' | '\t' | '\r' => continue,
            _ => return false,
        }
    }
    false
}
