//! 纯文本统计工具

use crate::utils::token_estimator::is_dense_script;

const DIALOGUE_MARKERS: &[char] = &['"', '“', '”', '「', '」', '『', '』'];

/// 统计字数：每个中日韩字符计为一个字，其余按空白分隔的词计数
pub fn count_words(text: &str) -> usize {
    let dense = text.chars().filter(|c| is_dense_script(*c)).count();
    let latin = text
        .split(|c: char| c.is_whitespace() || is_dense_script(c))
        .filter(|token| token.chars().any(|c| c.is_alphanumeric()))
        .count();
    dense + latin
}

/// 统计段落数（非空行）
pub fn count_paragraphs(text: &str) -> usize {
    text.lines().filter(|line| !line.trim().is_empty()).count()
}

/// 统计对话引号出现次数
pub fn count_dialogue_markers(text: &str) -> usize {
    text.chars().filter(|c| DIALOGUE_MARKERS.contains(c)).count()
}

/// 截取前`max_chars`个字符，超出时追加省略号
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", head)
}
