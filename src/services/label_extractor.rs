//! 选项抽取服务 - 业务能力层
//!
//! 从模型回复（或原始 output）中抽取选择题的选项字母。
//!
//! 规则按顺序尝试，第一条命中且字母合法的规则生效；
//! 全部落空时取最后一个单独出现的合法大写字母；再落空则返回 `None`。
//! 新的措辞只需往 `DEFAULT_RULES` 追加一行。

use regex::{Regex, RegexBuilder};

use crate::clients::llm_client::THINK_CLOSE;
use crate::error::{AppResult, ConfigError};

/// (规则名, 正则)，捕获组 1 为选项字母，匹配时忽略大小写
pub const DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "answer_phrase",
        r"(?:answer|option|choice|solution)\s*(?:is|:)?\s*\(?([A-Z])\b\)?",
    ),
    (
        "letter_is_correct",
        r"(?:^|[^A-Za-z0-9])\(?([A-Z])\)?\s+is\s+(?:the\s+)?(?:correct|answer)\b",
    ),
    (
        "answer_colon",
        r"[*_]{0,2}answer[*_]{0,2}\s*:[\s*_]{0,2}\s*([A-Z])(?:[^A-Za-z0-9]|$)",
    ),
    ("boxed", r"\\boxed\{[^}]*?\b([A-Z])\b[^}]*\}"),
    ("trailing_paren", r"(?s)^.*\(([A-Z])\)\.*$"),
];

const FALLBACK_PATTERN: &str = r"\b([A-Z])\b";

/// 一条抽取规则
#[derive(Debug, Clone)]
pub struct LabelRule {
    pub name: &'static str,
    pattern: Regex,
}

impl LabelRule {
    pub fn new(name: &'static str, pattern: &str) -> AppResult<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                rule: name.to_string(),
                source,
            })?;
        Ok(Self { name, pattern })
    }

    /// 返回本规则第一个合法的捕获字母
    pub fn capture(&self, text: &str, valid: &[char]) -> Option<char> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().chars().next())
            .map(|c| c.to_ascii_uppercase())
            .find(|c| valid.contains(c))
    }
}

/// 选项抽取器
#[derive(Debug, Clone)]
pub struct LabelExtractor {
    rules: Vec<LabelRule>,
    fallback: Regex,
    valid_letters: Vec<char>,
}

impl LabelExtractor {
    /// 使用默认规则表创建
    ///
    /// # 参数
    /// - `valid_letters`: 合法选项字母，例如 `"ABCDEFGHIJ"`
    pub fn new(valid_letters: &str) -> AppResult<Self> {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(name, pattern)| LabelRule::new(name, pattern))
            .collect::<AppResult<Vec<_>>>()?;
        Self::with_rules(rules, valid_letters)
    }

    /// 使用自定义规则表创建
    pub fn with_rules(rules: Vec<LabelRule>, valid_letters: &str) -> AppResult<Self> {
        let fallback = Regex::new(FALLBACK_PATTERN).map_err(|source| ConfigError::InvalidPattern {
            rule: "fallback".to_string(),
            source,
        })?;
        Ok(Self {
            rules,
            fallback,
            valid_letters: valid_letters.chars().map(|c| c.to_ascii_uppercase()).collect(),
        })
    }

    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    /// 抽取选项字母，失败返回 `None`
    pub fn extract(&self, text: &str) -> Option<String> {
        let text = strip_chain_of_thought(text);
        if text.is_empty() {
            return None;
        }

        for rule in &self.rules {
            if let Some(letter) = rule.capture(text, &self.valid_letters) {
                tracing::trace!("规则 {} 命中: {}", rule.name, letter);
                return Some(letter.to_string());
            }
        }

        // 模型通常最后才给出最终选择，所以取最后一个
        self.fallback
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().chars().next())
            .filter(|c| self.valid_letters.contains(c))
            .last()
            .map(|c| c.to_string())
    }
}

/// 去掉思维链：有 `</think>` 时只保留最后一个标记之后的内容
pub fn strip_chain_of_thought(text: &str) -> &str {
    match text.rfind(THINK_CLOSE) {
        Some(pos) => text[pos + THINK_CLOSE.len()..].trim(),
        None => text.trim(),
    }
}

/// 两个标签都存在且相等时为 1.0，否则为 0.0
pub fn compute_reward(original: Option<&str>, new: Option<&str>) -> f64 {
    match (original, new) {
        (Some(a), Some(b)) if a == b => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> LabelExtractor {
        LabelExtractor::new("ABCDEFGHIJ").unwrap()
    }

    fn rule(name: &str) -> LabelRule {
        extractor()
            .rules()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .unwrap()
    }

    const VALID: &[char] = &['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J'];

    #[test]
    fn test_think_block_then_answer_phrase() {
        let text = "...<think>maybe (A)? no</think>The answer is (C).";
        assert_eq!(extractor().extract(text), Some("C".to_string()));
    }

    #[test]
    fn test_final_answer_colon() {
        assert_eq!(
            extractor().extract("...final answer: B"),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_nothing_recognizable() {
        assert_eq!(extractor().extract("no idea here, sorry"), None);
        assert_eq!(extractor().extract(""), None);
        assert_eq!(extractor().extract("<think>only thoughts</think>"), None);
    }

    #[test]
    fn test_last_think_marker_wins() {
        let text = "<think>a</think>noise<think>b</think>Answer: D";
        assert_eq!(extractor().extract(text), Some("D".to_string()));
    }

    #[test]
    fn test_rule_answer_phrase() {
        let r = rule("answer_phrase");
        assert_eq!(r.capture("The correct option is E", VALID), Some('E'));
        assert_eq!(r.capture("the answer is (h)", VALID), Some('H'));
        // "choices" 不能被当成选项 C
        assert_eq!(r.capture("answer choices below", VALID), None);
    }

    #[test]
    fn test_rule_letter_is_correct() {
        let r = rule("letter_is_correct");
        assert_eq!(r.capture("So (B) is correct.", VALID), Some('B'));
        assert_eq!(r.capture("G is the answer", VALID), Some('G'));
    }

    #[test]
    fn test_rule_answer_colon_markdown() {
        let r = rule("answer_colon");
        assert_eq!(r.capture("**Answer:** F", VALID), Some('F'));
        assert_eq!(r.capture("Answer: Fish", VALID), None);
    }

    #[test]
    fn test_rule_boxed() {
        let r = rule("boxed");
        assert_eq!(r.capture(r"thus \boxed{D}", VALID), Some('D'));
        assert_eq!(r.capture(r"\boxed{\text{(J)}}", VALID), Some('J'));
    }

    #[test]
    fn test_rule_trailing_paren() {
        let r = rule("trailing_paren");
        assert_eq!(r.capture("I pick (A)...", VALID), Some('A'));
        assert_eq!(r.capture("(A) then more words", VALID), None);
    }

    #[test]
    fn test_fallback_takes_last_standalone_letter() {
        let text = "Between B and D, I would go with D";
        assert_eq!(extractor().extract(text), Some("D".to_string()));
    }

    #[test]
    fn test_letter_outside_alphabet_ignored() {
        let abcd = LabelExtractor::new("ABCD").unwrap();
        assert_eq!(abcd.extract("The answer is (F)."), None);
        assert_eq!(abcd.extract("The answer is (F). Maybe B"), Some("B".to_string()));
    }

    #[test]
    fn test_compute_reward() {
        assert_eq!(compute_reward(Some("A"), Some("A")), 1.0);
        assert_eq!(compute_reward(Some("A"), Some("B")), 0.0);
        assert_eq!(compute_reward(None, Some("A")), 0.0);
        assert_eq!(compute_reward(None, None), 0.0);
    }
}
