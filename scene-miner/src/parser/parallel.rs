//! # 多语言并行抽取
//!
//! 直接在文件文本上匹配固定元数的多语言台词：
//!
//! ```text
//! ["说话者", null|"显示名", [[null|"标签", "文本"], ... × N
//! ```
//!
//! 不要求整个文件是合法 JSON。匹配前先把换行替换为空格，
//! 避免跨行的台词被漏掉。说话者可以为空（旁白），是否保留交给角色分类。

use regex::Regex;

use crate::record::{LanguageText, ParallelLine};

/// JSON 字符串字面量内部（允许转义引号与控制字符）
const STRING_BODY: &str = r#"(?:[^"\\]|\\.)*"#;

/// 多语言台词抽取器
#[derive(Debug, Clone)]
pub struct ParallelExtractor {
    slot_count: usize,
    pattern: Regex,
}

impl ParallelExtractor {
    /// 创建抽取器
    ///
    /// `slot_count` 为每行台词的并行语言数，至少为 1。
    pub fn new(slot_count: usize) -> Self {
        let slot_count = slot_count.max(1);
        Self {
            slot_count,
            pattern: build_pattern(slot_count),
        }
    }

    /// 槽位数
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// 抽取所有多语言台词行（按出现顺序，保留全部槽位）
    pub fn extract(&self, content: &str) -> Vec<ParallelLine> {
        let flattened = content.replace(['\r', '\n'], " ");

        self.pattern
            .captures_iter(&flattened)
            .map(|caps| {
                let texts = (0..self.slot_count)
                    .map(|slot| {
                        let tag = caps.get(2 + slot * 2).map(|m| m.as_str()).and_then(parse_tag);
                        let text = caps.get(3 + slot * 2).map(|m| m.as_str()).unwrap_or_default();
                        LanguageText::new(tag, text)
                    })
                    .collect();
                ParallelLine {
                    speaker: caps[1].to_string(),
                    texts,
                }
            })
            .collect()
    }
}

/// 只保留目标槽位的文本，供对话构建使用
///
/// 目标槽位为空的行整行丢弃，不会用其他语言的文本顶替。
pub fn conversation_lines(lines: &[ParallelLine], target_slot: usize) -> Vec<(String, String)> {
    lines
        .iter()
        .filter_map(|line| match line.texts.get(target_slot) {
            Some(slot) if !slot.text.is_empty() => Some((line.speaker.clone(), slot.text.clone())),
            _ => None,
        })
        .collect()
}

fn build_pattern(slot_count: usize) -> Regex {
    let head = format!(r#"\[\s*"([^"]*)"\s*,\s*(?:null|"{STRING_BODY}")\s*,\s*\[\s*"#);
    let slot = format!(r#"\[\s*(null|"{STRING_BODY}")\s*,\s*"({STRING_BODY})"\s*\]"#);
    let slots = vec![slot; slot_count].join(r"\s*,\s*");
    Regex::new(&format!("{head}{slots}")).expect("parallel line pattern is valid")
}

fn parse_tag(raw: &str) -> Option<String> {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
}
