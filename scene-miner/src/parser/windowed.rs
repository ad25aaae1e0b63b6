//! # 窗口回退抽取
//!
//! 场景文件无法解析为 JSON 时使用：定位每一个语音标记，
//! 在其前后的固定窗口内查找台词文本与说话者。
//!
//! ## 选择规则
//!
//! 1. `prefer_corner_brackets` 开启时，优先取 `「…」` 包裹的片段
//! 2. 否则（或没有此类片段）取包含工作语言字符的引号字符串
//! 3. 都没有时该标记计入未匹配
//!
//! 多个候选并存时按 [`SpanPick`] 选择。说话者取标记之前最后一个
//! `["…", "…"` 形式的字符串对的第一个元素。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{FallbackConfig, SpanPick};
use crate::record::{DialogueRecord, LanguageText};
use crate::text::{WorkingLanguage, normalize};

/// 语音标记：三字母分类 + `b` 块号 + 行号 + 可选小写后缀
const VOICE_MARKER: &str = r#""([A-Z]{3}_b\d+_\d+[a-z]?)""#;

static VOICE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(VOICE_MARKER).expect("voice marker pattern is valid"));

static CORNER_QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"「[^」]+」").expect("corner quote pattern is valid"));

static QUOTED_STRING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("quoted string pattern is valid")
});

static SPEAKER_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\["([^"]+)",\s*"([^"]+)""#).expect("speaker pair pattern is valid")
});

/// 没有找到台词的语音标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedMarker {
    pub voice_id: String,
    /// 标记所在行（从 1 开始）
    pub line: usize,
}

/// 窗口抽取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowedExtraction {
    pub records: Vec<DialogueRecord>,
    pub unmatched: Vec<UnmatchedMarker>,
}

/// 对整个文件内容执行窗口抽取
pub fn extract_windowed(
    content: &str,
    config: &FallbackConfig,
    language: &WorkingLanguage,
) -> WindowedExtraction {
    let keyed = config.marker_key.as_deref().and_then(keyed_marker_regex);
    let marker_re: &Regex = keyed.as_ref().unwrap_or(&*VOICE_MARKER_RE);

    let mut result = WindowedExtraction::default();
    let mut line = 1;
    let mut line_cursor = 0;

    for caps in marker_re.captures_iter(content) {
        let Some(marker) = caps.get(0) else {
            continue;
        };
        let voice_id = &caps[1];

        line += content[line_cursor..marker.start()].matches('\n').count();
        line_cursor = marker.start();

        let start = step_back(content, marker.start(), config.window_before);
        let end = step_forward(content, marker.end(), config.window_after);
        let window = &content[start..end];
        let marker_offset = marker.start() - start;

        let record = pick_text(window, marker_offset, config, language).and_then(|text| {
            let speaker = last_speaker(&window[..marker_offset]).unwrap_or_default();
            DialogueRecord::new(
                Some(voice_id.to_string()),
                speaker,
                vec![LanguageText::new(None, text)],
            )
        });

        match record {
            Some(record) => result.records.push(record),
            None => result.unmatched.push(UnmatchedMarker {
                voice_id: voice_id.to_string(),
                line,
            }),
        }
    }

    result
}

/// 只匹配 `"key": "…"` 形式的语音标记
///
/// 键名已转义，只有超出正则大小上限时才会失败，此时退回不限键名的匹配。
fn keyed_marker_regex(key: &str) -> Option<Regex> {
    let key = regex::escape(key);
    Regex::new(&format!(r#""{key}"\s*:\s*{VOICE_MARKER}"#)).ok()
}

/// 在窗口中选出台词文本
fn pick_text<'a>(
    window: &'a str,
    marker_offset: usize,
    config: &FallbackConfig,
    language: &WorkingLanguage,
) -> Option<&'a str> {
    let allowed = |end: usize| match config.pick {
        SpanPick::Last => true,
        SpanPick::NearestBefore => end <= marker_offset,
    };

    if config.prefer_corner_brackets
        && let Some(span) = CORNER_QUOTE_RE
            .find_iter(window)
            .filter(|m| allowed(m.end()) && !normalize(m.as_str()).is_empty())
            .last()
    {
        return Some(span.as_str());
    }

    QUOTED_STRING_RE
        .captures_iter(window)
        .filter_map(|caps| caps.get(1))
        .filter(|m| {
            allowed(m.end() + 1) && language.matches(m.as_str()) && !normalize(m.as_str()).is_empty()
        })
        .last()
        .map(|m| m.as_str())
}

fn last_speaker(before: &str) -> Option<String> {
    SPEAKER_PAIR_RE
        .captures_iter(before)
        .last()
        .map(|caps| caps[1].to_string())
}

/// 从 `index` 向前退 `chars` 个字符，返回字节位置
fn step_back(content: &str, index: usize, chars: usize) -> usize {
    if chars == 0 {
        return index;
    }
    content[..index]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// 从 `index` 向后走 `chars` 个字符，返回字节位置
fn step_forward(content: &str, index: usize, chars: usize) -> usize {
    content[index..]
        .char_indices()
        .nth(chars)
        .map(|(i, _)| index + i)
        .unwrap_or(content.len())
}
