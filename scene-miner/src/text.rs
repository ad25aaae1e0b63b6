//! # Text 模块
//!
//! 台词文本规范化与工作语言判定。
//!
//! ## 规范化步骤
//!
//! 1. 反转义 `\"` 与 `\n`
//! 2. 移除 `%f字体名;` 形式的字体指令
//! 3. 去掉首尾各一个台词引号（`「」`、`""`、`“”`）
//! 4. 去掉首尾空白
//!
//! 以上步骤重复执行直到结果不再变化。每一步都不会让字符串变长，
//! 因此循环必然终止，且结果是不动点：`normalize(normalize(x)) == normalize(x)`。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 字体指令，如 `%fＭＳ ゴシック;`
static FONT_DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%f[^;]+;").expect("font directive pattern is valid"));

const LEADING_QUOTES: [char; 3] = ['「', '"', '“'];
const TRAILING_QUOTES: [char; 3] = ['」', '"', '”'];

/// 规范化台词文本
///
/// 无法识别的标记原样保留；不会 panic。
pub fn normalize(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_pass(s: &str) -> String {
    let unescaped = s.replace("\\\"", "\"").replace("\\n", "\n");
    let stripped = FONT_DIRECTIVE_RE.replace_all(&unescaped, "");

    let mut text: &str = &stripped;
    if let Some(first) = text.chars().next()
        && LEADING_QUOTES.contains(&first)
    {
        text = &text[first.len_utf8()..];
    }
    if let Some(last) = text.chars().next_back()
        && TRAILING_QUOTES.contains(&last)
    {
        text = &text[..text.len() - last.len_utf8()];
    }

    text.trim().to_string()
}

/// 闭区间字符范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
    pub start: char,
    pub end: char,
}

impl CharRange {
    pub const fn new(start: char, end: char) -> Self {
        Self { start, end }
    }

    fn contains(&self, c: char) -> bool {
        self.start <= c && c <= self.end
    }
}

const HIRAGANA: CharRange = CharRange::new('ぁ', 'ん');
const KATAKANA: CharRange = CharRange::new('ァ', 'ン');
const PROLONGED_SOUND: CharRange = CharRange::new('ー', 'ー');
const JOYO_IDEOGRAPHS: CharRange = CharRange::new('一', '龥');
const CJK_UNIFIED: CharRange = CharRange::new('\u{4E00}', '\u{9FFF}');
const CJK_EXTENSION_A: CharRange = CharRange::new('\u{3400}', '\u{4DBF}');

/// 场景的工作语言（用于判断一段文本是否是“那种语言”的台词）
///
/// 策略可以在配置中替换，`Ranges` 允许直接给出码位区间。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingLanguage {
    /// 平假名、片假名、长音符与汉字
    #[default]
    Japanese,
    /// 仅平假名与片假名
    Kana,
    /// 汉字（含扩展 A 区）
    Chinese,
    /// 任意非 ASCII 且非控制字符
    NonAscii,
    /// 自定义码位区间
    Ranges(Vec<CharRange>),
}

impl WorkingLanguage {
    /// 文本中是否包含该语言的典型字符
    pub fn matches(&self, text: &str) -> bool {
        text.chars().any(|c| self.is_script_char(c))
    }

    fn is_script_char(&self, c: char) -> bool {
        match self {
            Self::Japanese => [HIRAGANA, KATAKANA, PROLONGED_SOUND, JOYO_IDEOGRAPHS]
                .iter()
                .any(|r| r.contains(c)),
            Self::Kana => HIRAGANA.contains(c) || KATAKANA.contains(c),
            Self::Chinese => CJK_UNIFIED.contains(c) || CJK_EXTENSION_A.contains(c),
            Self::NonAscii => !c.is_ascii() && !c.is_control(),
            Self::Ranges(ranges) => ranges.iter().any(|r| r.contains(c)),
        }
    }
}
