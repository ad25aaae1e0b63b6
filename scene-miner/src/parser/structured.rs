//! # 结构化遍历
//!
//! 在能被解析为 JSON 的场景文件上递归查找台词。
//!
//! 两类节点会产出记录：
//!
//! - 带语音字段的对象：在对象自身及其直接子节点中查找第一段工作语言文本
//! - 形如 `[说话者, 显示名|null, [[标签, 文本], ...], ...]` 的列表：视为一行台词，
//!   即使没有语音 ID
//!
//! 语音 ID 与说话者作为继承上下文向下传递。说话者对子节点只是副本；
//! 尚未认领的语音则沿兄弟节点依次传递，最多被一行台词认领一次。
//! 台词行自带的语音（尾随兄弟节点中的语音字段）优先于继承的语音。
//! 遍历结束仍无人认领的语音 ID 单独返回，由调用方计入未匹配。

use serde_json::{Map, Value};

use crate::config::ParserConfig;
use crate::record::{DialogueRecord, LanguageText};
use crate::text::normalize;

/// 继承上下文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritedContext {
    /// 尚未被任何台词认领的语音 ID
    pub voice: Option<String>,
    /// 最近的说话者
    pub speaker: Option<String>,
}

/// 结构化遍历结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredWalk {
    /// 按文档顺序排列的记录
    pub records: Vec<DialogueRecord>,
    /// 没有被任何台词认领的语音 ID
    pub unclaimed_voices: Vec<String>,
}

/// 遍历文档树
pub fn walk(root: &Value, config: &ParserConfig) -> StructuredWalk {
    let mut out = StructuredWalk::default();
    visit(root, InheritedContext::default(), config, &mut out);
    out
}

/// 返回仍未被认领的继承语音
fn visit(
    node: &Value,
    ctx: InheritedContext,
    config: &ParserConfig,
    out: &mut StructuredWalk,
) -> Option<String> {
    match node {
        Value::Object(map) => visit_object(map, ctx, config, out),
        Value::Array(items) => match DialogueLine::from_items(items) {
            Some(line) => line.emit(ctx, config, out),
            None => visit_children(items, ctx, config, out),
        },
        _ => ctx.voice,
    }
}

/// 依次访问子节点；语音被某个子节点认领后，后续兄弟不再继承
fn visit_children<'a>(
    children: impl IntoIterator<Item = &'a Value>,
    ctx: InheritedContext,
    config: &ParserConfig,
    out: &mut StructuredWalk,
) -> Option<String> {
    let InheritedContext { mut voice, speaker } = ctx;
    for child in children {
        let child_ctx = InheritedContext {
            voice,
            speaker: speaker.clone(),
        };
        voice = visit(child, child_ctx, config, out);
    }
    voice
}

fn visit_object(
    map: &Map<String, Value>,
    ctx: InheritedContext,
    config: &ParserConfig,
    out: &mut StructuredWalk,
) -> Option<String> {
    let speaker = non_empty_str(map.get(&config.speaker_key))
        .map(str::to_string)
        .or(ctx.speaker);

    let Some(voice) = non_empty_str(map.get(&config.voice_key)).map(str::to_string) else {
        let child_ctx = InheritedContext {
            voice: ctx.voice,
            speaker,
        };
        return visit_children(map.values(), child_ctx, config, out);
    };

    // 本节点的语音：先在自身找台词，找不到再交给子孙节点
    let pending = match find_text_in_context(map, config).and_then(|text| {
        DialogueRecord::new(
            Some(voice.clone()),
            speaker.clone().unwrap_or_default(),
            vec![LanguageText::new(None, text)],
        )
    }) {
        Some(record) => {
            out.records.push(record);
            None
        }
        None => Some(voice),
    };

    let child_ctx = InheritedContext {
        voice: pending,
        speaker,
    };
    if let Some(voice) = visit_children(map.values(), child_ctx, config, out) {
        out.unclaimed_voices.push(voice);
    }

    // 祖先的语音不会被本节点的语音遮蔽，原样交还
    ctx.voice
}

/// 在对象的直接子节点（及列表子节点中的字符串）里查找第一段工作语言文本
fn find_text_in_context<'a>(map: &'a Map<String, Value>, config: &ParserConfig) -> Option<&'a str> {
    let is_candidate =
        |s: &str| config.working_language.matches(s) && !normalize(s).is_empty();

    for (key, value) in map {
        if *key == config.voice_key || *key == config.speaker_key {
            continue;
        }
        match value {
            Value::String(s) if is_candidate(s.as_str()) => return Some(s.as_str()),
            Value::Array(items) => {
                if let Some(s) = items
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|&s| is_candidate(s))
                {
                    return Some(s);
                }
            }
            _ => {}
        }
    }
    None
}

/// `[说话者, 显示名|null, [[标签, 文本], ...], ...]` 形式的台词行
struct DialogueLine<'a> {
    speaker: &'a str,
    tuples: &'a [Value],
    trailing: &'a [Value],
}

impl<'a> DialogueLine<'a> {
    fn from_items(items: &'a [Value]) -> Option<Self> {
        if items.len() < 3 {
            return None;
        }
        let speaker = items[0].as_str()?;
        if !(items[1].is_string() || items[1].is_null()) {
            return None;
        }
        let tuples = items[2].as_array()?;
        if tuples.is_empty() || !tuples.iter().all(Value::is_array) {
            return None;
        }
        Some(Self {
            speaker,
            tuples,
            trailing: &items[3..],
        })
    }

    /// 每个语言元组对应一个槽位；元组里没有文本时保留空槽位以维持位置
    fn texts(&self) -> Vec<LanguageText> {
        self.tuples
            .iter()
            .filter_map(Value::as_array)
            .map(|tuple| {
                let tag = tuple.first().and_then(Value::as_str).map(str::to_string);
                let text = tuple.get(1).and_then(Value::as_str).unwrap_or_default();
                LanguageText::new(tag, text)
            })
            .collect()
    }

    /// 产出记录，返回仍未被认领的继承语音
    fn emit(
        self,
        ctx: InheritedContext,
        config: &ParserConfig,
        out: &mut StructuredWalk,
    ) -> Option<String> {
        let own_voice = self
            .trailing
            .iter()
            .find_map(|sibling| find_voice(sibling, &config.voice_key))
            .map(str::to_string);
        let speaker = if self.speaker.is_empty() {
            ctx.speaker.unwrap_or_default()
        } else {
            self.speaker.to_string()
        };
        let texts = self.texts();

        match own_voice {
            Some(voice) => {
                match DialogueRecord::new(Some(voice.clone()), speaker, texts) {
                    Some(record) => out.records.push(record),
                    None => out.unclaimed_voices.push(voice),
                }
                ctx.voice
            }
            None => match DialogueRecord::new(ctx.voice.clone(), speaker, texts) {
                Some(record) => {
                    out.records.push(record);
                    None
                }
                None => ctx.voice,
            },
        }
    }
}

/// 在兄弟节点中查找第一个带语音字段的对象
fn find_voice<'a>(node: &'a Value, voice_key: &str) -> Option<&'a str> {
    match node {
        Value::Object(map) => non_empty_str(map.get(voice_key))
            .or_else(|| map.values().find_map(|v| find_voice(v, voice_key))),
        Value::Array(items) => items.iter().find_map(|v| find_voice(v, voice_key)),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
