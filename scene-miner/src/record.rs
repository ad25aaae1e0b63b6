//! # Record 模块
//!
//! 流水线中流转的值对象：台词记录、对齐样本、对话。
//!
//! 所有类型构造后不可变，各阶段只产生新值，不修改上游的结果。

use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// 单条语言轨道
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageText {
    /// 语言槽位标签（脚本中多为 null）
    pub tag: Option<String>,
    /// 规范化后的文本
    pub text: String,
}

impl LanguageText {
    /// 创建语言轨道，文本会被规范化
    pub fn new(tag: Option<String>, raw: &str) -> Self {
        Self {
            tag,
            text: normalize(raw),
        }
    }
}

/// 从场景脚本中提取的一句台词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueRecord {
    /// 语音 ID（仅当场景关联了语音时存在）
    pub voice_id: Option<String>,
    /// 脚本中的原始说话者标识（旁白/系统行可能为空）
    pub speaker: String,
    /// 按脚本出现顺序排列的语言轨道，第一条通常是原文
    pub texts: Vec<LanguageText>,
}

impl DialogueRecord {
    /// 创建记录
    ///
    /// 所有轨道都为空时返回 `None`，该记录应被丢弃。
    pub fn new(
        voice_id: Option<String>,
        speaker: impl Into<String>,
        texts: Vec<LanguageText>,
    ) -> Option<Self> {
        if texts.iter().all(|t| t.text.is_empty()) {
            return None;
        }
        Some(Self {
            voice_id,
            speaker: speaker.into(),
            texts,
        })
    }

    /// 取指定槽位的文本
    ///
    /// 槽位不存在或为空时退回第一条非空轨道。
    pub fn text_for_slot(&self, slot: usize) -> &str {
        match self.texts.get(slot) {
            Some(t) if !t.text.is_empty() => &t.text,
            _ => self
                .texts
                .iter()
                .map(|t| t.text.as_str())
                .find(|t| !t.is_empty())
                .unwrap_or_default(),
        }
    }
}

/// 多语言抽取器输出的一行（保留全部槽位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelLine {
    /// 说话者标识
    pub speaker: String,
    /// 各槽位文本（已规范化，可能为空）
    pub texts: Vec<LanguageText>,
}

/// 语音-文本对齐样本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedSample {
    pub voice_id: String,
    pub speaker: String,
    pub text: String,
    pub audio_path: String,
}

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 目标人格
    Target,
    /// 其他所有说话者
    Other,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target => write!(f, "target"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// 对话轮次（同角色的连续台词合并而成）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

/// 多轮对话
///
/// 只能由 [`ConversationBuilder`](crate::conversation::ConversationBuilder) 构造，
/// 保证相邻轮次角色不同且至少包含一个 `Target` 轮次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub(crate) turns: Vec<ConversationTurn>,
    pub(crate) system_prompt: String,
}

impl Conversation {
    /// 对话轮次
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// 系统提示词
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 目标人格轮次数量
    pub fn target_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::Target).count()
    }
}
