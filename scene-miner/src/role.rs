//! # Role 模块
//!
//! 把脚本中的说话者标识映射为 `Target` / `Other`。
//!
//! 映射表由配置显式传入，没有全局状态，测试可以随意替换。
//! 表中没有的标识按以下顺序处理：
//!
//! 1. 过长或包含指令特征子串 → 丢弃（更像引擎指令而不是人名）
//! 2. 空标识（旁白）→ `Other`，除非配置要求排除
//! 3. 其余按 [`UnknownSpeakerPolicy`] 处理，默认视为配角

use std::collections::BTreeMap;

use crate::config::{RoleConfig, UnknownSpeakerPolicy};
use crate::record::Role;

/// 说话者角色分类器
#[derive(Debug, Clone)]
pub struct RoleClassifier {
    table: BTreeMap<String, Role>,
    max_token_chars: usize,
    command_markers: Vec<String>,
    unknown_speaker: UnknownSpeakerPolicy,
    exclude_empty_speaker: bool,
}

impl RoleClassifier {
    pub fn new(config: &RoleConfig) -> Self {
        Self {
            table: config.table.clone(),
            max_token_chars: config.max_token_chars,
            command_markers: config.command_markers.clone(),
            unknown_speaker: config.unknown_speaker,
            exclude_empty_speaker: config.exclude_empty_speaker,
        }
    }

    /// 分类说话者，`None` 表示该台词应被丢弃
    pub fn classify(&self, token: &str) -> Option<Role> {
        let token = token.trim();
        if let Some(role) = self.table.get(token) {
            return Some(*role);
        }

        if self.is_command_like(token) {
            return None;
        }

        if token.is_empty() {
            return (!self.exclude_empty_speaker).then_some(Role::Other);
        }

        match self.unknown_speaker {
            UnknownSpeakerPolicy::AssumeOther => Some(Role::Other),
            UnknownSpeakerPolicy::Discard => None,
        }
    }

    fn is_command_like(&self, token: &str) -> bool {
        token.chars().count() > self.max_token_chars
            || self
                .command_markers
                .iter()
                .any(|marker| !marker.is_empty() && token.contains(marker.as_str()))
    }
}

impl Default for RoleClassifier {
    fn default() -> Self {
        Self::new(&RoleConfig::default())
    }
}
