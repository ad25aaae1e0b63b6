//! # Conversation 模块
//!
//! 把单个场景中按顺序排列的 `(说话者, 文本)` 折叠为多轮对话。
//!
//! 同一角色的连续台词合并为一个轮次（以空格连接），因此产出的对话
//! 角色严格交替。不满足最少轮次或不含目标人格的场景不产出对话。
//! 每个场景独立处理，不跨文件合并。

use serde::Serialize;

use crate::config::{ConversationConfig, RoleLabels};
use crate::record::{Conversation, ConversationTurn, Role};
use crate::role::RoleClassifier;
use crate::text::normalize;

/// 对话构建器
#[derive(Debug, Clone)]
pub struct ConversationBuilder {
    classifier: RoleClassifier,
    min_turns: usize,
    min_target_turns: usize,
}

impl ConversationBuilder {
    pub fn new(classifier: RoleClassifier, config: &ConversationConfig) -> Self {
        Self {
            classifier,
            min_turns: config.min_turns,
            min_target_turns: config.min_target_turns,
        }
    }

    /// 构建对话
    ///
    /// 无法分类的说话者与规范化后为空的文本会被跳过。
    pub fn build(&self, records: &[(String, String)], system_prompt: &str) -> Option<Conversation> {
        let mut turns: Vec<ConversationTurn> = Vec::new();

        for (speaker, raw) in records {
            let Some(role) = self.classifier.classify(speaker) else {
                continue;
            };
            let text = normalize(raw);
            if text.is_empty() {
                continue;
            }

            match turns.last_mut() {
                Some(last) if last.role == role => {
                    last.text.push(' ');
                    last.text.push_str(&text);
                }
                _ => turns.push(ConversationTurn { role, text }),
            }
        }

        let target_turns = turns.iter().filter(|t| t.role == Role::Target).count();
        if turns.len() < self.min_turns || target_turns < self.min_target_turns.max(1) {
            return None;
        }

        Some(Conversation {
            turns,
            system_prompt: system_prompt.to_string(),
        })
    }
}

/// ShareGPT 风格的训练样本
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareGptExample<'a> {
    pub conversations: Vec<ShareGptMessage<'a>>,
    pub system: &'a str,
}

/// ShareGPT 消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareGptMessage<'a> {
    pub from: &'a str,
    pub value: &'a str,
}

impl Conversation {
    /// 转为带对外角色标签的训练样本
    pub fn to_sharegpt<'a>(&'a self, labels: &'a RoleLabels) -> ShareGptExample<'a> {
        ShareGptExample {
            conversations: self
                .turns
                .iter()
                .map(|turn| ShareGptMessage {
                    from: labels.label(turn.role),
                    value: &turn.text,
                })
                .collect(),
            system: &self.system_prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConfig;

    fn builder() -> ConversationBuilder {
        ConversationBuilder::new(RoleClassifier::default(), &ConversationConfig::default())
    }

    fn lines(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    fn roles(conversation: &Conversation) -> Vec<Role> {
        conversation.turns().iter().map(|t| t.role).collect()
    }

    #[test]
    fn test_consecutive_same_role_lines_are_merged() {
        let records = lines(&[
            ("NAT", "おはよう"),
            ("MIN", "おはようございます"),
            ("ATR", "「はい」"),
            ("アトリ", "今日も元気です"),
            ("NAT", "そうか"),
        ]);
        let conversation = builder().build(&records, "sys").unwrap();

        assert_eq!(roles(&conversation), vec![Role::Other, Role::Target, Role::Other]);
        assert_eq!(conversation.turns()[0].text, "おはよう おはようございます");
        assert_eq!(conversation.turns()[1].text, "はい 今日も元気です");
        assert_eq!(conversation.system_prompt(), "sys");
        assert_eq!(conversation.target_turns(), 1);
    }

    #[test]
    fn test_conversation_may_start_with_target() {
        let records = lines(&[("ATR", "夏生さん"), ("NAT", "なんだ")]);
        let conversation = builder().build(&records, "").unwrap();
        assert_eq!(roles(&conversation), vec![Role::Target, Role::Other]);
    }

    #[test]
    fn test_single_turn_is_dropped() {
        let records = lines(&[("NAT", "一人で話す"), ("RYU", "俺もいる")]);
        assert!(builder().build(&records, "sys").is_none());

        let records = lines(&[("ATR", "はい")]);
        assert!(builder().build(&records, "sys").is_none());
    }

    #[test]
    fn test_without_target_is_dropped() {
        let records = lines(&[("NAT", "おい"), ("envupdate", "x"), ("店員", "いらっしゃいませ")]);
        // envupdate 被丢弃，剩下的都是 Other，合并后只有一轮
        assert!(builder().build(&records, "sys").is_none());
    }

    #[test]
    fn test_discarded_speakers_do_not_split_turns() {
        let records = lines(&[
            ("ATR", "一つ目"),
            ("envupdate", "ignored"),
            ("ATR", "二つ目"),
            ("NAT", "うん"),
        ]);
        let conversation = builder().build(&records, "sys").unwrap();
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.turns()[0].text, "一つ目 二つ目");
    }

    #[test]
    fn test_empty_text_is_skipped() {
        let records = lines(&[("NAT", "「」"), ("ATR", "はい"), ("NAT", "  ")]);
        assert!(builder().build(&records, "sys").is_none());
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let config = ConversationConfig {
            min_turns: 3,
            min_target_turns: 2,
            ..ConversationConfig::default()
        };
        let builder = ConversationBuilder::new(RoleClassifier::new(&RoleConfig::default()), &config);

        let records = lines(&[("NAT", "a"), ("ATR", "b"), ("NAT", "c")]);
        assert!(builder.build(&records, "").is_none());

        let records = lines(&[("ATR", "a"), ("NAT", "b"), ("ATR", "c")]);
        assert!(builder.build(&records, "").is_some());
    }

    #[test]
    fn test_sharegpt_shape() {
        let records = lines(&[("NAT", "你好"), ("ATR", "是的")]);
        let conversation = builder().build(&records, "sys").unwrap();
        let json = serde_json::to_string(&conversation.to_sharegpt(&RoleLabels::default())).unwrap();

        insta::assert_snapshot!(json, @r#"{"conversations":[{"from":"human","value":"你好"},{"from":"gpt","value":"是的"}],"system":"sys"}"#);
    }
}
