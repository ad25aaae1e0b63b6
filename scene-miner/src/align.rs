//! # Align 模块
//!
//! 把带语音 ID 的台词记录与单独枚举的音频文件做连接。
//!
//! 连接键是语音 ID（默认不区分大小写）。结果包含匹配样本
//! 以及两个未匹配集合：有台词无音频、有音频无台词。

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::assemble::dedup_sorted;
use crate::config::AlignmentConfig;
use crate::record::{AlignedSample, DialogueRecord};

/// 音频文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    /// 文件名去掉扩展名
    pub id: String,
    pub path: PathBuf,
}

impl AudioAsset {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// 以文件名（不含扩展名）作为 ID
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let id = path.file_stem()?.to_str()?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(id, path))
    }
}

/// 对齐结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    /// 匹配样本，按语音 ID 排序
    pub matched: Vec<AlignedSample>,
    /// 有台词但没有音频的语音 ID
    pub voice_without_audio: BTreeSet<String>,
    /// 有音频但没有台词的语音 ID
    pub audio_without_text: BTreeSet<String>,
    /// 被丢弃的重复台词记录数
    pub duplicate_voice_ids: usize,
    /// 被丢弃的重复音频数
    pub duplicate_audio_ids: usize,
    /// 参与对齐的音频 ID 数（去重后）
    pub audio_total: usize,
}

impl Alignment {
    /// 匹配率（匹配数 / 音频 ID 数），没有音频时为 0
    pub fn match_rate(&self) -> f64 {
        if self.audio_total == 0 {
            return 0.0;
        }
        self.matched.len() as f64 / self.audio_total as f64
    }

    /// 每个说话者的匹配样本数，按数量降序，数量相同按名称升序
    pub fn speaker_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for sample in &self.matched {
            *counts.entry(sample.speaker.as_str()).or_default() += 1;
        }

        let mut counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(speaker, n)| (speaker.to_string(), n))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

/// 语音-文本对齐器
#[derive(Debug, Clone)]
pub struct VoiceTextAligner {
    case_insensitive: bool,
    text_slot: usize,
}

impl Default for VoiceTextAligner {
    fn default() -> Self {
        Self::new(&AlignmentConfig::default(), 0)
    }
}

impl VoiceTextAligner {
    /// 创建对齐器
    ///
    /// `text_slot` 为输出文本使用的语言槽位，该槽位为空时退回第一条非空轨道。
    pub fn new(config: &AlignmentConfig, text_slot: usize) -> Self {
        Self {
            case_insensitive: config.case_insensitive,
            text_slot,
        }
    }

    /// 语音 ID 的连接键
    pub fn key(&self, id: &str) -> String {
        let id = id.trim();
        if self.case_insensitive {
            id.to_uppercase()
        } else {
            id.to_string()
        }
    }

    /// 对齐记录与音频
    ///
    /// 没有语音 ID 的记录不参与对齐。同一个键的多条记录只保留第一条，
    /// 同一个键的多个音频只保留路径排序最前的一个。
    pub fn align(&self, records: &[DialogueRecord], audio: &[AudioAsset]) -> Alignment {
        let voiced = dedup_sorted(
            records
                .iter()
                .filter_map(|r| r.voice_id.as_deref().map(|id| (self.key(id), r))),
            |(key, _)| key.clone(),
        );

        let mut assets: Vec<&AudioAsset> = audio.iter().collect();
        assets.sort_by(|a, b| a.path.cmp(&b.path));
        let assets = dedup_sorted(assets, |asset| self.key(&asset.id));
        let audio_total = assets.items.len();

        let mut audio_by_key: BTreeMap<String, &AudioAsset> = assets
            .items
            .into_iter()
            .map(|asset| (self.key(&asset.id), asset))
            .collect();

        let mut alignment = Alignment {
            duplicate_voice_ids: voiced.duplicates,
            duplicate_audio_ids: assets.duplicates,
            audio_total,
            ..Alignment::default()
        };

        for (key, record) in voiced.items {
            // 键来自带语音 ID 的记录，这里一定存在
            let voice_id = record.voice_id.clone().unwrap_or_default();
            match audio_by_key.remove(&key) {
                Some(asset) => alignment.matched.push(AlignedSample {
                    voice_id,
                    speaker: record.speaker.clone(),
                    text: record.text_for_slot(self.text_slot).to_string(),
                    audio_path: asset.path.to_string_lossy().into_owned(),
                }),
                None => {
                    alignment.voice_without_audio.insert(voice_id);
                }
            }
        }

        alignment.audio_without_text = audio_by_key
            .into_values()
            .map(|asset| asset.id.clone())
            .collect();

        alignment
    }
}
