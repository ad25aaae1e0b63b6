//! # Pipeline 模块
//!
//! 把多个场景文件串成完整的抽取流程。
//!
//! ```text
//! SceneDump ×N ──(rayon, 每文件独立)──→ SceneOutcome ×N
//!                                            │ 单线程归并（按场景 ID 排序）
//!                                            ▼
//!                                       MineOutput ──→ align(音频) ──→ Alignment
//! ```
//!
//! 每个场景的处理只依赖文件内容和固定配置，可以任意并行；
//! 归并阶段只按排序键排序，输出与完成顺序无关。
//! 本模块不做任何 IO，文件读取与结果写出由调用方负责。

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::align::{Alignment, AudioAsset, VoiceTextAligner};
use crate::assemble::dedup_sorted;
use crate::config::MinerConfig;
use crate::conversation::ConversationBuilder;
use crate::diagnostic::DiagnosticResult;
use crate::parser::{ParallelExtractor, SceneParser, Strategy, conversation_lines};
use crate::record::{Conversation, DialogueRecord};
use crate::role::RoleClassifier;

/// 统计报告中列出的说话者数量
const TOP_SPEAKERS: usize = 10;

/// 单个场景文件的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDump {
    /// 场景 ID（通常是相对路径）
    pub scene_id: String,
    pub content: String,
}

impl SceneDump {
    pub fn new(scene_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            content: content.into(),
        }
    }
}

/// 单个场景的处理结果
#[derive(Debug, Clone)]
pub struct SceneOutcome {
    pub scene_id: String,
    pub strategy: Strategy,
    /// 解析出的台词记录（按出现顺序）
    pub records: Vec<DialogueRecord>,
    pub unmatched_markers: usize,
    /// 多语言抽取命中的行数
    pub parallel_lines: usize,
    pub conversation: Option<Conversation>,
    pub diagnostics: DiagnosticResult,
}

/// 抽取器
///
/// 持有解析器、多语言抽取器、对话构建器和对齐器，构造后只读。
pub struct Miner {
    config: MinerConfig,
    parser: SceneParser,
    extractor: ParallelExtractor,
    builder: ConversationBuilder,
    aligner: VoiceTextAligner,
    pool: Option<rayon::ThreadPool>,
}

impl Miner {
    /// 创建抽取器
    ///
    /// 配置了 `jobs` 时使用独立线程池，创建失败则退回全局线程池。
    pub fn new(config: MinerConfig) -> Self {
        let pool = config.jobs.and_then(|jobs| {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(jobs, error = %e, "线程池创建失败，使用全局线程池");
                    None
                }
            }
        });

        Self {
            parser: SceneParser::new(config.parser.clone()),
            extractor: ParallelExtractor::new(config.languages.slot_count),
            builder: ConversationBuilder::new(
                RoleClassifier::new(&config.roles),
                &config.conversation,
            ),
            aligner: VoiceTextAligner::new(&config.alignment, config.languages.align_slot),
            pool,
            config,
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// 处理单个场景（纯函数，不修改任何共享状态）
    pub fn mine_scene(&self, dump: &SceneDump) -> SceneOutcome {
        let parsed = self.parser.parse_scene(&dump.scene_id, &dump.content);

        let lines = self.extractor.extract(&dump.content);
        let turns = conversation_lines(&lines, self.config.languages.target_slot);
        let conversation = self
            .builder
            .build(&turns, &self.config.conversation.system_prompt);

        debug!(
            scene = %dump.scene_id,
            strategy = %parsed.strategy,
            records = parsed.records.len(),
            parallel_lines = lines.len(),
            conversation = conversation.is_some(),
            "场景处理完成"
        );

        SceneOutcome {
            scene_id: dump.scene_id.clone(),
            strategy: parsed.strategy,
            records: parsed.records,
            unmatched_markers: parsed.unmatched_markers,
            parallel_lines: lines.len(),
            conversation,
            diagnostics: parsed.diagnostics,
        }
    }

    /// 处理全部场景
    pub fn mine(&self, scenes: Vec<SceneDump>) -> MineOutput {
        info!(scenes = scenes.len(), "开始抽取");

        let run = || {
            scenes
                .par_iter()
                .map(|dump| self.mine_scene(dump))
                .collect::<Vec<_>>()
        };
        let mut outcomes = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        // 归并阶段：单线程，只依赖排序键
        outcomes.sort_by(|a, b| a.scene_id.cmp(&b.scene_id));

        let voiced = dedup_sorted(
            outcomes
                .iter()
                .flat_map(|outcome| outcome.records.iter())
                .filter(|record| record.voice_id.is_some())
                .cloned(),
            |record| self.aligner.key(record.voice_id.as_deref().unwrap_or_default()),
        );

        let conversations: Vec<Conversation> = outcomes
            .iter()
            .filter_map(|outcome| outcome.conversation.clone())
            .collect();

        info!(
            records = voiced.items.len(),
            duplicates = voiced.duplicates,
            conversations = conversations.len(),
            "抽取完成"
        );

        MineOutput {
            scenes: outcomes,
            voice_records: voiced.items,
            duplicate_voice_ids: voiced.duplicates,
            conversations,
            aligner: self.aligner.clone(),
        }
    }
}

/// 全部场景的归并结果
#[derive(Debug, Clone)]
pub struct MineOutput {
    /// 各场景结果，按场景 ID 排序
    pub scenes: Vec<SceneOutcome>,
    /// 带语音 ID 的记录，按语音 ID 去重并排序
    pub voice_records: Vec<DialogueRecord>,
    pub duplicate_voice_ids: usize,
    /// 保留的对话，按场景 ID 排序
    pub conversations: Vec<Conversation>,
    aligner: VoiceTextAligner,
}

impl MineOutput {
    /// 与音频文件对齐
    pub fn align(&self, audio: &[AudioAsset]) -> Alignment {
        let alignment = self.aligner.align(&self.voice_records, audio);
        info!(
            matched = alignment.matched.len(),
            voice_without_audio = alignment.voice_without_audio.len(),
            audio_without_text = alignment.audio_without_text.len(),
            "对齐完成"
        );
        alignment
    }

    /// 合并所有场景的诊断
    pub fn diagnostics(&self) -> DiagnosticResult {
        let mut result = DiagnosticResult::new();
        for scene in &self.scenes {
            result.merge(scene.diagnostics.clone());
        }
        result
    }

    /// 统计摘要（不含对齐信息）
    pub fn summary(&self) -> MineSummary {
        let mut summary = MineSummary {
            files_scanned: self.scenes.len(),
            voice_records: self.voice_records.len(),
            duplicate_voice_ids: self.duplicate_voice_ids,
            conversations: self.conversations.len(),
            ..MineSummary::default()
        };

        for scene in &self.scenes {
            if scene.strategy == Strategy::Windowed {
                summary.fallback_files += 1;
            }
            if scene.records.is_empty() {
                summary.empty_files += 1;
            }
            summary.records_extracted += scene.records.len();
            summary.unmatched_markers += scene.unmatched_markers;
            summary.parallel_lines += scene.parallel_lines;
        }

        summary
    }
}

/// 说话者计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeakerCount {
    pub speaker: String,
    pub count: usize,
}

/// 对齐统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub audio_files: usize,
    pub matched: usize,
    pub voice_without_audio: usize,
    pub audio_without_text: usize,
    pub duplicate_audio_ids: usize,
    pub match_rate: f64,
    /// 匹配数最多的说话者
    pub top_speakers: Vec<SpeakerCount>,
}

impl From<&Alignment> for AlignmentSummary {
    fn from(alignment: &Alignment) -> Self {
        Self {
            audio_files: alignment.audio_total,
            matched: alignment.matched.len(),
            voice_without_audio: alignment.voice_without_audio.len(),
            audio_without_text: alignment.audio_without_text.len(),
            duplicate_audio_ids: alignment.duplicate_audio_ids,
            match_rate: alignment.match_rate(),
            top_speakers: alignment
                .speaker_counts()
                .into_iter()
                .take(TOP_SPEAKERS)
                .map(|(speaker, count)| SpeakerCount { speaker, count })
                .collect(),
        }
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MineSummary {
    pub files_scanned: usize,
    /// 读取失败的文件数（由调用方填写）
    pub read_failures: usize,
    /// 回退到窗口抽取的文件数
    pub fallback_files: usize,
    /// 没有提取到台词的文件数
    pub empty_files: usize,
    pub records_extracted: usize,
    pub voice_records: usize,
    pub duplicate_voice_ids: usize,
    pub unmatched_markers: usize,
    pub parallel_lines: usize,
    pub conversations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentSummary>,
}

impl MineSummary {
    /// 附加对齐统计
    pub fn with_alignment(mut self, alignment: &Alignment) -> Self {
        self.alignment = Some(AlignmentSummary::from(alignment));
        self
    }

    /// 附加读取失败数
    pub fn with_read_failures(mut self, read_failures: usize) -> Self {
        self.read_failures = read_failures;
        self
    }
}

impl std::fmt::Display for MineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "场景文件: {} (读取失败 {}, 回退 {}, 无台词 {})",
            self.files_scanned, self.read_failures, self.fallback_files, self.empty_files
        )?;
        writeln!(
            f,
            "台词记录: {} (带语音 {}, 重复语音 ID {}, 未匹配标记 {})",
            self.records_extracted,
            self.voice_records,
            self.duplicate_voice_ids,
            self.unmatched_markers
        )?;
        writeln!(f, "多语言台词: {}", self.parallel_lines)?;
        write!(f, "对话: {}", self.conversations)?;

        if let Some(alignment) = &self.alignment {
            writeln!(f)?;
            writeln!(
                f,
                "音频文件: {} (重复 {})",
                alignment.audio_files, alignment.duplicate_audio_ids
            )?;
            writeln!(
                f,
                "匹配: {} ({:.2}%)",
                alignment.matched,
                alignment.match_rate * 100.0
            )?;
            write!(
                f,
                "未匹配: 有台词无音频 {}, 有音频无台词 {}",
                alignment.voice_without_audio, alignment.audio_without_text
            )?;
            if !alignment.top_speakers.is_empty() {
                write!(f, "\n说话者:")?;
                for entry in &alignment.top_speakers {
                    write!(f, "\n  {}: {}", entry.speaker, entry.count)?;
                }
            }
        }
        Ok(())
    }
}
