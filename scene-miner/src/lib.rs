//! # Scene Miner
//!
//! 从反编译的视觉小说场景脚本中抽取台词，产出语音-文本对齐表与多轮对话语料。
//!
//! ## 架构概述
//!
//! `scene-miner` 是纯逻辑核心，不做任何文件 IO。
//! 调用方读入场景文件与音频清单，交给 [`Miner`]，再自行写出结果：
//!
//! ```text
//! 场景文件 ──► SceneParser ──────────► DialogueRecord ──► VoiceTextAligner ──► AlignedSample
//!          └─► ParallelExtractor ───► ParallelLine ──► ConversationBuilder ──► Conversation
//! ```
//!
//! 场景脚本不保证是合法 JSON：能解析时按文档树遍历，
//! 不能解析时按语音标记在原始文本上开窗抽取。
//!
//! ## 使用示例
//!
//! ```ignore
//! use scene_miner::{Miner, MinerConfig, SceneDump, AudioAsset};
//!
//! let miner = Miner::new(MinerConfig::load("miner.json"));
//! let output = miner.mine(vec![SceneDump::new("b101.json", content)]);
//!
//! let alignment = output.align(&audio);
//! for conversation in &output.conversations {
//!     let example = conversation.to_sharegpt(&miner.config().conversation.labels);
//!     // 写出 example
//! }
//! println!("{}", output.summary().with_alignment(&alignment));
//! ```
//!
//! ## 模块结构
//!
//! - [`text`]：文本规范化与工作语言判定
//! - [`record`]：台词记录、对齐样本、对话等值类型
//! - [`parser`]：两级场景解析与多语言抽取
//! - [`role`]：说话者角色分类
//! - [`conversation`]：对话构建与 ShareGPT 输出形状
//! - [`align`]：语音-文本对齐
//! - [`assemble`]：去重与排序
//! - [`pipeline`]：并行抽取与归并
//! - [`config`]：配置
//! - [`diagnostic`]：场景级诊断

pub mod align;
pub mod assemble;
pub mod config;
pub mod conversation;
pub mod diagnostic;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod role;
pub mod text;

// 重导出核心类型
pub use align::{Alignment, AudioAsset, VoiceTextAligner};
pub use assemble::{Deduped, dedup_sorted};
pub use config::{
    AlignmentConfig, ConversationConfig, FallbackConfig, LanguageConfig, MinerConfig,
    ParserConfig, RoleConfig, RoleLabels, SpanPick, UnknownSpeakerPolicy,
};
pub use conversation::{ConversationBuilder, ShareGptExample, ShareGptMessage};
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticResult};
pub use error::{ConfigError, ConfigResult};
pub use parser::{
    Document, FallbackReason, ParallelExtractor, ParsedScene, SceneParser, Strategy,
    conversation_lines, extract_windowed,
};
pub use pipeline::{
    AlignmentSummary, MineOutput, MineSummary, Miner, SceneDump, SceneOutcome, SpeakerCount,
};
pub use record::{
    AlignedSample, Conversation, ConversationTurn, DialogueRecord, LanguageText, ParallelLine,
    Role,
};
pub use role::RoleClassifier;
pub use text::{CharRange, WorkingLanguage, normalize};
