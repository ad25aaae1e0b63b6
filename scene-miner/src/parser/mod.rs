//! # Parser 模块
//!
//! 两级场景解析器：结构化遍历，失败时回退到窗口匹配。
//!
//! ## 架构
//!
//! ```text
//! 原始文本 → Document::load ─┬─ Structured(树) → [结构化遍历] ─┐
//!                            └─ Fallback(原因) → [窗口抽取] ───┴→ Vec<DialogueRecord>
//! ```
//!
//! 策略选择是一个显式的枚举值而不是异常处理，回退路径可以单独调用和测试。
//! 解析器从不 panic，也不返回错误：最坏情况是零条记录加一条诊断。
//!
//! ## 模块结构
//!
//! - `structured`: 结构化遍历（继承上下文、未认领语音）
//! - `windowed`: 窗口回退抽取
//! - `parallel`: 多语言并行抽取（对话语料用）

pub mod parallel;
pub mod structured;
pub mod windowed;

#[cfg(test)]
mod tests;

use serde::Serialize;
use serde_json::Value;

use crate::config::ParserConfig;
use crate::diagnostic::{Diagnostic, DiagnosticResult};
use crate::record::DialogueRecord;

pub use parallel::{ParallelExtractor, conversation_lines};
pub use structured::{InheritedContext, StructuredWalk, walk};
pub use windowed::{UnmatchedMarker, WindowedExtraction, extract_windowed};

/// 结构化解析失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReason {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (行 {}, 列 {})", self.message, self.line, self.column)
    }
}

/// 场景文档的加载结果
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// 可解析的文档树
    Structured(Value),
    /// 无法解析，需要回退
    Fallback(FallbackReason),
}

impl Document {
    /// 尝试把内容解析为文档树（忽略开头的 BOM）
    pub fn load(content: &str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        match serde_json::from_str(content) {
            Ok(tree) => Self::Structured(tree),
            Err(e) => Self::Fallback(FallbackReason {
                message: e.to_string(),
                line: e.line(),
                column: e.column(),
            }),
        }
    }
}

/// 实际使用的解析策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Structured,
    Windowed,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Windowed => write!(f, "windowed"),
        }
    }
}

/// 单个场景的解析结果
#[derive(Debug, Clone)]
pub struct ParsedScene {
    pub strategy: Strategy,
    pub records: Vec<DialogueRecord>,
    /// 没找到台词的语音标记数
    pub unmatched_markers: usize,
    pub diagnostics: DiagnosticResult,
}

/// 场景解析器
#[derive(Debug, Clone, Default)]
pub struct SceneParser {
    config: ParserConfig,
}

impl SceneParser {
    /// 创建新的解析器
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// 解析器配置
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// 解析场景内容，只返回记录
    pub fn parse(&self, content: &str) -> Vec<DialogueRecord> {
        self.parse_scene("", content).records
    }

    /// 解析场景内容
    ///
    /// # 参数
    ///
    /// - `scene_id`: 场景标识符（用于诊断）
    /// - `content`: 场景文件内容
    pub fn parse_scene(&self, scene_id: &str, content: &str) -> ParsedScene {
        let mut diagnostics = DiagnosticResult::new();

        let (strategy, records, unmatched_markers) = match Document::load(content) {
            Document::Structured(tree) => {
                let walked = walk(&tree, &self.config);
                for voice_id in &walked.unclaimed_voices {
                    diagnostics.push(
                        Diagnostic::warn(scene_id, "语音标记附近没有找到台词")
                            .with_detail(voice_id.clone()),
                    );
                }
                (
                    Strategy::Structured,
                    walked.records,
                    walked.unclaimed_voices.len(),
                )
            }
            Document::Fallback(reason) => {
                diagnostics.push(
                    Diagnostic::info(scene_id, "结构化解析失败，改用窗口抽取")
                        .with_line(reason.line)
                        .with_detail(reason.message.clone()),
                );

                let extraction = extract_windowed(
                    content,
                    &self.config.fallback,
                    &self.config.working_language,
                );
                for marker in &extraction.unmatched {
                    diagnostics.push(
                        Diagnostic::warn(scene_id, "语音标记附近没有找到台词")
                            .with_line(marker.line)
                            .with_detail(marker.voice_id.clone()),
                    );
                }
                (
                    Strategy::Windowed,
                    extraction.records,
                    extraction.unmatched.len(),
                )
            }
        };

        if records.is_empty() {
            diagnostics.push(Diagnostic::warn(scene_id, "未提取到任何台词"));
        }

        ParsedScene {
            strategy,
            records,
            unmatched_markers,
            diagnostics,
        }
    }
}
