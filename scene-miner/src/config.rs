//! # Config 模块
//!
//! 抽取流水线的全部可调参数。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高，由 `miner` 工具覆盖）
//! 2. 配置文件 (miner.json)
//! 3. 默认值（最低）
//!
//! 默认值复现参考语料（ATRI）的设置：三语槽位（日/英/中），
//! 对话语料取中文槽位，语音对齐取日文槽位。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::record::Role;
use crate::text::WorkingLanguage;

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// 场景脚本目录
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// 语音文件目录（未配置时跳过对齐）
    #[serde(default)]
    pub audio_dir: Option<PathBuf>,

    /// 输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// 参与扫描的脚本扩展名
    #[serde(default = "default_script_extensions")]
    pub script_extensions: Vec<String>,

    /// 需要排除的附属文件后缀
    #[serde(default = "default_excluded_suffixes")]
    pub excluded_suffixes: Vec<String>,

    /// 语音文件扩展名
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,

    /// CSV 是否写入 UTF-8 BOM（方便表格软件识别编码）
    #[serde(default = "default_csv_bom")]
    pub csv_bom: bool,

    /// 并行线程数（None 表示使用 rayon 默认值）
    #[serde(default)]
    pub jobs: Option<usize>,

    /// 解析器配置
    #[serde(default)]
    pub parser: ParserConfig,

    /// 多语言槽位配置
    #[serde(default)]
    pub languages: LanguageConfig,

    /// 角色映射配置
    #[serde(default)]
    pub roles: RoleConfig,

    /// 对话构建配置
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// 语音对齐配置
    #[serde(default)]
    pub alignment: AlignmentConfig,
}

/// 解析器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// 携带语音 ID 的字段名
    #[serde(default = "default_voice_key")]
    pub voice_key: String,

    /// 携带说话者的字段名
    #[serde(default = "default_speaker_key")]
    pub speaker_key: String,

    /// 场景的工作语言
    #[serde(default)]
    pub working_language: WorkingLanguage,

    /// 窗口回退策略配置
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// 窗口回退策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// 语音标记之前的窗口字符数
    #[serde(default = "default_window_before")]
    pub window_before: usize,

    /// 语音标记之后的窗口字符数
    #[serde(default = "default_window_after")]
    pub window_after: usize,

    /// 是否优先采用 `「…」` 包裹的台词
    #[serde(default = "default_prefer_corner_brackets")]
    pub prefer_corner_brackets: bool,

    /// 窗口内有多个候选时选哪一个
    #[serde(default)]
    pub pick: SpanPick,

    /// 只认该字段的值为语音标记（如 `"voice"`）；为空时任何带引号的语音 ID 都算
    #[serde(default)]
    pub marker_key: Option<String>,
}

/// 回退窗口内的候选选择策略
///
/// 多段引号文本并存时（嵌套引用、长独白）无法确定哪一段是真正的台词，
/// 这里只提供两种可解释的启发式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanPick {
    /// 整个窗口中的最后一段
    #[default]
    Last,
    /// 语音标记之前的最后一段
    NearestBefore,
}

/// 多语言槽位配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// 每行台词的并行语言数
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,

    /// 对话语料使用的槽位（从 0 开始）
    #[serde(default = "default_target_slot")]
    pub target_slot: usize,

    /// 语音对齐表使用的槽位（从 0 开始）
    #[serde(default)]
    pub align_slot: usize,
}

/// 未知说话者的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSpeakerPolicy {
    /// 视为配角（Other）
    #[default]
    AssumeOther,
    /// 直接丢弃
    Discard,
}

/// 角色映射配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// 说话者标识（含别名/罗马字）→ 角色
    #[serde(default = "default_role_table")]
    pub table: BTreeMap<String, Role>,

    /// 超过该长度的未知标识视为引擎指令而非人名
    #[serde(default = "default_max_token_chars")]
    pub max_token_chars: usize,

    /// 包含这些子串的未知标识视为引擎指令
    #[serde(default = "default_command_markers")]
    pub command_markers: Vec<String>,

    /// 未知说话者策略
    #[serde(default)]
    pub unknown_speaker: UnknownSpeakerPolicy,

    /// 是否丢弃空说话者（旁白）
    #[serde(default)]
    pub exclude_empty_speaker: bool,
}

/// 角色的对外标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLabels {
    #[serde(default = "default_target_label")]
    pub target: String,
    #[serde(default = "default_other_label")]
    pub other: String,
}

impl RoleLabels {
    /// 角色对应的标签
    pub fn label(&self, role: Role) -> &str {
        match role {
            Role::Target => &self.target,
            Role::Other => &self.other,
        }
    }
}

/// 对话构建配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// 最少轮次
    #[serde(default = "default_min_turns")]
    pub min_turns: usize,

    /// 最少目标人格轮次
    #[serde(default = "default_min_target_turns")]
    pub min_target_turns: usize,

    /// 附加在每条对话上的系统提示词
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// 对外角色标签
    #[serde(default)]
    pub labels: RoleLabels,
}

/// 语音对齐配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// 语音 ID 匹配是否忽略大小写
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

// 默认值函数
fn default_source_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_script_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_excluded_suffixes() -> Vec<String> {
    vec![".resx.json".to_string()]
}

fn default_audio_extensions() -> Vec<String> {
    ["opus", "ogg", "wav"].iter().map(|s| s.to_string()).collect()
}

fn default_csv_bom() -> bool {
    true
}

fn default_voice_key() -> String {
    "voice".to_string()
}

fn default_speaker_key() -> String {
    "name".to_string()
}

fn default_window_before() -> usize {
    2000
}

fn default_window_after() -> usize {
    500
}

fn default_prefer_corner_brackets() -> bool {
    true
}

/// 并行语言槽位数上限
pub const MAX_SLOT_COUNT: usize = 8;

fn default_slot_count() -> usize {
    3
}

fn default_target_slot() -> usize {
    2
}

fn default_role_table() -> BTreeMap<String, Role> {
    [
        ("アトリ", Role::Target),
        ("ATR", Role::Target),
        ("夏生", Role::Other),
        ("NAT", Role::Other),
        ("水菜萌", Role::Other),
        ("MIN", Role::Other),
        ("キャサリン", Role::Other),
        ("CAT", Role::Other),
        ("竜司", Role::Other),
        ("RYU", Role::Other),
        ("リリカ", Role::Other),
        ("RIR", Role::Other),
    ]
    .into_iter()
    .map(|(token, role)| (token.to_string(), role))
    .collect()
}

fn default_max_token_chars() -> usize {
    20
}

fn default_command_markers() -> Vec<String> {
    vec!["update".to_string()]
}

fn default_target_label() -> String {
    "gpt".to_string()
}

fn default_other_label() -> String {
    "human".to_string()
}

fn default_min_turns() -> usize {
    2
}

fn default_min_target_turns() -> usize {
    1
}

fn default_system_prompt() -> String {
    "你叫亚托莉（Atri），是一个高性能的机器人少女。你说话语气略带骄傲，但内心温柔。".to_string()
}

fn default_case_insensitive() -> bool {
    true
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            audio_dir: None,
            output_dir: default_output_dir(),
            script_extensions: default_script_extensions(),
            excluded_suffixes: default_excluded_suffixes(),
            audio_extensions: default_audio_extensions(),
            csv_bom: default_csv_bom(),
            jobs: None,
            parser: ParserConfig::default(),
            languages: LanguageConfig::default(),
            roles: RoleConfig::default(),
            conversation: ConversationConfig::default(),
            alignment: AlignmentConfig::default(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            voice_key: default_voice_key(),
            speaker_key: default_speaker_key(),
            working_language: WorkingLanguage::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            window_before: default_window_before(),
            window_after: default_window_after(),
            prefer_corner_brackets: default_prefer_corner_brackets(),
            pick: SpanPick::default(),
            marker_key: None,
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            slot_count: default_slot_count(),
            target_slot: default_target_slot(),
            align_slot: 0,
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            table: default_role_table(),
            max_token_chars: default_max_token_chars(),
            command_markers: default_command_markers(),
            unknown_speaker: UnknownSpeakerPolicy::default(),
            exclude_empty_speaker: false,
        }
    }
}

impl Default for RoleLabels {
    fn default() -> Self {
        Self {
            target: default_target_label(),
            other: default_other_label(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            min_turns: default_min_turns(),
            min_target_turns: default_min_target_turns(),
            system_prompt: default_system_prompt(),
            labels: RoleLabels::default(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            case_insensitive: default_case_insensitive(),
        }
    }
}

impl MinerConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = ?path, "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => {
                info!(path = ?path, "配置文件加载成功");
                config
            }
            Err(e) => {
                warn!(error = %e, "配置文件加载失败，使用默认配置");
                Self::default()
            }
        }
    }

    /// 严格加载配置文件（读取或解析失败即返回错误）
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 文本解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 验证配置有效性
    pub fn validate(&self) -> ConfigResult<()> {
        let languages = &self.languages;
        if languages.slot_count == 0 || languages.slot_count > MAX_SLOT_COUNT {
            return Err(ConfigError::Validation(format!(
                "slot_count 必须在 1..={MAX_SLOT_COUNT} 之间"
            )));
        }
        if languages.target_slot >= languages.slot_count {
            return Err(ConfigError::Validation(format!(
                "target_slot ({}) 超出槽位数 ({})",
                languages.target_slot, languages.slot_count
            )));
        }
        if languages.align_slot >= languages.slot_count {
            return Err(ConfigError::Validation(format!(
                "align_slot ({}) 超出槽位数 ({})",
                languages.align_slot, languages.slot_count
            )));
        }

        let fallback = &self.parser.fallback;
        if fallback.window_before == 0 && fallback.window_after == 0 {
            return Err(ConfigError::Validation("回退窗口不能为空".to_string()));
        }
        if fallback.marker_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(ConfigError::Validation("marker_key 不能为空字符串".to_string()));
        }

        if self.conversation.min_turns == 0 {
            return Err(ConfigError::Validation("min_turns 必须大于 0".to_string()));
        }

        let labels = &self.conversation.labels;
        if labels.target.is_empty() || labels.other.is_empty() {
            return Err(ConfigError::Validation("角色标签不能为空".to_string()));
        }
        if labels.target == labels.other {
            return Err(ConfigError::Validation(format!(
                "两个角色标签不能相同: {}",
                labels.target
            )));
        }

        Ok(())
    }

    /// 按文件名判断是否是需要扫描的场景文件
    ///
    /// 扩展名不区分大小写；排除后缀优先（如 `.resx.json`）。
    pub fn is_scene_file(&self, name: &str) -> bool {
        has_extension(name, &self.script_extensions)
            && !self
                .excluded_suffixes
                .iter()
                .any(|suffix| !suffix.is_empty() && name.ends_with(suffix.as_str()))
    }

    /// 按文件名判断是否是语音文件
    pub fn is_audio_file(&self, name: &str) -> bool {
        has_extension(name, &self.audio_extensions)
    }
}

/// 文件名带有给定扩展名之一，且扩展名前还有内容
fn has_extension(name: &str, extensions: &[String]) -> bool {
    name.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty() && extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    })
}
