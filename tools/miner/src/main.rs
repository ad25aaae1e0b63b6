//! # Miner
//!
//! 台词抽取工具 - 从反编译的场景脚本生成语音对齐表与多轮对话语料。
//!
//! ## 用法
//!
//! ```bash
//! # 在项目根目录使用 cargo 运行（默认执行全部步骤）
//! cargo run -p miner
//! cargo run -p miner -- --source scripts --audio-dir voice --output dataset
//! cargo run -p miner -- records
//! cargo run -p miner -- align --audio-dir voice
//! cargo run -p miner -- corpus
//! cargo run -p miner -- init
//!
//! # 或安装后直接使用
//! cargo install --path tools/miner
//! miner --config miner.json -v
//! ```

mod output;
mod source;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use scene_miner::{DiagnosticLevel, Miner, MinerConfig, MineSummary};
use tracing::{Level, info, warn};

use output::{CONVERSATIONS_FILE, OutputDir, SUMMARY_FILE};

/// 默认配置文件
const DEFAULT_CONFIG: &str = "miner.json";

#[derive(Parser, Debug)]
#[command(name = "miner")]
#[command(about = "台词抽取工具 - 从场景脚本生成语音对齐表与对话语料")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// 配置文件（默认：miner.json，不存在时使用默认配置）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 场景脚本目录
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    /// 输出目录
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// 音频目录（用于语音对齐）
    #[arg(short, long, global = true)]
    audio_dir: Option<PathBuf>,

    /// 并行线程数（默认：CPU 核数）
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// 输出调试日志
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// 只输出警告与错误
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// 执行全部步骤（默认）
    All,

    /// 只导出台词记录表
    Records,

    /// 只导出语音对齐表
    Align,

    /// 只导出对话语料
    Corpus,

    /// 写出默认配置文件
    Init {
        /// 覆盖已存在的文件
        #[arg(short, long)]
        force: bool,
    },
}

impl Commands {
    fn writes_records(self) -> bool {
        matches!(self, Self::All | Self::Records)
    }

    fn writes_alignment(self) -> bool {
        matches!(self, Self::All | Self::Align)
    }

    fn writes_corpus(self) -> bool {
        matches!(self, Self::All | Self::Corpus)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(&cli) {
        eprintln!("❌ 抽取失败: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::All);

    if let Commands::Init { force } = command {
        let path = cli.config.as_deref().unwrap_or(Path::new(DEFAULT_CONFIG));
        return init_config(path, force);
    }

    let config = resolve_config(cli)?;
    let summary = mine(&config, command)?;
    println!("{summary}");
    Ok(())
}

/// 写出默认配置
fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("配置文件已存在: {:?}（使用 --force 覆盖）", path);
    }
    MinerConfig::default().save(path)?;
    println!("✅ 已写出默认配置: {:?}", path);
    Ok(())
}

/// 合并配置：命令行 > 配置文件 > 默认值
///
/// 显式指定的配置文件必须能读取和解析；默认路径的文件缺失时使用默认配置。
fn resolve_config(cli: &Cli) -> Result<MinerConfig> {
    let mut config = match &cli.config {
        Some(path) => MinerConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件: {:?}", path))?,
        None => MinerConfig::load(DEFAULT_CONFIG),
    };

    if let Some(source) = &cli.source {
        config.source_dir = source.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(audio_dir) = &cli.audio_dir {
        config.audio_dir = Some(audio_dir.clone());
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = Some(jobs);
    }

    config.validate()?;
    Ok(config)
}

/// 执行抽取并写出结果，返回摘要
fn mine(config: &MinerConfig, command: Commands) -> Result<MineSummary> {
    let source = source::load_scenes(&config.source_dir, config)?;
    let read_failures = source.failures.len();

    let miner = Miner::new(config.clone());
    let output = miner.mine(source.scenes);

    let mut diagnostics = output.diagnostics();
    for failure in &source.failures {
        diagnostics.push(failure.to_diagnostic());
    }
    for diagnostic in diagnostics.filter_by_level(DiagnosticLevel::Warn) {
        warn!("{diagnostic}");
    }

    let out = OutputDir::create(&config.output_dir, config.csv_bom)?;
    let mut summary = output.summary().with_read_failures(read_failures);

    if command.writes_records() {
        let path = out.write_script_records(&output.voice_records, config.languages.align_slot)?;
        info!(path = ?path, rows = output.voice_records.len(), "台词记录已写出");
    }

    if command.writes_alignment() {
        match &config.audio_dir {
            Some(audio_dir) => {
                let audio = source::scan_audio(audio_dir, config)?;
                let alignment = output.align(&audio);
                let (csv_path, json_path) = out.write_voice_text(&alignment.matched)?;
                info!(csv = ?csv_path, json = ?json_path, rows = alignment.matched.len(), "语音对齐表已写出");
                summary = summary.with_alignment(&alignment);
            }
            None if command == Commands::Align => {
                bail!("对齐需要音频目录（--audio-dir 或配置项 audio_dir）");
            }
            None => info!("未配置音频目录，跳过语音对齐"),
        }
    }

    if command.writes_corpus() {
        let labels = &config.conversation.labels;
        let corpus: Vec<_> = output
            .conversations
            .iter()
            .map(|conversation| conversation.to_sharegpt(labels))
            .collect();
        let path = out.write_json(CONVERSATIONS_FILE, &corpus)?;
        info!(path = ?path, conversations = corpus.len(), "对话语料已写出");
    }

    out.write_json(SUMMARY_FILE, &summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SCENE: &str = r#"{"scenes": [{"texts": [
        ["NAT", null, [[null, "「起きたか」"], [null, "Awake?"], [null, "醒了吗"]], [{"voice": "NAT_b101_001"}]],
        ["ATR", null, [[null, "「はい」"], [null, "Yes"], [null, "是的"]], [{"voice": "ATR_b101_001"}]]
    ]}]}"#;

    fn fixture() -> (tempfile::TempDir, MinerConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::create_dir_all(root.join("voice")).unwrap();
        fs::write(root.join("scripts/b101.json"), SCENE).unwrap();
        fs::write(root.join("scripts/b101.resx.json"), SCENE).unwrap();
        fs::write(root.join("voice/ATR_b101_001.ogg"), b"").unwrap();

        let config = MinerConfig {
            source_dir: root.join("scripts"),
            output_dir: root.join("dataset"),
            audio_dir: Some(root.join("voice")),
            csv_bom: false,
            ..MinerConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["miner", "align", "--audio-dir", "voice", "-j", "4"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Align));
        assert_eq!(cli.audio_dir, Some(PathBuf::from("voice")));
        assert_eq!(cli.jobs, Some(4));

        assert!(Cli::try_parse_from(["miner", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_mine_writes_all_outputs() {
        let (dir, config) = fixture();
        let summary = mine(&config, Commands::All).unwrap();

        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.voice_records, 2);
        assert_eq!(summary.conversations, 1);
        assert_eq!(summary.alignment.as_ref().unwrap().matched, 1);

        let dataset = dir.path().join("dataset");
        let records = fs::read_to_string(dataset.join("script_records.csv")).unwrap();
        assert_eq!(
            records,
            "voice,speaker,text\nATR_b101_001,ATR,はい\nNAT_b101_001,NAT,起きたか\n"
        );

        let voice_text = fs::read_to_string(dataset.join("voice_text.csv")).unwrap();
        assert!(voice_text.starts_with("voice_id,speaker,text,audio_path\nATR_b101_001,ATR,はい,"));

        let corpus: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dataset.join(CONVERSATIONS_FILE)).unwrap())
                .unwrap();
        assert_eq!(corpus[0]["conversations"][0]["from"], "human");
        assert_eq!(corpus[0]["conversations"][1]["value"], "是的");

        assert!(dataset.join(SUMMARY_FILE).exists());
    }

    #[test]
    fn test_subcommand_limits_outputs() {
        let (dir, config) = fixture();
        mine(&config, Commands::Corpus).unwrap();

        let dataset = dir.path().join("dataset");
        assert!(dataset.join(CONVERSATIONS_FILE).exists());
        assert!(!dataset.join("script_records.csv").exists());
        assert!(!dataset.join("voice_text.csv").exists());
    }

    #[test]
    fn test_align_requires_audio_dir() {
        let (_dir, config) = fixture();
        let config = MinerConfig {
            audio_dir: None,
            ..config
        };
        assert!(mine(&config, Commands::Align).is_err());

        let summary = mine(&config, Commands::All).unwrap();
        assert!(summary.alignment.is_none());
    }

    #[test]
    fn test_missing_source_dir_is_fatal() {
        let (dir, config) = fixture();
        let config = MinerConfig {
            source_dir: dir.path().join("nope"),
            ..config
        };
        assert!(mine(&config, Commands::All).is_err());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miner.json");

        init_config(&path, false).unwrap();
        assert!(MinerConfig::from_file(&path).is_ok());
        assert!(init_config(&path, false).is_err());
        assert!(init_config(&path, true).is_ok());
    }
}
