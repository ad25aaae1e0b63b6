//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-miner`: 运行 scene-miner 覆盖率
//! - `cov-workspace`: 运行 workspace 覆盖率
//! - `scene-check`: 检查场景脚本（解析策略、台词数、未匹配语音标记）

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use scene_miner::{DiagnosticResult, MinerConfig, SceneParser, Strategy};
use walkdir::WalkDir;

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn ensure_cargo_llvm_cov_available() -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["llvm-cov", "--version"]);
    match cmd.status() {
        Ok(s) if s.success() => Ok(()),
        _ => anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        ),
    }
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let sub = args.next().unwrap_or_else(|| "help".to_string());

    match sub.as_str() {
        "check-all" => {
            let mut fmt = Command::new("cargo");
            fmt.args(["fmt", "--all", "--", "--check"]);
            run("cargo fmt --all -- --check", &mut fmt)?;

            let mut clippy = Command::new("cargo");
            clippy.args(["clippy", "--workspace", "--all-targets"]);
            run("cargo clippy --workspace --all-targets", &mut clippy)?;

            let mut test = Command::new("cargo");
            test.args(["test", "--workspace"]);
            run("cargo test --workspace", &mut test)?;
        }
        "cov-miner" => {
            ensure_cargo_llvm_cov_available()?;

            let mut cov = Command::new("cargo");
            cov.args(["llvm-cov", "-p", "scene-miner", "--html"]);
            run("cargo llvm-cov -p scene-miner --html", &mut cov)?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "cov-workspace" => {
            ensure_cargo_llvm_cov_available()?;

            // 排除 xtask，避免稀释核心库的覆盖率
            let mut cov = Command::new("cargo");
            cov.args(["llvm-cov", "--workspace", "--exclude", "xtask", "--html"]);
            run(
                "cargo llvm-cov --workspace --exclude xtask --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "scene-check" => {
            let path = args.next();
            scene_check(path.as_deref())?;
        }
        "help" | "-h" | "--help" => {
            print_help();
        }
        other => anyhow::bail!("unknown xtask subcommand: {other}"),
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        r#"xtask - 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       运行 fmt、clippy、test 门禁检查
  cov-miner       运行 scene-miner 覆盖率报告
  cov-workspace   运行 workspace 覆盖率报告
  scene-check     检查场景脚本

SCENE-CHECK:
  cargo xtask scene-check [path]

  不带参数：检查 miner.json 中 source_dir 下的所有场景文件
  带路径参数：检查指定文件或目录

  检查内容：
    - 文件能否读取
    - 结构化解析失败、回退到窗口抽取的文件
    - 没有提取到任何台词的文件
    - 附近找不到台词的语音标记

ALIASES (in .cargo/config.toml):
  cargo check-all     -> cargo xtask check-all
  cargo cov-miner     -> cargo xtask cov-miner
  cargo cov-workspace -> cargo xtask cov-workspace
  cargo scene-check   -> cargo xtask scene-check
"#
    );
}

//=============================================================================
// scene-check 命令实现
//=============================================================================

/// 场景检查结果
#[derive(Default)]
struct SceneCheckResult {
    /// 检查的场景数量
    scenes_checked: usize,
    /// 读取失败数量
    read_errors: usize,
    /// 回退到窗口抽取的场景数量
    fallback_scenes: usize,
    /// 提取到的台词总数
    records: usize,
    /// 诊断结果
    diagnostics: DiagnosticResult,
}

/// 执行场景检查
fn scene_check(path: Option<&str>) -> anyhow::Result<()> {
    let config = MinerConfig::load("miner.json");

    // 确定要检查的文件
    let files = match path {
        Some(p) => {
            let path = PathBuf::from(p);
            if path.is_file() {
                vec![path]
            } else if path.is_dir() {
                collect_scene_files(&path, &config)?
            } else {
                anyhow::bail!("路径不存在: {}", p);
            }
        }
        None => {
            if !config.source_dir.exists() {
                anyhow::bail!(
                    "场景目录不存在: {}\n请在 workspace 根目录运行，或指定场景路径",
                    config.source_dir.display()
                );
            }
            collect_scene_files(&config.source_dir, &config)?
        }
    };

    if files.is_empty() {
        eprintln!("未找到场景文件");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个场景文件...\n", files.len());

    let parser = SceneParser::new(config.parser.clone());
    let mut result = SceneCheckResult::default();

    for file in &files {
        check_scene_file(file, &parser, &mut result);
    }

    print_check_result(&result);

    if result.read_errors > 0 || result.diagnostics.has_errors() {
        anyhow::bail!("场景检查发现错误");
    }

    Ok(())
}

/// 收集目录下的所有场景文件（跳过配置中排除的后缀）
fn collect_scene_files(dir: &Path, config: &MinerConfig) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        if config.is_scene_file(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// 检查单个场景文件
fn check_scene_file(file: &Path, parser: &SceneParser, result: &mut SceneCheckResult) {
    let scene_id = file.display().to_string();
    result.scenes_checked += 1;

    let content = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ERROR] {}: 无法读取文件 - {}", scene_id, e);
            result.read_errors += 1;
            return;
        }
    };

    let parsed = parser.parse_scene(&scene_id, &content);
    if parsed.strategy == Strategy::Windowed {
        result.fallback_scenes += 1;
    }
    result.records += parsed.records.len();
    result.diagnostics.merge(parsed.diagnostics);
}

/// 输出检查结果
fn print_check_result(result: &SceneCheckResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!(
        "检查完成: {} 个场景, {} 条台词, {} 个回退",
        result.scenes_checked, result.records, result.fallback_scenes
    );
    eprintln!();

    for diag in &result.diagnostics.diagnostics {
        eprintln!("{}", diag);
    }

    let error_count = result.read_errors + result.diagnostics.error_count();
    let warn_count = result.diagnostics.warn_count();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", error_count, warn_count);
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
