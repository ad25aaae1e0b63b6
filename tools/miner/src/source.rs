//! 输入枚举与读取
//!
//! 目录无法遍历是致命错误；单个文件读取失败只记录并计数，不影响其他文件。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use scene_miner::{AudioAsset, Diagnostic, MinerConfig, SceneDump};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 读取失败的文件
#[derive(Debug)]
pub struct ReadFailure {
    pub scene_id: String,
    pub error: io::Error,
}

impl ReadFailure {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(&self.scene_id, "文件读取失败").with_detail(self.error.to_string())
    }
}

/// 读取结果
#[derive(Debug, Default)]
pub struct SceneSource {
    pub scenes: Vec<SceneDump>,
    pub failures: Vec<ReadFailure>,
}

/// 枚举目录下的文件（按文件名排序，`keep` 判断是否保留）
fn walk_files(root: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("输入目录不存在: {:?}", root);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("无法遍历目录: {:?}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if keep(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// 枚举场景文件
pub fn scan_scene_files(root: &Path, config: &MinerConfig) -> Result<Vec<PathBuf>> {
    walk_files(root, |name| config.is_scene_file(name))
}

/// 场景 ID：相对于根目录的路径，统一使用 `/`
pub fn scene_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// 并行读取场景文件
pub fn read_scenes(root: &Path, paths: &[PathBuf]) -> SceneSource {
    let results: Vec<(String, io::Result<String>)> = paths
        .par_iter()
        .map(|path| (scene_id(root, path), fs::read_to_string(path)))
        .collect();

    let mut source = SceneSource::default();
    for (scene_id, result) in results {
        match result {
            Ok(content) => source.scenes.push(SceneDump::new(scene_id, content)),
            Err(error) => {
                warn!(scene = %scene_id, error = %error, "文件读取失败，已跳过");
                source.failures.push(ReadFailure { scene_id, error });
            }
        }
    }

    info!(
        scenes = source.scenes.len(),
        failures = source.failures.len(),
        "场景文件读取完成"
    );
    source
}

/// 枚举并读取场景目录
pub fn load_scenes(root: &Path, config: &MinerConfig) -> Result<SceneSource> {
    let paths = scan_scene_files(root, config)?;
    debug!(files = paths.len(), root = ?root, "场景文件枚举完成");
    Ok(read_scenes(root, &paths))
}

/// 枚举音频文件
pub fn scan_audio(root: &Path, config: &MinerConfig) -> Result<Vec<AudioAsset>> {
    let assets: Vec<AudioAsset> = walk_files(root, |name| config.is_audio_file(name))?
        .into_iter()
        .filter_map(AudioAsset::from_path)
        .collect();
    info!(files = assets.len(), root = ?root, "音频文件枚举完成");
    Ok(assets)
}
