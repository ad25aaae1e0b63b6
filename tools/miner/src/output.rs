//! 结果写出
//!
//! 只在整个流水线完成后调用，不做增量写入。CSV 可选写入 UTF-8 BOM，
//! 便于表格软件正确识别编码。

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scene_miner::{AlignedSample, DialogueRecord};
use serde::Serialize;

pub const SCRIPT_RECORDS_FILE: &str = "script_records.csv";
pub const VOICE_TEXT_CSV_FILE: &str = "voice_text.csv";
pub const VOICE_TEXT_JSON_FILE: &str = "voice_text.json";
pub const CONVERSATIONS_FILE: &str = "conversations.json";
pub const SUMMARY_FILE: &str = "summary.json";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 输出目录
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    csv_bom: bool,
}

#[derive(Serialize)]
struct ScriptRow<'a> {
    voice: &'a str,
    speaker: &'a str,
    text: &'a str,
}

impl OutputDir {
    /// 创建输出目录（不存在时自动创建）
    pub fn create(root: impl Into<PathBuf>, csv_bom: bool) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("无法创建输出目录: {:?}", root))?;
        Ok(Self { root, csv_bom })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// 写出台词记录表 `voice,speaker,text`
    pub fn write_script_records(&self, records: &[DialogueRecord], text_slot: usize) -> Result<PathBuf> {
        let rows = records.iter().map(|record| ScriptRow {
            voice: record.voice_id.as_deref().unwrap_or_default(),
            speaker: &record.speaker,
            text: record.text_for_slot(text_slot),
        });
        self.write_csv(SCRIPT_RECORDS_FILE, &["voice", "speaker", "text"], rows)
    }

    /// 写出语音对齐表（CSV 与 JSON 两份）
    pub fn write_voice_text(&self, samples: &[AlignedSample]) -> Result<(PathBuf, PathBuf)> {
        let csv_path = self.write_csv(
            VOICE_TEXT_CSV_FILE,
            &["voice_id", "speaker", "text", "audio_path"],
            samples.iter(),
        )?;
        let json_path = self.write_json(VOICE_TEXT_JSON_FILE, samples)?;
        Ok((csv_path, json_path))
    }

    /// 写出 JSON（两空格缩进，非 ASCII 字符原样输出）
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        let mut writer = create_file(&path)?;
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("写入失败: {:?}", path))?;
        writer.flush().with_context(|| format!("写入失败: {:?}", path))?;
        Ok(path)
    }

    fn write_csv<R: Serialize>(
        &self,
        name: &str,
        header: &[&str],
        rows: impl IntoIterator<Item = R>,
    ) -> Result<PathBuf> {
        let path = self.path(name);
        let mut file = create_file(&path)?;
        if self.csv_bom {
            file.write_all(UTF8_BOM)?;
        }

        // 表头单独写出，空表也有表头
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().with_context(|| format!("写入失败: {:?}", path))?;
        Ok(path)
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("无法创建文件: {:?}", path))?;
    Ok(BufWriter::new(file))
}
