//! 逐影片紀錄檔
//!
//! 每處理完一支影片就寫入一行 `<路徑>: <內容>` 並立即同步到磁碟，
//! 內容為各場景起點 `MM:SS`（以 `, ` 分隔），沒有偵測時為 `-`。
//! 續跑時只看每行 `": "` 之前的路徑，不解析內容。
//!
//! 路徑本身若含有 `": "`，續跑比對會有歧義，這是已知限制。

use super::scene_segmenter::Scene;
use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const PATH_SEPARATOR: &str = ": ";
pub const NO_DETECTION_MARKER: &str = "-";
const ENTRY_SEPARATOR: &str = ", ";

static TIMESTAMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,}:\d{2}$").expect("時間格式的正規表示式無效"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// 續跑：保留原有內容，附加在後面
    Append,
    /// 重新開始：清空紀錄檔
    Truncate,
}

pub struct CheckpointLog {
    path: PathBuf,
    file: File,
    written: HashSet<String>,
}

impl CheckpointLog {
    /// 讀取已處理過的影片路徑，同一路徑出現多次只算一次
    pub fn load_processed(path: &Path) -> Result<HashSet<String>> {
        if !path.exists() {
            return Ok(HashSet::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("無法讀取紀錄檔: {}", path.display()))?;

        let processed: HashSet<String> = content
            .lines()
            .filter_map(parse_line)
            .map(|(video_path, _)| video_path.to_string())
            .collect();

        debug!("紀錄檔中有 {} 支已處理影片", processed.len());
        Ok(processed)
    }

    pub fn open(path: &Path, mode: LogMode) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("無法建立目錄: {}", parent.display()))?;
        }

        let mut options = OpenOptions::new();
        match mode {
            LogMode::Append => options.create(true).append(true),
            LogMode::Truncate => options.create(true).write(true).truncate(true),
        };
        let file = options
            .open(path)
            .with_context(|| format!("無法開啟紀錄檔: {}", path.display()))?;

        info!("開啟紀錄檔 ({mode:?}): {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: HashSet::new(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 寫入一支影片的結果
    ///
    /// 整行一次寫入並同步，中斷時不會留下半行。
    /// 同一次執行中重複的路徑會被忽略。
    pub fn append(&mut self, video_path: &str, scenes: &[Scene]) -> Result<bool> {
        if self.written.contains(video_path) {
            debug!("紀錄已存在，略過: {video_path}");
            return Ok(false);
        }

        let line = format_line(video_path, scenes);
        self.file
            .write_all(line.as_bytes())
            .with_context(|| format!("無法寫入紀錄檔: {}", self.path.display()))?;
        self.file.flush()?;
        self.file
            .sync_data()
            .with_context(|| format!("無法同步紀錄檔: {}", self.path.display()))?;

        self.written.insert(video_path.to_string());
        Ok(true)
    }
}

/// `MM:SS`，分與秒皆無條件捨去
#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[must_use]
pub fn format_entry(scenes: &[Scene]) -> String {
    if scenes.is_empty() {
        return NO_DETECTION_MARKER.to_string();
    }
    scenes
        .iter()
        .map(|scene| format_timestamp(scene.start))
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

#[must_use]
pub fn format_line(video_path: &str, scenes: &[Scene]) -> String {
    format!("{video_path}{PATH_SEPARATOR}{}\n", format_entry(scenes))
}

/// 以第一個 `": "` 切開路徑與內容
#[must_use]
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    line.split_once(PATH_SEPARATOR)
}

/// 取回紀錄內容中的 `MM:SS` 時間點，`-` 表示沒有
#[must_use]
pub fn parse_entry(entry: &str) -> Vec<String> {
    entry
        .split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|part| TIMESTAMP_PATTERN.is_match(part))
        .map(str::to_string)
        .collect()
}
