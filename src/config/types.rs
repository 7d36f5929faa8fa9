use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_LOG_PATH: &str = "objekt_log.txt";
pub const DEFAULT_EXPORT_DIR: &str = "export";
pub const DEFAULT_MERGE_OUTPUT: &str = "highlights.mp4";
pub const DEFAULT_CLUSTER_GAP: f64 = 5.0;
pub const DEFAULT_PADDING: f64 = 3.0;
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_OVERLAY_SCALE: f32 = 0.5;
pub const WHITE: [u8; 3] = [255, 255, 255];

/// 字幕放置位置，無法辨識的值一律視為左上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OverlayAnchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl OverlayAnchor {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tr" => Self::TopRight,
            "bl" => Self::BottomLeft,
            "br" => Self::BottomRight,
            _ => Self::TopLeft,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TopLeft => "tl",
            Self::TopRight => "tr",
            Self::BottomLeft => "bl",
            Self::BottomRight => "br",
        }
    }
}

impl From<String> for OverlayAnchor {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<OverlayAnchor> for String {
    fn from(anchor: OverlayAnchor) -> Self {
        anchor.code().to_string()
    }
}

/// 單一片段轉檔失敗時的處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// 從合併清單中移除
    Skip,
    /// 改用原始（未正規化）片段，合併時可能因參數不一致而失敗
    #[default]
    FallbackOriginal,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fallback-original" | "fallback" => Ok(Self::FallbackOriginal),
            other => bail!("未知的失敗處理方式: {other}（可用: skip, fallback-original）"),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::FallbackOriginal => write!(f, "fallback-original"),
        }
    }
}

/// 已有紀錄檔時的處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumeMode {
    /// 互動式詢問；沒有終端機時視為 Resume
    #[default]
    Ask,
    Resume,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    /// 解析 `1280x720` 格式
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .to_lowercase()
            .split_once('x')
            .map(|(w, h)| (w.trim().to_string(), h.trim().to_string()))
            .with_context(|| format!("解析度格式錯誤: {s}（例: 1280x720）"))?;
        let width: u32 = w.parse().with_context(|| format!("無效的寬度: {w}"))?;
        let height: u32 = h.parse().with_context(|| format!("無效的高度: {h}"))?;
        if width == 0 || height == 0 {
            bail!("解析度不可為 0: {s}");
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub enabled: bool,
    pub anchor: OverlayAnchor,
    pub scale: f32,
    pub color: [u8; 3],
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            anchor: OverlayAnchor::TopLeft,
            scale: DEFAULT_OVERLAY_SCALE,
            color: WHITE,
        }
    }
}

/// 掃描、輸出與合併的所有設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// 允許的物件類別 ID
    pub classes: Vec<u32>,
    pub confidence: f32,
    /// 同一場景中相鄰偵測的最大間隔（秒）
    pub cluster_gap: f64,
    pub pre_padding: f64,
    pub post_padding: f64,
    pub overlay: OverlaySettings,
    pub draw_boxes: bool,
    pub export: bool,
    pub export_dir: PathBuf,
    pub merge: bool,
    pub merge_output: PathBuf,
    pub merge_target: Option<Resolution>,
    pub failure_policy: FailurePolicy,
    pub log_path: PathBuf,
    pub resume: ResumeMode,
    pub verbosity: Verbosity,
    /// 偵測器外部程式及其參數
    pub detector_command: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            confidence: DEFAULT_CONFIDENCE,
            cluster_gap: DEFAULT_CLUSTER_GAP,
            pre_padding: DEFAULT_PADDING,
            post_padding: DEFAULT_PADDING,
            overlay: OverlaySettings::default(),
            draw_boxes: true,
            export: false,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            merge: false,
            merge_output: PathBuf::from(DEFAULT_MERGE_OUTPUT),
            merge_target: None,
            failure_policy: FailurePolicy::default(),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            resume: ResumeMode::default(),
            verbosity: Verbosity::default(),
            detector_command: Vec::new(),
        }
    }
}

impl ScanSettings {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// 檢查互相矛盾或無效的設定，任何影片處理前呼叫
    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            bail!("至少需要指定一個物件類別（--objects）");
        }
        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            bail!("信心門檻必須介於 0 與 1 之間: {}", self.confidence);
        }
        if !(self.cluster_gap > 0.0) {
            bail!("場景間隔必須大於 0: {}", self.cluster_gap);
        }
        if !(self.pre_padding >= 0.0 && self.post_padding >= 0.0) {
            bail!(
                "前後延伸秒數不可為負數: pre={}, post={}",
                self.pre_padding,
                self.post_padding
            );
        }
        if !(self.overlay.scale > 0.0) {
            bail!("字幕大小必須大於 0: {}", self.overlay.scale);
        }
        if self.merge && !self.export {
            bail!("合併需要先輸出片段，請同時啟用 --export");
        }
        Ok(())
    }
}

/// 解析 `0,1,2` 格式的類別 ID 清單
pub fn parse_class_ids(value: &str) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: u32 = part
            .parse()
            .with_context(|| format!("無效的類別 ID: {part}"))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        bail!("類別清單為空: {value}");
    }
    Ok(ids)
}

/// 解析 `r,g,b` 顏色，格式錯誤時使用白色
#[must_use]
pub fn parse_color(value: &str) -> [u8; 3] {
    let parts: Vec<u8> = value
        .split(',')
        .filter_map(|c| c.trim().parse::<u8>().ok())
        .collect();
    match parts.as_slice() {
        [r, g, b] if value.split(',').count() == 3 => [*r, *g, *b],
        _ => WHITE,
    }
}
