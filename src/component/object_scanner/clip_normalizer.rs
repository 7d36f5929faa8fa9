//! 將片段統一成相同解析度，供串流複製合併使用
//!
//! 先等比縮放到目標尺寸內，再置中補黑邊，不裁切。

use crate::config::{FailurePolicy, Resolution};
use crate::error::MediaResult;
use crate::tools::ensure_directory_exists;
use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

pub const NORMALIZED_DIR: &str = "normalized";

pub trait DimensionProbe {
    fn dimensions(&self, clip: &Path) -> MediaResult<Resolution>;
}

pub trait Transcoder {
    /// 將 `source` 轉成 `target` 解析度並寫到 `destination`
    fn normalize(&self, source: &Path, destination: &Path, target: Resolution) -> MediaResult<()>;
}

/// 決定合併目標解析度
///
/// 有指定就直接使用；否則取像素面積最大的片段，面積相同時保留先出現者。
/// 無法取得尺寸的片段不參與比較，全部都失敗時回傳 `None`。
pub fn select_target(
    explicit: Option<Resolution>,
    clips: &[PathBuf],
    probe: &dyn DimensionProbe,
) -> Option<Resolution> {
    if explicit.is_some() {
        return explicit;
    }

    let mut best: Option<Resolution> = None;
    for clip in clips {
        match probe.dimensions(clip) {
            Ok(size) => {
                if best.is_none_or(|current| size.area() > current.area()) {
                    best = Some(size);
                }
            }
            Err(e) => warn!("無法取得片段尺寸，不列入目標解析度計算: {e}"),
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedClip {
    Normalized(PathBuf),
    /// 轉檔失敗，改用原始片段
    Fallback(PathBuf),
}

impl NormalizedClip {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Normalized(path) | Self::Fallback(path) => path,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizationReport {
    pub target: Option<Resolution>,
    pub clips: Vec<NormalizedClip>,
    pub skipped: Vec<PathBuf>,
}

impl NormalizationReport {
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.clips.iter().map(|c| c.path().to_path_buf()).collect()
    }

    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.clips
            .iter()
            .filter(|c| matches!(c, NormalizedClip::Fallback(_)))
            .count()
    }
}

pub struct ClipNormalizer<'a> {
    transcoder: &'a dyn Transcoder,
    probe: &'a dyn DimensionProbe,
    policy: FailurePolicy,
}

impl<'a> ClipNormalizer<'a> {
    #[must_use]
    pub fn new(
        transcoder: &'a dyn Transcoder,
        probe: &'a dyn DimensionProbe,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            transcoder,
            probe,
            policy,
        }
    }

    /// 逐一轉檔到 `<output_dir>/normalized/norm_<序號>.mp4`
    pub fn normalize_all(
        &self,
        clips: &[PathBuf],
        explicit_target: Option<Resolution>,
        output_dir: &Path,
    ) -> Result<NormalizationReport> {
        let Some(target) = select_target(explicit_target, clips, self.probe) else {
            warn!("沒有可用的片段尺寸，略過正規化");
            return Ok(NormalizationReport {
                target: None,
                clips: clips.iter().cloned().map(NormalizedClip::Fallback).collect(),
                skipped: Vec::new(),
            });
        };
        info!("正規化 {} 個片段到 {target}", clips.len());

        let normalized_dir = output_dir.join(NORMALIZED_DIR);
        ensure_directory_exists(&normalized_dir)?;

        let mut report = NormalizationReport {
            target: Some(target),
            ..NormalizationReport::default()
        };

        for (index, clip) in clips.iter().enumerate() {
            let destination = normalized_dir.join(format!("norm_{index:03}.mp4"));
            match self.transcoder.normalize(clip, &destination, target) {
                Ok(()) => {
                    debug!("{} → {}", clip.display(), destination.display());
                    report.clips.push(NormalizedClip::Normalized(destination));
                }
                Err(e) => match self.policy {
                    FailurePolicy::Skip => {
                        warn!("正規化失敗，略過片段: {e}");
                        report.skipped.push(clip.clone());
                    }
                    FailurePolicy::FallbackOriginal => {
                        warn!("正規化失敗，改用原始片段（合併可能因參數不一致而失敗）: {e}");
                        report.clips.push(NormalizedClip::Fallback(clip.clone()));
                    }
                },
            }
        }

        Ok(report)
    }
}
