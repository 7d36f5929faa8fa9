use super::clip_normalizer::{DimensionProbe, Transcoder};
use super::merge::Concatenator;
use crate::config::Resolution;
use crate::error::{MediaError, MediaResult};
use crate::tools::{FfmpegCommand, get_video_info};
use log::debug;
use std::path::Path;
use std::process::{Command, Output};

/// 以 ffmpeg/ffprobe 實作轉檔、合併與尺寸查詢
pub struct Ffmpeg;

fn run(mut command: Command) -> Result<(), String> {
    debug!("執行: {command:?}");
    let Output { status, stderr, .. } = command
        .output()
        .map_err(|e| format!("無法執行 ffmpeg: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!(
            "ffmpeg 結束碼 {status}: {}",
            String::from_utf8_lossy(&stderr).trim()
        ))
    }
}

impl Transcoder for Ffmpeg {
    fn normalize(&self, source: &Path, destination: &Path, target: Resolution) -> MediaResult<()> {
        run(FfmpegCommand::normalize(source, destination, target)).map_err(|reason| {
            MediaError::Transcode {
                path: source.to_path_buf(),
                reason,
            }
        })
    }
}

impl Concatenator for Ffmpeg {
    fn concat(&self, list_path: &Path, output: &Path) -> MediaResult<()> {
        run(FfmpegCommand::concat(list_path, output)).map_err(|reason| {
            MediaError::Concatenation {
                output: output.to_path_buf(),
                reason,
            }
        })
    }
}

impl DimensionProbe for Ffmpeg {
    fn dimensions(&self, clip: &Path) -> MediaResult<Resolution> {
        let info = get_video_info(clip)?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::Probe {
                path: clip.to_path_buf(),
                reason: "找不到視訊串流".to_string(),
            });
        }
        Ok(Resolution::new(info.width, info.height))
    }
}
