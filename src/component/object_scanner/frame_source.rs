use crate::error::{MediaError, MediaResult};
use crate::tools::{FfmpegCommand, VideoInfo, get_video_info};
use image::RgbImage;
use log::debug;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Stdio};

/// 連續讀取失敗的容許次數，超過就視為串流結束
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 2;

#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

/// 影格索引換算成秒數；幀率未知時一律為 0
#[must_use]
pub fn frame_timestamp(index: u64, fps: f64) -> f64 {
    if fps > 0.0 { index as f64 / fps } else { 0.0 }
}

/// 秒數換算成影格索引（無條件捨去）
#[must_use]
pub fn frame_index_at(seconds: f64, fps: f64) -> u64 {
    if fps > 0.0 && seconds > 0.0 {
        (seconds * fps).floor() as u64
    } else {
        0
    }
}

pub trait FrameReader {
    fn info(&self) -> &VideoInfo;

    /// `Ok(None)` 表示串流結束，`Err` 表示這一格暫時讀取失敗
    fn read_frame(&mut self) -> MediaResult<Option<Frame>>;
}

pub trait FrameSource {
    /// 開啟影片並定位到 `start_seconds`，第一格的索引為 `frame_index_at(start_seconds, fps)`
    ///
    /// 無法開啟屬於 [`MediaError::SourceOpen`]。
    fn open(&self, path: &Path, start_seconds: f64) -> MediaResult<Box<dyn FrameReader>>;
}

/// 以 ffmpeg 子程序解碼為 rgb24 原始影格
pub struct FfmpegFrameSource;

impl FrameSource for FfmpegFrameSource {
    fn open(&self, path: &Path, start_seconds: f64) -> MediaResult<Box<dyn FrameReader>> {
        let info = get_video_info(path).map_err(|e| MediaError::source_open(path, e))?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::source_open(path, "影片尺寸為 0"));
        }

        let start_frame = frame_index_at(start_seconds, info.frame_rate);
        let mut command =
            FfmpegCommand::decode_raw_frames(path, frame_timestamp(start_frame, info.frame_rate));
        command.stdout(Stdio::piped()).stderr(Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|e| MediaError::source_open(path, format!("無法啟動 ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::source_open(path, "無法取得 ffmpeg 輸出"))?;

        debug!(
            "開啟影片 {}: {}x{} @ {:.3} fps, 從第 {} 格開始",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            start_frame
        );

        Ok(Box::new(FfmpegFrameReader {
            child,
            stdout,
            info,
            next_index: start_frame,
        }))
    }
}

struct FfmpegFrameReader {
    child: Child,
    stdout: ChildStdout,
    info: VideoInfo,
    next_index: u64,
}

impl FrameReader for FfmpegFrameReader {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        let frame_size = self.info.width as usize * self.info.height as usize * 3;
        let mut buffer = vec![0u8; frame_size];
        let mut filled = 0;

        while filled < frame_size {
            match self.stdout.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(MediaError::FrameRead(e.to_string())),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < frame_size {
            return Err(MediaError::FrameRead(format!(
                "影格資料不完整: {filled}/{frame_size} bytes"
            )));
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .ok_or_else(|| MediaError::FrameRead("影格尺寸不符".to_string()))?;
        let frame = Frame {
            index: self.next_index,
            image,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
