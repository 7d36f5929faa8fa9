//! 場景片段輸出
//!
//! 逐格讀取來源影片的指定區間，依設定畫上偵測框與字幕後交給 [`ClipSink`] 編碼。

use super::detection::{Detector, DetectionRequest};
use super::frame_source::{FrameSource, MAX_CONSECUTIVE_READ_FAILURES, frame_index_at};
use super::overlay::{draw_caption, draw_detections};
use crate::config::OverlaySettings;
use crate::error::{MediaError, MediaResult};
use crate::tools::FfmpegCommand;
use chrono::Local;
use image::RgbImage;
use log::{debug, info, warn};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

/// 已加上前後延伸的輸出區間（秒，含兩端）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub source: PathBuf,
    pub window: ClipWindow,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frames_written: u64,
    /// 讀取失敗或中斷而提早結束時為 `false`，檔案仍然保留
    pub complete: bool,
}

pub trait FrameWriter {
    fn write_frame(&mut self, image: &RgbImage) -> MediaResult<()>;

    /// 結束輸出並確認檔案完整寫入
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

pub trait ClipSink {
    fn create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> MediaResult<Box<dyn FrameWriter>>;
}

/// 把原始 RGB 影格送進 ffmpeg 編碼成 H.264
pub struct FfmpegClipSink;

impl ClipSink for FfmpegClipSink {
    fn create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> MediaResult<Box<dyn FrameWriter>> {
        let mut command = FfmpegCommand::encode_raw_frames(path, width, height, fps);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| MediaError::render(path, format!("無法啟動 ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::render(path, "無法取得 ffmpeg 輸入"))?;

        Ok(Box::new(FfmpegFrameWriter {
            path: path.to_path_buf(),
            child,
            stdin: Some(stdin),
        }))
    }
}

struct FfmpegFrameWriter {
    path: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FrameWriter for FfmpegFrameWriter {
    fn write_frame(&mut self, image: &RgbImage) -> MediaResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::render(&self.path, "輸出已關閉"))?;
        stdin
            .write_all(image.as_raw())
            .map_err(|e| MediaError::render(&self.path, e))
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        // 關閉 stdin 讓 ffmpeg 收尾
        drop(self.stdin.take());

        let mut stderr = String::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        let status = self
            .child
            .wait()
            .map_err(|e| MediaError::render(&self.path, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::render(
                &self.path,
                format!("ffmpeg 結束碼 {status}: {}", stderr.trim()),
            ))
        }
    }
}

impl Drop for FfmpegFrameWriter {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub export_dir: PathBuf,
    pub overlay: OverlaySettings,
    pub draw_boxes: bool,
    pub request: DetectionRequest,
}

pub struct ClipExporter {
    sink: Box<dyn ClipSink>,
    options: ExportOptions,
    sequence: usize,
}

impl ClipExporter {
    #[must_use]
    pub fn new(sink: Box<dyn ClipSink>, options: ExportOptions) -> Self {
        Self {
            sink,
            options,
            sequence: 0,
        }
    }

    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.options.export_dir
    }

    /// `clip_<時間>_<序號>.mp4`，序號在同一次執行中遞增
    fn next_clip_path(&mut self) -> PathBuf {
        self.sequence += 1;
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        self.options
            .export_dir
            .join(format!("clip_{stamp}_{:03}.mp4", self.sequence))
    }

    /// 輸出一個區間
    ///
    /// 無法開啟來源影片時回傳錯誤且不產生片段；連續讀取失敗超過上限、
    /// 串流提早結束或收到中斷時，已寫入的部分仍作為片段回傳。
    pub fn export(
        &mut self,
        source: &dyn FrameSource,
        detector: &mut dyn Detector,
        video_path: &Path,
        window: ClipWindow,
        caption: &str,
        shutdown_signal: &AtomicBool,
    ) -> MediaResult<Clip> {
        let mut reader = source.open(video_path, window.start)?;
        let info = reader.info().clone();
        let end_frame = frame_index_at(window.end, info.frame_rate);
        let mut frame_index = frame_index_at(window.start, info.frame_rate);

        fs::create_dir_all(&self.options.export_dir)
            .map_err(|e| MediaError::render(&self.options.export_dir, e))?;
        let path = self.next_clip_path();
        let mut writer = self
            .sink
            .create(&path, info.width, info.height, info.frame_rate)?;

        debug!(
            "輸出片段 {} [{:.2}s, {:.2}s] → {}",
            video_path.display(),
            window.start,
            window.end,
            path.display()
        );

        let mut frames_written = 0;
        let mut failures = 0;
        let mut complete = true;

        while frame_index <= end_frame {
            if shutdown_signal.load(Ordering::SeqCst) {
                complete = false;
                break;
            }

            let mut frame = match reader.read_frame() {
                Ok(Some(frame)) => {
                    failures = 0;
                    frame
                }
                Ok(None) => break,
                Err(e) => {
                    failures += 1;
                    frame_index += 1;
                    warn!("讀取影格失敗 ({failures}/{MAX_CONSECUTIVE_READ_FAILURES}): {e}");
                    if failures > MAX_CONSECUTIVE_READ_FAILURES {
                        warn!("連續讀取失敗，提早結束片段: {}", path.display());
                        complete = false;
                        break;
                    }
                    continue;
                }
            };

            if self.options.draw_boxes {
                match detector.detect(&frame, &self.options.request) {
                    Ok(detections) => draw_detections(&mut frame.image, &detections),
                    Err(e) => warn!("片段影格偵測失敗，略過偵測框: {e:#}"),
                }
            }
            if self.options.overlay.enabled {
                draw_caption(&mut frame.image, caption, &self.options.overlay);
            }

            writer.write_frame(&frame.image)?;
            frames_written += 1;
            frame_index += 1;
        }

        writer.finish()?;
        info!(
            "片段完成: {} ({frames_written} 格{})",
            path.display(),
            if complete { "" } else { "，未完整" }
        );

        Ok(Clip {
            source: video_path.to_path_buf(),
            window,
            path,
            width: info.width,
            height: info.height,
            frames_written,
            complete,
        })
    }
}
