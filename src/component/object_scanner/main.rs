use super::checkpoint_log::{CheckpointLog, LogMode};
use super::clip_exporter::{ClipExporter, ClipSink, ExportOptions, FfmpegClipSink};
use super::clip_normalizer::{ClipNormalizer, DimensionProbe, Transcoder};
use super::detection::Detector;
use super::ffmpeg_tools::Ffmpeg;
use super::frame_source::{FfmpegFrameSource, FrameSource};
use super::merge::{Concatenator, MERGE_LIST_NAME, MergeOrchestrator};
use super::video_processor::{ProcessorOptions, VideoOutcome, VideoProcessor};
use crate::config::{ResumeMode, ScanSettings};
use crate::tools::terminal::{KeySource, PauseControl, TerminalKeys};
use crate::tools::{BATCH_TEMPLATE, new_progress_bar, scan_video_files, validate_directory_exists};
use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::MultiProgress;
use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 影格來源、偵測器與外部工具
pub struct Backends {
    pub frame_source: Box<dyn FrameSource>,
    pub detector: Box<dyn Detector>,
    pub clip_sink: Box<dyn ClipSink>,
    pub keys: Box<dyn KeySource>,
    pub transcoder: Box<dyn Transcoder>,
    pub probe: Box<dyn DimensionProbe>,
    pub concatenator: Box<dyn Concatenator>,
}

impl Backends {
    /// ffmpeg 解碼／編碼，搭配指定的偵測器
    #[must_use]
    pub fn ffmpeg(detector: Box<dyn Detector>) -> Self {
        Self {
            frame_source: Box::new(FfmpegFrameSource),
            detector,
            clip_sink: Box::new(FfmpegClipSink),
            keys: Box::new(TerminalKeys::new()),
            transcoder: Box::new(Ffmpeg),
            probe: Box::new(Ffmpeg),
            concatenator: Box::new(Ffmpeg),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub discovered: usize,
    pub skipped_by_resume: usize,
    pub processed: usize,
    pub without_detections: usize,
    pub open_failures: usize,
    pub detector_failures: usize,
    pub scenes: usize,
    pub clips_exported: usize,
    pub failed_exports: usize,
    pub interrupted: bool,
    pub merged_output: Option<PathBuf>,
}

/// 決定紀錄檔要續跑還是重新開始
///
/// 紀錄檔不存在或是空的就直接重新開始；`Ask` 時由 `prompt` 決定。
pub fn resolve_log_mode(
    mode: ResumeMode,
    log_path: &Path,
    prompt: impl FnOnce() -> Result<bool>,
) -> Result<LogMode> {
    let has_log = fs::metadata(log_path).is_ok_and(|m| m.len() > 0);
    if !has_log {
        return Ok(LogMode::Truncate);
    }

    let resume = match mode {
        ResumeMode::Resume => true,
        ResumeMode::Restart => false,
        ResumeMode::Ask => prompt()?,
    };
    Ok(if resume {
        LogMode::Append
    } else {
        LogMode::Truncate
    })
}

/// 有終端機才詢問，否則預設續跑
fn prompt_resume(log_path: &Path) -> Result<bool> {
    if !io::stdin().is_terminal() {
        info!("非互動模式，從紀錄檔續跑");
        return Ok(true);
    }
    let resume = Confirm::new()
        .with_prompt(format!(
            "發現紀錄檔 {}，要從上次中斷處繼續嗎？",
            log_path.display()
        ))
        .default(true)
        .interact()?;
    Ok(resume)
}

pub struct ObjectScanner {
    settings: ScanSettings,
    shutdown_signal: Arc<AtomicBool>,
}

impl ObjectScanner {
    pub const fn new(settings: ScanSettings, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            settings,
            shutdown_signal,
        }
    }

    fn say(&self, message: impl std::fmt::Display) {
        self.say_to(&mut io::stdout().lock(), message);
    }

    /// quiet 模式下不輸出任何訊息，只保留進度條
    fn say_to(&self, out: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.settings.is_quiet() {
            let _ = writeln!(out, "{message}");
        }
    }

    fn report_interrupted(&self, out: &mut dyn Write, log_path: &Path) {
        self.say_to(
            out,
            style(format!("已中斷，紀錄檔已保存: {}", log_path.display())).yellow(),
        );
        warn!("批次處理被中斷，略過合併");
    }

    pub fn run(&self, root: &Path, backends: Backends) -> Result<BatchSummary> {
        self.settings.validate()?;
        validate_directory_exists(root)?;

        self.say(style("=== 物件場景掃描 ===").cyan().bold());
        self.say(style("掃描影片檔案中...").dim());
        let videos = scan_video_files(root)?;

        let mut summary = BatchSummary {
            discovered: videos.len(),
            ..BatchSummary::default()
        };
        if videos.is_empty() {
            self.say(style("找不到任何影片檔案").yellow());
            return Ok(summary);
        }

        let log_path = &self.settings.log_path;
        let mode = resolve_log_mode(self.settings.resume, log_path, || {
            prompt_resume(log_path)
        })?;
        let processed: HashSet<String> = match mode {
            LogMode::Append => CheckpointLog::load_processed(log_path)?,
            LogMode::Truncate => HashSet::new(),
        };
        let queue: Vec<&PathBuf> = videos
            .iter()
            .filter(|v| !processed.contains(&*v.to_string_lossy()))
            .collect();
        summary.skipped_by_resume = videos.len() - queue.len();

        self.say(
            style(format!(
                "找到 {} 支影片，{} 支已處理過，待處理 {} 支",
                videos.len(),
                summary.skipped_by_resume,
                queue.len()
            ))
            .green(),
        );

        let mut log = CheckpointLog::open(log_path, mode)?;
        let Backends {
            frame_source,
            detector,
            clip_sink,
            keys,
            transcoder,
            probe,
            concatenator,
        } = backends;

        let exporter = self.settings.export.then(|| {
            ClipExporter::new(
                clip_sink,
                ExportOptions {
                    export_dir: self.settings.export_dir.clone(),
                    overlay: self.settings.overlay.clone(),
                    draw_boxes: self.settings.draw_boxes,
                    request: ProcessorOptions::from(&self.settings).request,
                },
            )
        });

        let multi = MultiProgress::new();
        let mut processor = VideoProcessor::new(
            frame_source,
            detector,
            exporter,
            PauseControl::new(keys),
            ProcessorOptions::from(&self.settings),
            Arc::clone(&self.shutdown_signal),
        )
        .with_progress(multi.clone());

        let batch = multi.add(new_progress_bar(queue.len() as u64, BATCH_TEMPLATE));
        let mut clip_paths = Vec::new();

        for video in queue {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                summary.interrupted = true;
                break;
            }

            let name = video
                .file_name()
                .map_or_else(|| video.to_string_lossy(), |n| n.to_string_lossy())
                .to_string();
            batch.set_message(name.clone());

            let outcome = processor.process(video, &mut log)?;
            let line = match outcome {
                VideoOutcome::Logged {
                    scenes,
                    clips,
                    failed_exports,
                } => {
                    summary.processed += 1;
                    summary.scenes += scenes.len();
                    summary.clips_exported += clips.len();
                    summary.failed_exports += failed_exports;
                    clip_paths.extend(clips.into_iter().map(|c| c.path));
                    if scenes.is_empty() {
                        summary.without_detections += 1;
                        format!("  {} {name}: 沒有偵測到目標", style("-").dim())
                    } else {
                        format!(
                            "  {} {name}: {} 個場景",
                            style("✓").green(),
                            scenes.len()
                        )
                    }
                }
                VideoOutcome::OpenFailed => {
                    summary.open_failures += 1;
                    format!("  {} {name}: 無法開啟", style("✗").red())
                }
                VideoOutcome::DetectorFailed => {
                    summary.detector_failures += 1;
                    format!("  {} {name}: 偵測器錯誤", style("✗").red())
                }
                VideoOutcome::Interrupted => {
                    summary.interrupted = true;
                    break;
                }
            };

            if !self.settings.is_quiet() {
                multi.suspend(|| println!("{line}"));
            }
            batch.inc(1);
        }

        if summary.interrupted {
            batch.abandon_with_message("已中斷");
        } else {
            batch.finish_and_clear();
        }
        drop(processor);

        self.print_summary(&summary);

        if summary.interrupted {
            self.report_interrupted(&mut io::stdout().lock(), log.path());
            return Ok(summary);
        }

        if self.settings.merge {
            summary.merged_output = self
                .merge(&clip_paths, transcoder.as_ref(), probe.as_ref(), concatenator.as_ref())
                .context("合併精華影片失敗")?;
        }

        Ok(summary)
    }

    fn merge(
        &self,
        clips: &[PathBuf],
        transcoder: &dyn Transcoder,
        probe: &dyn DimensionProbe,
        concatenator: &dyn Concatenator,
    ) -> Result<Option<PathBuf>> {
        if clips.is_empty() {
            self.say(style("沒有輸出任何片段，略過合併").yellow());
            return Ok(None);
        }

        self.say(style(format!("正規化 {} 個片段...", clips.len())).cyan());
        let export_dir = &self.settings.export_dir;
        let report = ClipNormalizer::new(transcoder, probe, self.settings.failure_policy)
            .normalize_all(clips, self.settings.merge_target, export_dir)?;
        if let Some(target) = report.target {
            self.say(format!("  目標解析度: {target}"));
        }
        if !report.skipped.is_empty() {
            self.say(style(format!("  略過 {} 個正規化失敗的片段", report.skipped.len())).yellow());
        }
        if report.fallback_count() > 0 {
            self.say(
                style(format!(
                    "  {} 個片段正規化失敗，改用原始片段",
                    report.fallback_count()
                ))
                .yellow(),
            );
        }

        self.say(style("合併中...").cyan());
        let merged = MergeOrchestrator::new(concatenator).merge(
            &report.paths(),
            &export_dir.join(MERGE_LIST_NAME),
            &self.settings.merge_output,
        )?;
        if let Some(output) = &merged {
            self.say(style(format!("精華影片: {}", output.display())).green().bold());
        }
        Ok(merged)
    }

    fn print_summary(&self, summary: &BatchSummary) {
        info!(
            "批次完成 - 處理: {}, 略過: {}, 無偵測: {}, 開啟失敗: {}, 偵測器錯誤: {}, 片段: {}",
            summary.processed,
            summary.skipped_by_resume,
            summary.without_detections,
            summary.open_failures,
            summary.detector_failures,
            summary.clips_exported
        );
        if self.settings.is_quiet() {
            return;
        }

        println!();
        println!("{}", style("=== 掃描摘要 ===").cyan().bold());
        println!("  找到影片: {} 支", summary.discovered);
        println!("  續跑略過: {} 支", summary.skipped_by_resume);
        println!("  已處理: {} 支", style(summary.processed).green());
        println!("  沒有偵測: {} 支", summary.without_detections);
        println!("  場景: {} 個", summary.scenes);
        if self.settings.export {
            println!("  輸出片段: {} 個", style(summary.clips_exported).green());
        }
        if summary.failed_exports > 0 {
            println!("  片段輸出失敗: {} 個", style(summary.failed_exports).red());
        }
        if summary.open_failures > 0 {
            println!("  無法開啟: {} 支", style(summary.open_failures).red());
        }
        if summary.detector_failures > 0 {
            println!("  偵測器錯誤: {} 支", style(summary.detector_failures).red());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use anyhow::bail;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_log_mode_without_log_starts_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("log.txt");

        let mode = resolve_log_mode(ResumeMode::Ask, &log_path, || bail!("不應詢問")).unwrap();
        assert_eq!(mode, LogMode::Truncate);

        fs::write(&log_path, "").unwrap();
        let mode = resolve_log_mode(ResumeMode::Resume, &log_path, || Ok(true)).unwrap();
        assert_eq!(mode, LogMode::Truncate);
    }

    #[test]
    fn test_resolve_log_mode_with_existing_log() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("log.txt");
        fs::write(&log_path, "/videos/a.mp4: -\n").unwrap();

        assert_eq!(
            resolve_log_mode(ResumeMode::Resume, &log_path, || bail!("不應詢問")).unwrap(),
            LogMode::Append
        );
        assert_eq!(
            resolve_log_mode(ResumeMode::Restart, &log_path, || bail!("不應詢問")).unwrap(),
            LogMode::Truncate
        );
        assert_eq!(
            resolve_log_mode(ResumeMode::Ask, &log_path, || Ok(false)).unwrap(),
            LogMode::Truncate
        );
        assert_eq!(
            resolve_log_mode(ResumeMode::Ask, &log_path, || Ok(true)).unwrap(),
            LogMode::Append
        );
    }

    #[test]
    fn test_interrupt_notice_respects_quiet() {
        let log_path = Path::new("/tmp/objekt_log.txt");

        let quiet = ObjectScanner::new(
            ScanSettings {
                verbosity: Verbosity::Quiet,
                ..ScanSettings::default()
            },
            Arc::new(AtomicBool::new(true)),
        );
        let mut out = Vec::new();
        quiet.report_interrupted(&mut out, log_path);
        assert!(out.is_empty());

        let normal = ObjectScanner::new(ScanSettings::default(), Arc::new(AtomicBool::new(true)));
        let mut out = Vec::new();
        normal.report_interrupted(&mut out, log_path);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("已中斷"));
        assert!(text.contains("objekt_log.txt"));
    }
}
