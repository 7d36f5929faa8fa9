//! 單支影片的處理流程
//!
//! 開啟 → 掃描（可暫停）→ 分段 → 輸出片段 → 寫入紀錄。
//! 開啟失敗直接記錄為 `-`；中斷時不寫入這支影片的紀錄。

use super::checkpoint_log::CheckpointLog;
use super::clip_exporter::{Clip, ClipExporter, ClipWindow};
use super::detection::{DetectionEvent, DetectionRequest, Detector};
use super::frame_source::{FrameSource, MAX_CONSECUTIVE_READ_FAILURES, frame_timestamp};
use super::scene_segmenter::{Scene, segment_scenes};
use crate::config::ScanSettings;
use crate::error::MediaResult;
use crate::tools::terminal::{ControlSignal, PAUSE_KEY, PAUSE_POLL_INTERVAL, PauseControl};
use crate::tools::{FRAME_TEMPLATE, new_progress_bar};
use anyhow::Result;
use indicatif::MultiProgress;
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[derive(Debug)]
pub enum VideoOutcome {
    /// 已寫入紀錄（可能沒有任何場景）
    Logged {
        scenes: Vec<Scene>,
        clips: Vec<Clip>,
        failed_exports: usize,
    },
    /// 無法開啟，已記錄為 `-`
    OpenFailed,
    /// 收到中斷，沒有寫入紀錄
    Interrupted,
    /// 偵測器錯誤，沒有寫入紀錄，下次續跑會重新處理
    DetectorFailed,
}

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub request: DetectionRequest,
    pub cluster_gap: f64,
    pub pre_padding: f64,
    pub post_padding: f64,
}

impl From<&ScanSettings> for ProcessorOptions {
    fn from(settings: &ScanSettings) -> Self {
        Self {
            request: DetectionRequest {
                classes: settings.classes.clone(),
                confidence: settings.confidence,
            },
            cluster_gap: settings.cluster_gap,
            pre_padding: settings.pre_padding,
            post_padding: settings.post_padding,
        }
    }
}

enum ScanEnd {
    Finished(Vec<DetectionEvent>),
    Interrupted,
    DetectorFailed(anyhow::Error),
}

/// 字幕內容：`<檔名> | <標籤, ...>`
#[must_use]
pub fn scene_caption(video_path: &Path, labels: &BTreeSet<String>) -> String {
    let name = video_path
        .file_name()
        .map_or_else(|| video_path.to_string_lossy(), |n| n.to_string_lossy());
    format!(
        "{name} | {}",
        labels.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    )
}

pub struct VideoProcessor {
    frame_source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    exporter: Option<ClipExporter>,
    pause: PauseControl,
    options: ProcessorOptions,
    shutdown_signal: Arc<AtomicBool>,
    progress: MultiProgress,
}

impl VideoProcessor {
    #[must_use]
    pub fn new(
        frame_source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        exporter: Option<ClipExporter>,
        pause: PauseControl,
        options: ProcessorOptions,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            frame_source,
            detector,
            exporter,
            pause,
            options,
            shutdown_signal,
            progress: MultiProgress::new(),
        }
    }

    /// 影格進度條加到批次進度條下方
    #[must_use]
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }

    pub fn process(&mut self, video_path: &Path, log: &mut CheckpointLog) -> Result<VideoOutcome> {
        let key = video_path.to_string_lossy().to_string();

        let scan = self.scan(video_path);
        // 輸出片段與印出訊息前先還原終端機
        self.pause.release();

        let events = match scan {
            Err(e) => {
                warn!("{e}");
                log.append(&key, &[])?;
                return Ok(VideoOutcome::OpenFailed);
            }
            Ok(ScanEnd::Interrupted) => return Ok(VideoOutcome::Interrupted),
            Ok(ScanEnd::DetectorFailed(e)) => {
                error!("偵測器錯誤，放棄影片 {}: {e:#}", video_path.display());
                return Ok(VideoOutcome::DetectorFailed);
            }
            Ok(ScanEnd::Finished(events)) => events,
        };

        let scenes = segment_scenes(&events, self.options.cluster_gap);
        info!(
            "{}: {} 個偵測影格，{} 個場景",
            video_path.display(),
            events.len(),
            scenes.len()
        );

        let mut clips = Vec::new();
        let mut failed_exports = 0;
        if let Some(exporter) = self.exporter.as_mut() {
            for scene in &scenes {
                let (start, end) =
                    scene.padded_window(self.options.pre_padding, self.options.post_padding);
                let caption = scene_caption(video_path, &scene.labels);

                match exporter.export(
                    self.frame_source.as_ref(),
                    self.detector.as_mut(),
                    video_path,
                    ClipWindow { start, end },
                    &caption,
                    &self.shutdown_signal,
                ) {
                    Ok(clip) => clips.push(clip),
                    Err(e) => {
                        warn!("片段輸出失敗，略過此場景: {e}");
                        failed_exports += 1;
                    }
                }

                if self.shutdown_signal.load(Ordering::SeqCst) {
                    return Ok(VideoOutcome::Interrupted);
                }
            }
        }

        log.append(&key, &scenes)?;

        Ok(VideoOutcome::Logged {
            scenes,
            clips,
            failed_exports,
        })
    }

    fn scan(&mut self, video_path: &Path) -> MediaResult<ScanEnd> {
        let mut reader = self.frame_source.open(video_path, 0.0)?;
        let info = reader.info().clone();
        let progress = self
            .progress
            .add(new_progress_bar(info.frame_count, FRAME_TEMPLATE));
        progress.set_message(format!("按 {PAUSE_KEY} 暫停"));

        let mut events = Vec::new();
        let mut failures = 0;

        loop {
            match self.pause.step() {
                Some(ControlSignal::TogglePause) => {
                    if self.pause.is_paused() {
                        progress.set_message(format!("已暫停，按 {PAUSE_KEY} 繼續"));
                    } else {
                        progress.set_message(format!("按 {PAUSE_KEY} 暫停"));
                    }
                }
                Some(ControlSignal::Interrupt) => self.shutdown_signal.store(true, Ordering::SeqCst),
                None => {}
            }

            if self.is_shutdown() {
                progress.abandon_with_message("已中斷");
                self.progress.remove(&progress);
                return Ok(ScanEnd::Interrupted);
            }
            if self.pause.is_paused() {
                thread::sleep(PAUSE_POLL_INTERVAL);
                continue;
            }

            match reader.read_frame() {
                Ok(Some(frame)) => {
                    failures = 0;
                    let detections = match self.detector.detect(&frame, &self.options.request) {
                        Ok(detections) => detections,
                        Err(e) => {
                            progress.abandon_with_message("偵測器錯誤");
                            self.progress.remove(&progress);
                            return Ok(ScanEnd::DetectorFailed(e));
                        }
                    };
                    let timestamp = frame_timestamp(frame.index, info.frame_rate);
                    if let Some(event) = DetectionEvent::from_detections(timestamp, &detections) {
                        debug!("{timestamp:.2}s: {:?}", event.labels);
                        events.push(event);
                    }
                    progress.inc(1);
                }
                Ok(None) => break,
                Err(e) => {
                    failures += 1;
                    warn!("讀取影格失敗 ({failures}/{MAX_CONSECUTIVE_READ_FAILURES}): {e}");
                    if failures > MAX_CONSECUTIVE_READ_FAILURES {
                        warn!("連續讀取失敗，視為影片結束: {}", video_path.display());
                        break;
                    }
                }
            }
        }

        progress.finish_and_clear();
        self.progress.remove(&progress);
        Ok(ScanEnd::Finished(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::object_scanner::checkpoint_log::LogMode;
    use crate::component::object_scanner::detection::{BoundingBox, Detection, class_name};
    use crate::component::object_scanner::frame_source::{Frame, FrameReader};
    use crate::error::MediaError;
    use crate::tools::VideoInfo;
    use crate::tools::terminal::{KeyInput, KeySource, NoKeys};
    use image::RgbImage;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Ok,
        Fail,
    }

    /// 依腳本回傳影格或失敗，並記錄 `read_frame` 的呼叫次數
    struct ScriptedSource {
        script: Vec<Step>,
        reads: Rc<Cell<usize>>,
    }

    struct ScriptedReader {
        info: VideoInfo,
        script: VecDeque<Step>,
        next_index: u64,
        reads: Rc<Cell<usize>>,
    }

    impl FrameSource for ScriptedSource {
        fn open(&self, _path: &Path, _start_seconds: f64) -> MediaResult<Box<dyn FrameReader>> {
            Ok(Box::new(ScriptedReader {
                info: VideoInfo {
                    duration_seconds: self.script.len() as f64,
                    width: 4,
                    height: 4,
                    frame_rate: 1.0,
                    frame_count: self.script.len() as u64,
                },
                script: self.script.iter().copied().collect(),
                next_index: 0,
                reads: Rc::clone(&self.reads),
            }))
        }
    }

    impl FrameReader for ScriptedReader {
        fn info(&self) -> &VideoInfo {
            &self.info
        }

        fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
            self.reads.set(self.reads.get() + 1);
            match self.script.pop_front() {
                None => Ok(None),
                Some(Step::Fail) => Err(MediaError::FrameRead("模擬失敗".to_string())),
                Some(Step::Ok) => {
                    let index = self.next_index;
                    self.next_index += 1;
                    Ok(Some(Frame {
                        index,
                        image: RgbImage::new(4, 4),
                    }))
                }
            }
        }
    }

    /// 每一格都偵測到 person
    struct AlwaysPerson;

    impl Detector for AlwaysPerson {
        fn detect(&mut self, _frame: &Frame, _request: &DetectionRequest) -> Result<Vec<Detection>> {
            Ok(vec![Detection {
                class_id: 0,
                label: class_name(0),
                confidence: 0.9,
                bbox: BoundingBox {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 2.0,
                    y2: 2.0,
                },
            }])
        }
    }

    /// 依腳本回傳按鍵，並記下每次輪詢時已讀取的影格數
    struct ScriptedKeys {
        script: VecDeque<Option<KeyInput>>,
        reads: Rc<Cell<usize>>,
        polled_at: Rc<RefCell<Vec<usize>>>,
    }

    impl KeySource for ScriptedKeys {
        fn poll_key(&mut self) -> Option<KeyInput> {
            self.polled_at.borrow_mut().push(self.reads.get());
            self.script.pop_front().flatten()
        }
    }

    fn scan_scenes(
        script: Vec<Step>,
        keys: Box<dyn KeySource>,
        reads: &Rc<Cell<usize>>,
    ) -> Vec<(f64, f64)> {
        let temp_dir = TempDir::new().unwrap();
        let mut log = CheckpointLog::open(&temp_dir.path().join("log.txt"), LogMode::Truncate).unwrap();
        let options = ProcessorOptions::from(&ScanSettings {
            classes: vec![0],
            cluster_gap: 5.0,
            pre_padding: 0.0,
            post_padding: 0.0,
            ..ScanSettings::default()
        });
        let mut processor = VideoProcessor::new(
            Box::new(ScriptedSource {
                script,
                reads: Rc::clone(reads),
            }),
            Box::new(AlwaysPerson),
            None,
            PauseControl::new(keys),
            options,
            Arc::new(AtomicBool::new(false)),
        );

        match processor.process(Path::new("/videos/a.mp4"), &mut log).unwrap() {
            VideoOutcome::Logged { scenes, .. } => scenes.iter().map(|s| (s.start, s.end)).collect(),
            other => panic!("預期寫入紀錄，實際為 {other:?}"),
        }
    }

    #[test]
    fn test_scan_tolerates_two_read_failures() {
        let reads = Rc::new(Cell::new(0));
        let scenes = scan_scenes(
            vec![Step::Ok, Step::Fail, Step::Fail, Step::Ok, Step::Ok],
            Box::new(NoKeys),
            &reads,
        );
        assert_eq!(scenes, vec![(0.0, 2.0)]);
        assert_eq!(reads.get(), 6);
    }

    #[test]
    fn test_scan_ends_on_third_read_failure() {
        let reads = Rc::new(Cell::new(0));
        let scenes = scan_scenes(
            vec![Step::Ok, Step::Fail, Step::Fail, Step::Fail, Step::Ok, Step::Ok],
            Box::new(NoKeys),
            &reads,
        );
        assert_eq!(scenes, vec![(0.0, 0.0)]);
        assert_eq!(reads.get(), 4);
    }

    #[test]
    fn test_paused_scan_reads_no_frames() {
        let reads = Rc::new(Cell::new(0));
        let polled_at = Rc::new(RefCell::new(Vec::new()));
        let keys = ScriptedKeys {
            script: VecDeque::from([
                Some(KeyInput::Char(PAUSE_KEY)),
                None,
                None,
                Some(KeyInput::Char(PAUSE_KEY)),
            ]),
            reads: Rc::clone(&reads),
            polled_at: Rc::clone(&polled_at),
        };

        let scenes = scan_scenes(vec![Step::Ok; 3], Box::new(keys), &reads);

        assert_eq!(scenes, vec![(0.0, 2.0)]);
        // 3 格加上結尾的 None
        assert_eq!(reads.get(), 4);
        assert_eq!(polled_at.borrow()[..5], [0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_scene_caption() {
        let labels: BTreeSet<String> = ["person", "dog"].iter().map(|s| (*s).to_string()).collect();
        assert_eq!(
            scene_caption(Path::new("/videos/walk.mp4"), &labels),
            "walk.mp4 | dog, person"
        );
    }

    #[test]
    fn test_options_from_settings() {
        let settings = ScanSettings {
            classes: vec![0, 16],
            confidence: 0.4,
            cluster_gap: 2.0,
            pre_padding: 1.0,
            post_padding: 1.5,
            ..ScanSettings::default()
        };
        let options = ProcessorOptions::from(&settings);
        assert_eq!(options.request.classes, vec![0, 16]);
        assert!((options.request.confidence - 0.4).abs() < f32::EPSILON);
        assert!((options.post_padding - 1.5).abs() < f64::EPSILON);
    }
}
