//! 物件場景掃描元件
//!
//! 逐格偵測指定物件，將時間相近的偵測合併成場景並寫入可續跑的紀錄檔；
//! 可選擇輸出各場景片段，再正規化後合併成一支精華影片。

pub mod checkpoint_log;
pub mod clip_exporter;
pub mod clip_normalizer;
pub mod detection;
mod ffmpeg_tools;
pub mod frame_source;
mod main;
pub mod merge;
pub mod overlay;
pub mod scene_segmenter;
pub mod video_processor;

pub use checkpoint_log::{CheckpointLog, LogMode};
pub use clip_exporter::{Clip, ClipExporter, ClipSink, ClipWindow, ExportOptions, FrameWriter};
pub use clip_normalizer::{ClipNormalizer, DimensionProbe, Transcoder, select_target};
pub use detection::{CommandDetector, Detection, DetectionEvent, DetectionRequest, Detector};
pub use ffmpeg_tools::Ffmpeg;
pub use frame_source::{Frame, FrameReader, FrameSource};
pub use main::{Backends, BatchSummary, ObjectScanner, resolve_log_mode};
pub use merge::{Concatenator, MergeOrchestrator};
pub use scene_segmenter::{Scene, segment_scenes};
pub use video_processor::{VideoOutcome, VideoProcessor};
