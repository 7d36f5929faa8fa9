//! 物件偵測介面
//!
//! 偵測模型本身是外部元件：給定影格、允許的類別與信心門檻，
//! 回傳零或多個偵測結果。[`CommandDetector`] 透過外部程式的
//! stdin/stdout 完成這個介面。

use super::frame_source::Frame;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// COCO 物件類別
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train",
    "truck", "boat", "traffic light", "fire hydrant", "stop sign", "parking meter",
    "bench", "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear",
    "zebra", "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase",
    "frisbee", "skis", "snowboard", "sports ball", "kite", "baseball bat",
    "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut",
    "cake", "chair", "couch", "potted plant", "bed", "dining table", "toilet",
    "tv", "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave",
    "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

#[must_use]
pub fn class_name(class_id: u32) -> String {
    COCO_CLASSES
        .get(class_id as usize)
        .map_or_else(|| format!("class_{class_id}"), |name| (*name).to_string())
}

/// `id: name` 對照表，供 `--list-classes` 使用
#[must_use]
pub fn class_table() -> String {
    COCO_CLASSES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{i:2}: {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// 單一影格被接受的偵測標籤
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    pub timestamp: f64,
    pub labels: BTreeSet<String>,
}

impl DetectionEvent {
    #[must_use]
    pub fn from_detections(timestamp: f64, detections: &[Detection]) -> Option<Self> {
        if detections.is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            labels: detections.iter().map(|d| d.label.clone()).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub classes: Vec<u32>,
    pub confidence: f32,
}

impl DetectionRequest {
    /// 依類別與門檻過濾，偵測器自己沒過濾時也能保證結果正確
    #[must_use]
    pub fn accepts(&self, class_id: u32, confidence: f32) -> bool {
        self.classes.contains(&class_id) && confidence >= self.confidence
    }
}

pub trait Detector {
    fn detect(&mut self, frame: &Frame, request: &DetectionRequest) -> Result<Vec<Detection>>;
}

#[derive(Serialize)]
struct FrameHeader<'a> {
    width: u32,
    height: u32,
    classes: &'a [u32],
    confidence: f32,
}

#[derive(Deserialize)]
struct RawDetection {
    class_id: u32,
    confidence: f32,
    bbox: [f32; 4],
}

/// 以外部程式作為偵測器
///
/// 每個影格先寫一行 JSON 標頭，接著 `width * height * 3` 位元組的 RGB 資料；
/// 外部程式回覆一行 JSON 陣列。
pub struct CommandDetector {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl CommandDetector {
    pub fn spawn(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("未設定偵測器指令（--detector）");
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("無法啟動偵測器: {}", command.join(" ")))?;

        let stdin = child.stdin.take().context("無法取得偵測器 stdin")?;
        let stdout = child.stdout.take().context("無法取得偵測器 stdout")?;

        info!("偵測器已啟動 [{}]: {}", child.id(), command.join(" "));

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl Detector for CommandDetector {
    fn detect(&mut self, frame: &Frame, request: &DetectionRequest) -> Result<Vec<Detection>> {
        let header = FrameHeader {
            width: frame.image.width(),
            height: frame.image.height(),
            classes: &request.classes,
            confidence: request.confidence,
        };
        serde_json::to_writer(&mut self.stdin, &header).context("無法序列化影格標頭")?;
        self.stdin.write_all(b"\n")?;
        self.stdin
            .write_all(frame.image.as_raw())
            .context("無法傳送影格給偵測器")?;
        self.stdin.flush()?;

        self.line.clear();
        let bytes = self
            .stdout
            .read_line(&mut self.line)
            .context("無法讀取偵測器回應")?;
        if bytes == 0 {
            bail!("偵測器已結束");
        }

        let raw: Vec<RawDetection> = serde_json::from_str(self.line.trim())
            .with_context(|| format!("無法解析偵測器回應: {}", self.line.trim()))?;

        Ok(raw
            .into_iter()
            .filter(|d| request.accepts(d.class_id, d.confidence))
            .map(|d| Detection {
                class_id: d.class_id,
                label: class_name(d.class_id),
                confidence: d.confidence,
                bbox: BoundingBox {
                    x1: d.bbox[0],
                    y1: d.bbox[1],
                    x2: d.bbox[2],
                    y2: d.bbox[3],
                },
            })
            .collect())
    }
}

impl Drop for CommandDetector {
    fn drop(&mut self) {
        let _ = self.stdin.flush();
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!("偵測器已停止");
    }
}
