use crate::config::{
    FailurePolicy, OverlayAnchor, Resolution, ResumeMode, ScanSettings, Verbosity,
    parse_class_ids, parse_color,
};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    version,
    about = "逐格偵測影片中的指定物件，記錄場景時間並輸出精華片段",
    after_help = "執行 --list-classes 查看所有類別 ID"
)]
pub struct Cli {
    /// 影片資料夾（遞迴搜尋）
    #[arg(value_name = "ROOT", required_unless_present = "list_classes")]
    pub root: Option<PathBuf>,

    /// 讀取 JSON 設定檔，命令列參數優先
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 將最終設定寫入 JSON 檔
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// 紀錄檔路徑
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// 要偵測的類別 ID，以逗號分隔（例: 0,16）
    #[arg(long, value_name = "IDS")]
    pub objects: Option<String>,

    /// 信心門檻 (0, 1]
    #[arg(long)]
    pub confidence: Option<f32>,

    /// 同一場景中相鄰偵測的最大間隔（秒）
    #[arg(long, value_name = "SECONDS")]
    pub gap: Option<f64>,

    /// 片段開頭往前延伸秒數
    #[arg(long, value_name = "SECONDS")]
    pub pre: Option<f64>,

    /// 片段結尾往後延伸秒數
    #[arg(long, value_name = "SECONDS")]
    pub post: Option<f64>,

    /// 輸出每個場景的片段
    #[arg(long)]
    pub export: bool,

    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// 在片段上加上字幕（檔名與標籤）
    #[arg(long)]
    pub overlay: bool,

    /// 字幕位置: tl, tr, bl, br
    #[arg(long, value_name = "POS")]
    pub overlay_pos: Option<String>,

    /// 字幕大小
    #[arg(long, value_name = "SCALE")]
    pub overlay_size: Option<f32>,

    /// 字幕顏色 r,g,b
    #[arg(long, value_name = "RGB")]
    pub overlay_color: Option<String>,

    /// 片段中不畫偵測框
    #[arg(long)]
    pub no_boxes: bool,

    /// 將所有片段合併成一支精華影片（需要 --export）
    #[arg(long)]
    pub merge: bool,

    #[arg(long, value_name = "FILE")]
    pub merge_output: Option<PathBuf>,

    /// 合併目標解析度（例: 1280x720），預設取面積最大的片段
    #[arg(long, value_name = "WxH")]
    pub merge_size: Option<String>,

    /// 片段正規化失敗時: skip 或 fallback-original
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<String>,

    /// 有紀錄檔時直接續跑，不詢問
    #[arg(long, conflicts_with = "restart")]
    pub resume: bool,

    /// 有紀錄檔時清空重來，不詢問
    #[arg(long)]
    pub restart: bool,

    /// 只顯示進度條
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// 偵測器指令（例: "python3 yolo_sidecar.py --model yolov8n.pt"）
    #[arg(long, value_name = "CMD")]
    pub detector: Option<String>,

    /// 列出所有類別 ID 後結束
    #[arg(long)]
    pub list_classes: bool,
}

impl Cli {
    /// 以命令列參數覆蓋設定
    pub fn apply(&self, settings: &mut ScanSettings) -> Result<()> {
        if let Some(log) = &self.log {
            settings.log_path.clone_from(log);
        }
        if let Some(objects) = &self.objects {
            settings.classes = parse_class_ids(objects)?;
        }
        if let Some(confidence) = self.confidence {
            settings.confidence = confidence;
        }
        if let Some(gap) = self.gap {
            settings.cluster_gap = gap;
        }
        if let Some(pre) = self.pre {
            settings.pre_padding = pre;
        }
        if let Some(post) = self.post {
            settings.post_padding = post;
        }

        settings.export |= self.export;
        if let Some(dir) = &self.export_dir {
            settings.export_dir.clone_from(dir);
        }

        settings.overlay.enabled |= self.overlay;
        if let Some(pos) = &self.overlay_pos {
            settings.overlay.anchor = OverlayAnchor::parse(pos);
        }
        if let Some(size) = self.overlay_size {
            settings.overlay.scale = size;
        }
        if let Some(color) = &self.overlay_color {
            settings.overlay.color = parse_color(color);
        }
        if self.no_boxes {
            settings.draw_boxes = false;
        }

        settings.merge |= self.merge;
        if let Some(output) = &self.merge_output {
            settings.merge_output.clone_from(output);
        }
        if let Some(size) = &self.merge_size {
            settings.merge_target = Some(size.parse::<Resolution>()?);
        }
        if let Some(policy) = &self.failure_policy {
            settings.failure_policy = policy.parse::<FailurePolicy>()?;
        }

        if self.resume {
            settings.resume = ResumeMode::Resume;
        } else if self.restart {
            settings.resume = ResumeMode::Restart;
        }

        if self.quiet {
            settings.verbosity = Verbosity::Quiet;
        } else if self.verbose {
            settings.verbosity = Verbosity::Verbose;
        }

        if let Some(detector) = &self.detector {
            settings.detector_command = detector.split_whitespace().map(str::to_string).collect();
        }

        Ok(())
    }
}
