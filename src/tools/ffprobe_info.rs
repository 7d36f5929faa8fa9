use crate::error::{MediaError, MediaResult};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    /// 容器回報的總影格數，沒有時由長度與幀率估算
    pub frame_count: u64,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
}

/// 使用 ffprobe 取得影片資訊
pub fn get_video_info(path: &Path) -> MediaResult<VideoInfo> {
    let probe_error = |reason: String| MediaError::Probe {
        path: path.to_path_buf(),
        reason,
    };

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| probe_error(format!("無法執行 ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(probe_error(format!("ffprobe 執行失敗: {}", stderr.trim())));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout).map_err(probe_error)
}

fn parse_probe_output(json: &str) -> Result<VideoInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("無法解析 ffprobe 輸出: {e}"))?;

    // 找到視訊串流
    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .ok_or_else(|| "找不到視訊串流".to_string())?;

    let width = video_stream.width.ok_or("無法取得影片寬度")?;
    let height = video_stream.height.ok_or("無法取得影片高度")?;

    // 取得影片長度（優先從 format，其次從 stream）
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // 優先使用平均幀率，部分容器的 r_frame_rate 是時基而非實際幀率
    let frame_rate = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| {
            video_stream
                .r_frame_rate
                .as_ref()
                .and_then(|r| parse_frame_rate(r))
        })
        .unwrap_or(30.0);

    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or_else(|| (duration_seconds * frame_rate).round() as u64);

    Ok(VideoInfo {
        duration_seconds,
        width,
        height,
        frame_rate,
        frame_count,
    })
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"）
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok().filter(|r: &f64| *r > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate_fraction() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("24/1").unwrap() - 24.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_decimal() {
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("60").unwrap() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_invalid() {
        assert!(parse_frame_rate("invalid").is_none());
        assert!(parse_frame_rate("30/0").is_none());
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1280, "height": 720,
                 "r_frame_rate": "25/1", "avg_frame_rate": "25/1", "nb_frames": "250"}
            ],
            "format": {"duration": "10.000000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert!((info.frame_rate - 25.0).abs() < 0.01);
        assert_eq!(info.frame_count, 250);
    }

    #[test]
    fn test_parse_probe_output_estimates_frame_count() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480, "avg_frame_rate": "0/0", "r_frame_rate": "30/1"}],
            "format": {"duration": "2.0"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!((info.frame_rate - 30.0).abs() < 0.01);
        assert_eq!(info.frame_count, 60);
    }

    #[test]
    fn test_parse_probe_output_without_video() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(parse_probe_output(json).is_err());
    }
}
