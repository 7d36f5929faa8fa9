use crate::config::Resolution;
use std::path::Path;
use std::process::Command;

/// 所有 ffmpeg 呼叫共用的前置參數
const COMMON_ARGS: [&str; 4] = ["-hide_banner", "-nostdin", "-loglevel", "error"];

/// ffmpeg 命令產生器
///
/// 核心流程只依賴各個介面（解碼、輸出、轉檔、合併），
/// 實際的命令列細節集中在這裡。
pub struct FfmpegCommand;

impl FfmpegCommand {
    /// 將影片解碼成 rgb24 原始影格，從 `start_seconds` 開始輸出到 stdout
    #[must_use]
    pub fn decode_raw_frames(source_path: &Path, start_seconds: f64) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(COMMON_ARGS);
        if start_seconds > 0.0 {
            cmd.args(["-ss", &format!("{start_seconds:.3}")]);
        }
        cmd.arg("-i").arg(source_path);
        cmd.args([
            "-map", "0:v:0",
            "-an", "-sn", "-dn",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-vsync", "passthrough",
            "-",
        ]);
        cmd
    }

    /// 從 stdin 讀取 rgb24 原始影格並編碼成 mp4
    #[must_use]
    pub fn encode_raw_frames(destination_path: &Path, width: u32, height: u32, fps: f64) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);
        cmd.args([
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &format!("{width}x{height}"),
            "-r", &format!("{fps:.3}"),
            "-i", "-",
            // yuv420p 需要偶數尺寸
            "-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-crf", "20",
            "-pix_fmt", "yuv420p",
            "-movflags", "+faststart",
        ]);
        cmd.arg(destination_path);
        cmd
    }

    /// 縮放到目標尺寸內再置中補黑邊，不裁切
    #[must_use]
    pub fn scale_pad_filter(target: Resolution) -> String {
        let Resolution { width, height } = target;
        format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:black,setsar=1"
        )
    }

    #[must_use]
    pub fn normalize(source_path: &Path, destination_path: &Path, target: Resolution) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(COMMON_ARGS);
        cmd.arg("-y");
        cmd.arg("-i").arg(source_path);
        cmd.args([
            "-vf", &Self::scale_pad_filter(target),
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-crf", "20",
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            "-ar", "48000",
            "-ac", "2",
            "-movflags", "+faststart",
        ]);
        cmd.arg(destination_path);
        cmd
    }

    /// 以 concat demuxer 串接，不重新編碼
    #[must_use]
    pub fn concat(list_path: &Path, destination_path: &Path) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(COMMON_ARGS);
        cmd.args(["-y", "-f", "concat", "-safe", "0", "-i"]);
        cmd.arg(list_path);
        cmd.args(["-c", "copy"]);
        cmd.arg(destination_path);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_decode_seeks_only_when_needed() {
        let cmd = FfmpegCommand::decode_raw_frames(Path::new("/videos/a.mp4"), 0.0);
        let args = args_of(&cmd);
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.contains(&"rgb24".to_string()));

        let cmd = FfmpegCommand::decode_raw_frames(Path::new("/videos/a.mp4"), 12.5);
        let args = args_of(&cmd);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[ss + 1], "12.500");
        assert!(ss < input);
    }

    #[test]
    fn test_encode_raw_frames_size() {
        let cmd = FfmpegCommand::encode_raw_frames(Path::new("/out/clip.mp4"), 640, 480, 25.0);
        let args = args_of(&cmd);
        assert!(args.contains(&"640x480".to_string()));
        assert!(args.contains(&"25.000".to_string()));
        assert_eq!(args.last().unwrap(), "/out/clip.mp4");
    }

    #[test]
    fn test_scale_pad_filter() {
        let filter = FfmpegCommand::scale_pad_filter(Resolution::new(1280, 720));
        assert_eq!(
            filter,
            "scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2:black,setsar=1"
        );
    }

    #[test]
    fn test_concat_uses_stream_copy() {
        let cmd = FfmpegCommand::concat(Path::new("/export/merge_list.txt"), Path::new("out.mp4"));
        let args = args_of(&cmd);
        let copy = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[copy + 1], "copy");
        assert!(args.contains(&"concat".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }
}
