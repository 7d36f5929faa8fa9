use std::path::Path;

/// 會被掃描的影片副檔名
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mpg", "mpeg", "avi", "mov", "mkv", "flv", "wmv", "ts", "vob", "vs",
];

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
