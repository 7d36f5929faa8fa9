use crate::config::is_video_file;
use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 遞迴掃描資料夾中的影片，依路徑排序
pub fn scan_video_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut video_files: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_video_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    video_files.sort();
    video_files.dedup();

    debug!(
        "在 {} 找到 {} 個影片",
        directory.display(),
        video_files.len()
    );
    Ok(video_files)
}
