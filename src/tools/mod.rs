mod ffmpeg_command;
mod ffprobe_info;
mod path_validator;
mod progress;
pub mod terminal;
mod video_scanner;

pub use ffmpeg_command::FfmpegCommand;
pub use ffprobe_info::{VideoInfo, get_video_info};
pub use path_validator::{ensure_directory_exists, validate_directory_exists};
pub use progress::{BATCH_TEMPLATE, FRAME_TEMPLATE, bar_style, new_progress_bar};
pub use video_scanner::scan_video_files;
