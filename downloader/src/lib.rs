//! yt-dlp driver for sto-grab.
//!
//! Downloads one HLS manifest at a time into a file, reporting progress as UI events.
pub mod locate;
pub mod progress;
pub mod ytdlp;

pub use ytdlp::YtDlp;
