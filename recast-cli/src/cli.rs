//! Command-line interface definition.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "recast",
    version,
    about = "Downloads a source video and loops it to a live RTMP ingest endpoint, restarting the encoder on crash"
)]
pub struct Args {
    /// HTTP(S) URL of the source video file.
    #[arg(long, env = "SOURCE_URL")]
    pub source_url: String,

    /// Ingest stream key.
    #[arg(long, env = "STREAM_KEY", hide_env_values = true)]
    pub stream_key: String,

    /// Base ingest URL; the stream key is appended as the final path segment.
    #[arg(
        long,
        env = "INGEST_BASE",
        default_value = "rtmp://a.rtmp.youtube.com/live2"
    )]
    pub ingest_base: String,

    /// Directory where the source video is stored.
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,

    /// Expected filename of the downloaded video.
    #[arg(long, default_value = "video.mp4")]
    pub media_file: String,

    /// Path to the ffmpeg binary.
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Delay in seconds before restarting a crashed stream.
    #[arg(long, default_value_t = 5)]
    pub restart_delay: u64,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
