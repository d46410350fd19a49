//! Resolved application configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::cli::Args;
use crate::error::{Error, Result};

/// Configuration for the entire program.
///
/// Constructed once at startup from CLI arguments and environment variables,
/// then passed explicitly into the acquirer and the supervisor. Nothing reads
/// ambient environment state after this point.
#[derive(Clone)]
pub struct AppConfig {
    /// Source video URL.
    pub source_url: Url,
    /// Ingest stream key. Redacted from `Debug` output.
    pub stream_key: String,
    /// Base ingest URL without the key.
    pub ingest_base: String,
    /// Directory the source video is downloaded into.
    pub work_dir: PathBuf,
    /// Expected filename of the downloaded video.
    pub media_file: String,
    /// ffmpeg binary path or name.
    pub ffmpeg_path: String,
    /// Fixed delay before restarting a crashed stream.
    pub restart_delay: Duration,
}

impl AppConfig {
    /// Validate CLI arguments into a config.
    pub fn from_args(args: &Args) -> Result<Self> {
        let source_url = Url::parse(&args.source_url).map_err(|e| {
            Error::config(format!("invalid source URL `{}`: {}", args.source_url, e))
        })?;
        if !matches!(source_url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported source URL scheme `{}`",
                source_url.scheme()
            )));
        }

        if args.stream_key.trim().is_empty() {
            return Err(Error::config("stream key must not be empty"));
        }
        if args.media_file.trim().is_empty() {
            return Err(Error::config("media filename must not be empty"));
        }

        Ok(Self {
            source_url,
            stream_key: args.stream_key.clone(),
            ingest_base: args.ingest_base.clone(),
            work_dir: args.work_dir.clone(),
            media_file: args.media_file.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            restart_delay: Duration::from_secs(args.restart_delay),
        })
    }

    /// Full ingest URL with the stream key appended.
    pub fn ingest_url(&self) -> String {
        format!(
            "{}/{}",
            self.ingest_base.trim_end_matches('/'),
            self.stream_key
        )
    }

    /// Expected local path of the downloaded media file.
    pub fn media_path(&self) -> PathBuf {
        self.work_dir.join(&self.media_file)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("source_url", &self.source_url.as_str())
            .field("stream_key", &"<redacted>")
            .field("ingest_base", &self.ingest_base)
            .field("work_dir", &self.work_dir)
            .field("media_file", &self.media_file)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("restart_delay", &self.restart_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            source_url: "https://example.com/source.mp4".to_string(),
            stream_key: "abcd-1234".to_string(),
            ingest_base: "rtmp://a.rtmp.youtube.com/live2".to_string(),
            work_dir: PathBuf::from("."),
            media_file: "video.mp4".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            restart_delay: 5,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn ingest_url_appends_key() {
        let config = AppConfig::from_args(&base_args()).unwrap();
        assert_eq!(
            config.ingest_url(),
            "rtmp://a.rtmp.youtube.com/live2/abcd-1234"
        );
    }

    #[test]
    fn ingest_url_tolerates_trailing_slash() {
        let mut args = base_args();
        args.ingest_base = "rtmp://ingest.example/live/".to_string();
        let config = AppConfig::from_args(&args).unwrap();
        assert_eq!(config.ingest_url(), "rtmp://ingest.example/live/abcd-1234");
    }

    #[test]
    fn media_path_joins_work_dir() {
        let mut args = base_args();
        args.work_dir = PathBuf::from("/tmp/recast");
        let config = AppConfig::from_args(&args).unwrap();
        assert_eq!(config.media_path(), PathBuf::from("/tmp/recast/video.mp4"));
    }

    #[test]
    fn rejects_empty_stream_key() {
        let mut args = base_args();
        args.stream_key = "   ".to_string();
        assert!(AppConfig::from_args(&args).is_err());
    }

    #[test]
    fn rejects_non_http_source() {
        let mut args = base_args();
        args.source_url = "file:///tmp/source.mp4".to_string();
        assert!(AppConfig::from_args(&args).is_err());
    }

    #[test]
    fn debug_output_redacts_stream_key() {
        let mut args = base_args();
        args.stream_key = "supersecret".to_string();
        let config = AppConfig::from_args(&args).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("<redacted>"));
    }
}
