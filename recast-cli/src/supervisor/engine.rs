//! Stream engine abstraction and the ffmpeg implementation.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::job::StreamJob;

/// Result of one encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The encoder exited with status 0. Unusual with a looped input, but a
    /// valid terminal success.
    Completed,
    /// The encoder exited with a nonzero status.
    Crashed(i32),
    /// The attempt was cancelled by the operator.
    Interrupted,
    /// The encoder could not be started or monitored.
    LaunchFailed(String),
}

/// Trait for encode-and-transmit engines.
#[async_trait]
pub trait StreamEngine: Send + Sync {
    /// Run one streaming attempt to completion.
    ///
    /// Blocks until the underlying process exits or `cancel` fires. On
    /// cancellation the engine must terminate the process before returning
    /// so no encoder is left running.
    async fn run_attempt(&self, job: &StreamJob, cancel: &CancellationToken) -> AttemptOutcome;
}

/// ffmpeg-based stream engine.
pub struct FfmpegEngine {
    binary_path: String,
    version: Option<String>,
}

impl FfmpegEngine {
    pub fn new(binary_path: impl Into<String>) -> Self {
        let binary_path = binary_path.into();
        let version = Self::detect_version(&binary_path);
        Self {
            binary_path,
            version,
        }
    }

    /// Detect the ffmpeg version.
    fn detect_version(path: &str) -> Option<String> {
        std::process::Command::new(path)
            .arg("-version")
            .output()
            .ok()
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Whether the binary responded to `-version`.
    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }

    /// Cached version string.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Build the ffmpeg argument list for a job.
    ///
    /// The same job always yields the same argument list.
    pub fn build_args(job: &StreamJob) -> Vec<String> {
        let encode = &job.encode;
        let mut args: Vec<String> = Vec::new();

        // Input: read at native frame rate, loop forever.
        args.extend(["-re".into(), "-stream_loop".into(), "-1".into()]);
        args.extend(["-i".into(), job.local_path.to_string_lossy().into_owned()]);

        // Video: low-latency H.264 with a fixed GOP, scene-change detection off.
        args.extend(["-c:v".into(), "libx264".into()]);
        args.extend(["-preset".into(), "ultrafast".into()]);
        args.extend(["-tune".into(), "zerolatency".into()]);
        args.extend(["-g".into(), encode.keyframe_interval.to_string()]);
        args.extend(["-keyint_min".into(), encode.keyframe_interval.to_string()]);
        args.extend(["-sc_threshold".into(), "0".into()]);
        args.extend(["-b:v".into(), format!("{}k", encode.video_bitrate_kbps)]);
        args.extend(["-maxrate".into(), format!("{}k", encode.video_bitrate_kbps)]);
        args.extend(["-bufsize".into(), format!("{}k", encode.buffer_size_kbit())]);

        // Audio: AAC at a fixed rate and layout.
        args.extend(["-c:a".into(), "aac".into()]);
        args.extend(["-b:a".into(), format!("{}k", encode.audio_bitrate_kbps)]);
        args.extend(["-ar".into(), encode.audio_sample_rate.to_string()]);
        args.extend(["-ac".into(), encode.audio_channels.to_string()]);

        // Output: FLV for RTMP, duration/filesize metadata suppressed since
        // the stream is unbounded.
        args.extend(["-f".into(), "flv".into()]);
        args.extend(["-flvflags".into(), "no_duration_filesize".into()]);
        args.push(job.ingest_url.clone());

        args
    }
}

#[async_trait]
impl StreamEngine for FfmpegEngine {
    async fn run_attempt(&self, job: &StreamJob, cancel: &CancellationToken) -> AttemptOutcome {
        let args = Self::build_args(job);
        debug!(binary = %self.binary_path, ?args, "spawning encoder");

        let mut child = match Command::new(&self.binary_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return AttemptOutcome::LaunchFailed(e.to_string()),
        };

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_encoder_output(stderr));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill encoder after cancellation");
                }
                let _ = child.wait().await;
                AttemptOutcome::Interrupted
            }
            status = child.wait() => match status {
                Ok(status) if status.success() => AttemptOutcome::Completed,
                // code() is None when the child was killed by a signal.
                Ok(status) => AttemptOutcome::Crashed(status.code().unwrap_or(-1)),
                Err(e) => AttemptOutcome::LaunchFailed(e.to_string()),
            },
        }
    }
}

/// Forward encoder stderr lines into the log.
async fn forward_encoder_output(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("Error") || line.contains("error") {
            warn!(target: "recast::encoder", "{line}");
        } else {
            debug!(target: "recast::encoder", "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::job::EncodeParams;

    fn job() -> StreamJob {
        StreamJob::new("video.mp4", "rtmp://a.rtmp.youtube.com/live2/secret")
    }

    #[test]
    fn build_args_matches_encoder_contract() {
        let args = FfmpegEngine::build_args(&job());
        let expected: Vec<String> = [
            "-re",
            "-stream_loop",
            "-1",
            "-i",
            "video.mp4",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-tune",
            "zerolatency",
            "-g",
            "60",
            "-keyint_min",
            "60",
            "-sc_threshold",
            "0",
            "-b:v",
            "800k",
            "-maxrate",
            "800k",
            "-bufsize",
            "1600k",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-ar",
            "44100",
            "-ac",
            "2",
            "-f",
            "flv",
            "-flvflags",
            "no_duration_filesize",
            "rtmp://a.rtmp.youtube.com/live2/secret",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        assert_eq!(args, expected);
    }

    #[test]
    fn build_args_is_identical_across_calls() {
        let job = job();
        assert_eq!(FfmpegEngine::build_args(&job), FfmpegEngine::build_args(&job));
    }

    #[test]
    fn build_args_scales_buffer_with_bitrate() {
        let job = job().with_encode(EncodeParams {
            video_bitrate_kbps: 2500,
            ..EncodeParams::default()
        });
        let args = FfmpegEngine::build_args(&job);
        let bufsize_idx = args.iter().position(|a| a == "-bufsize").unwrap();
        assert_eq!(args[bufsize_idx + 1], "5000k");
    }

    #[test]
    fn missing_binary_is_not_available() {
        let engine = FfmpegEngine::new("definitely-not-a-real-binary");
        assert!(!engine.is_available());
        assert!(engine.version().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_reports_launch_failure() {
        let engine = FfmpegEngine::new("definitely-not-a-real-binary");
        let outcome = engine
            .run_attempt(&job(), &CancellationToken::new())
            .await;
        assert!(matches!(outcome, AttemptOutcome::LaunchFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_reports_completed() {
        // `true` ignores the encoder arguments and exits 0.
        let engine = FfmpegEngine::new("true");
        let outcome = engine
            .run_attempt(&job(), &CancellationToken::new())
            .await;
        assert_eq!(outcome, AttemptOutcome::Completed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_reports_crashed_with_code() {
        let engine = FfmpegEngine::new("false");
        let outcome = engine
            .run_attempt(&job(), &CancellationToken::new())
            .await;
        assert_eq!(outcome, AttemptOutcome::Crashed(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_the_child() {
        // A script that ignores its arguments and sleeps stands in for an
        // encoder that never exits on its own. (`yes` would reject the
        // leading `-re` argument as an invalid option and exit 1.)
        let dir = tempfile::tempdir().expect("create tempdir");
        let script = dir.path().join("hang.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\n[ \"$1\" = -version ] && exit 0\nexec sleep 1000\n",
        )
        .expect("write script");
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("make script executable");
        }
        let engine = FfmpegEngine::new(script.to_string_lossy().into_owned());
        let job = job();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = engine.run_attempt(&job, &cancel).await;
        assert_eq!(outcome, AttemptOutcome::Interrupted);
    }
}
